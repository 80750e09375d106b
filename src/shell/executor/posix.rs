use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::{OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::process;

use log::{debug, warn};
use nix::fcntl::OFlag;
use nix::unistd::{close, dup2, execv, fork, pipe2, ForkResult, Pid};

use super::children::ChildTable;
use super::execution::Outcome;
use super::executor::{Executor, StreamId, WaitMode};
use super::stream::{StreamMode, StreamRegistry};
use crate::shell::error::ExecError;
use crate::shell::signals;
use crate::utils::path;

const FILE_MODE: u32 = 0o644;

/// Written by a subshell whose body ran `exit`.
const TERMINATED: u8 = b'T';

/// A subshell started in the background, with the read end of its status
/// pipe.
#[derive(Debug)]
struct Subshell {
    pid: Pid,
    status: OwnedFd,
}

impl Subshell {
    /// Only meaningful once the process has been waited for.
    fn terminated(self) -> bool {
        let mut status = File::from(self.status);
        let mut byte = [0u8; 1];
        matches!(status.read(&mut byte), Ok(1)) && byte[0] == TERMINATED
    }
}

/// Executor backed by fork/exec, pipes and file descriptors.
#[derive(Debug, Default)]
pub struct PosixExecutor {
    streams: StreamRegistry,
    input: Option<StreamId>,
    output: Option<StreamId>,
    children: ChildTable,
    subshells: Vec<Subshell>,
}

impl PosixExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects children started without waiting that have since exited.
    pub fn reap_children(&mut self) -> usize {
        let reaped = self.children.reap();
        if reaped > 0 {
            debug!("{} children still running", self.children.len());
        }
        reaped
    }

    pub fn open_streams(&self) -> usize {
        self.streams.len()
    }

    fn active_fd(
        &self,
        stream: Option<StreamId>,
        expected: StreamMode,
    ) -> Result<Option<RawFd>, ExecError> {
        let Some(id) = stream else {
            return Ok(None);
        };
        let stream = self.streams.get(id).ok_or(ExecError::UnknownStream(id))?;
        if stream.mode() != expected {
            warn!("stream {} used as {:?} but opened as {:?}", id, expected, stream.mode());
        }
        Ok(Some(stream.raw_fd()))
    }

    fn open_file(
        &mut self,
        kind: &'static str,
        path: &str,
        options: &OpenOptions,
        mode: StreamMode,
    ) -> Result<StreamId, ExecError> {
        let file = options.open(path).map_err(|source| ExecError::OpenFile {
            kind,
            path: path.to_string(),
            source,
        })?;
        let id = self.streams.insert(OwnedFd::from(file), mode);
        debug!("opened {} file {} as stream {}", kind, path, id);
        Ok(id)
    }

    fn fork(&mut self) -> Result<ForkResult, ExecError> {
        // Anything still buffered would otherwise be written twice
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();
        // SAFETY: the interpreter is single threaded; the child only
        // rearranges descriptors before exec or runs interpreter code.
        unsafe { fork() }.map_err(ExecError::Fork)
    }

    fn finish_child(&mut self, child: Pid, program: &str, wait: WaitMode) -> Result<i32, ExecError> {
        debug!("spawned {} [{}] ({:?})", program, child, wait);
        match wait {
            WaitMode::Continue => {
                self.children.track(child, program);
                Ok(0)
            }
            WaitMode::Wait => self.children.wait_for(child, program),
        }
    }
}

/// Installs the active streams as stdin/stdout of a freshly forked child
/// and closes the `open` descriptors. Exits the child if that fails.
fn install_standard_streams(input: Option<RawFd>, output: Option<RawFd>, open: &[RawFd]) {
    let targets = [(input, libc::STDIN_FILENO), (output, libc::STDOUT_FILENO)];
    for (fd, target) in targets {
        if let Some(fd) = fd {
            if let Err(e) = dup2(fd, target) {
                eprintln!("rshell: unable to redirect fd {}: {}", target, e);
                process::exit(1);
            }
        }
    }
    for fd in open {
        let _ = close(*fd);
    }
}

fn to_cstring(text: &str) -> Result<CString, ExecError> {
    CString::new(text).map_err(|_| ExecError::InvalidArgument(text.to_string()))
}

impl Executor for PosixExecutor {
    fn spawn(
        &mut self,
        program: &str,
        arguments: &[String],
        wait: WaitMode,
    ) -> Result<i32, ExecError> {
        let Some(resolved) = path::resolve_program(program) else {
            eprintln!("rshell: {}: command not found", program);
            debug!("{} not found in PATH", program);
            return Ok(1);
        };

        let executable = CString::new(resolved.as_os_str().as_bytes())
            .map_err(|_| ExecError::InvalidArgument(resolved.display().to_string()))?;
        let mut argv = Vec::with_capacity(arguments.len() + 1);
        argv.push(to_cstring(program)?);
        for argument in arguments {
            argv.push(to_cstring(argument)?);
        }

        let input = self.active_fd(self.input, StreamMode::Input)?;
        let output = self.active_fd(self.output, StreamMode::Output)?;
        let open = self.streams.raw_fds();

        match self.fork()? {
            ForkResult::Child => {
                install_standard_streams(input, output, &open);
                signals::restore_default_signals();

                let error = match execv(&executable, &argv) {
                    Ok(never) => match never {},
                    Err(e) => e,
                };
                eprintln!("rshell: exec failed: {}: {}", program, error);
                process::exit(1);
            }
            ForkResult::Parent { child } => self.finish_child(child, program, wait),
        }
    }

    fn spawn_subshell(
        &mut self,
        body: &mut dyn FnMut(&mut dyn Executor) -> Outcome,
    ) -> Result<(), ExecError> {
        let input = self.active_fd(self.input, StreamMode::Input)?;
        let output = self.active_fd(self.output, StreamMode::Output)?;
        let (status_read, status_write) =
            pipe2(OFlag::O_CLOEXEC | OFlag::O_NONBLOCK).map_err(ExecError::Pipe)?;

        match self.fork()? {
            ForkResult::Child => {
                install_standard_streams(input, output, &[]);
                drop(status_read);
                // The copies of the parent's streams are not ours to keep
                self.streams.clear();
                self.subshells.clear();
                self.input = None;
                self.output = None;
                self.children = ChildTable::new();

                let outcome = body(self);
                if let Outcome::Terminate(_) = outcome {
                    let _ = File::from(status_write).write_all(&[TERMINATED]);
                }
                let _ = io::stdout().flush();
                process::exit(outcome.code());
            }
            ForkResult::Parent { child } => {
                drop(status_write);
                debug!("started subshell [{}]", child);
                self.subshells.push(Subshell {
                    pid: child,
                    status: status_read,
                });
                Ok(())
            }
        }
    }

    fn pending_subshells(&self) -> usize {
        self.subshells.len()
    }

    fn collect_subshells(&mut self, keep: usize) -> Result<Option<i32>, ExecError> {
        let pending = self.subshells.split_off(keep.min(self.subshells.len()));
        let mut terminate = None;
        let mut first_error = None;

        for subshell in pending {
            match self.children.wait_for(subshell.pid, "subshell") {
                Ok(code) => {
                    if subshell.terminated() {
                        debug!("subshell ran exit {}", code);
                        terminate.get_or_insert(code);
                    }
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(terminate), Err)
    }

    fn create_pipe(&mut self) -> Result<(StreamId, StreamId), ExecError> {
        let (read, write) = pipe2(OFlag::O_CLOEXEC).map_err(ExecError::Pipe)?;
        let read = self.streams.insert(read, StreamMode::Input);
        let write = self.streams.insert(write, StreamMode::Output);
        debug!("created pipe {} -> {}", write, read);
        Ok((read, write))
    }

    fn create_input_file(&mut self, path: &str) -> Result<StreamId, ExecError> {
        let mut options = OpenOptions::new();
        options.read(true);
        self.open_file("input", path, &options, StreamMode::Input)
    }

    fn create_output_file(&mut self, path: &str) -> Result<StreamId, ExecError> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true).mode(FILE_MODE);
        self.open_file("output", path, &options, StreamMode::Output)
    }

    fn create_append_file(&mut self, path: &str) -> Result<StreamId, ExecError> {
        let mut options = OpenOptions::new();
        options.append(true).create(true).mode(FILE_MODE);
        self.open_file("append", path, &options, StreamMode::Output)
    }

    fn input_stream(&self) -> Option<StreamId> {
        self.input
    }

    fn output_stream(&self) -> Option<StreamId> {
        self.output
    }

    fn set_input_stream(&mut self, stream: Option<StreamId>) -> Option<StreamId> {
        std::mem::replace(&mut self.input, stream)
    }

    fn set_output_stream(&mut self, stream: Option<StreamId>) -> Option<StreamId> {
        std::mem::replace(&mut self.output, stream)
    }

    fn close_stream(&mut self, stream: StreamId) -> Result<(), ExecError> {
        self.streams.close(stream)
    }

    fn write_output(&mut self, text: &str) -> Result<(), ExecError> {
        match self.output {
            Some(id) => {
                let stream = self.streams.get(id).ok_or(ExecError::UnknownStream(id))?;
                let mut file = File::from(stream.try_clone_fd()?);
                file.write_all(text.as_bytes())?;
            }
            None => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(text.as_bytes())?;
                stdout.flush()?;
            }
        }
        Ok(())
    }
}
