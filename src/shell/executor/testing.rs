use std::collections::{BTreeSet, HashMap, HashSet};
use std::io;

use super::execution::Outcome;
use super::executor::{Executor, StreamId, WaitMode};
use crate::shell::error::ExecError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Spawn {
        program: String,
        arguments: Vec<String>,
        wait: WaitMode,
        input: Option<StreamId>,
        output: Option<StreamId>,
    },
    Subshell {
        input: Option<StreamId>,
        output: Option<StreamId>,
    },
    Pipe {
        read: StreamId,
        write: StreamId,
    },
    Open {
        kind: &'static str,
        path: String,
        stream: StreamId,
    },
    Close(StreamId),
}

/// In-memory executor that records every call instead of touching the
/// system. Programs exit with 0 unless scripted otherwise; `false` exits 1.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    pub events: Vec<Event>,
    codes: HashMap<String, i32>,
    crashing: HashSet<String>,
    missing_files: HashSet<String>,
    open: BTreeSet<StreamId>,
    next_id: usize,
    input: Option<StreamId>,
    output: Option<StreamId>,
    writes: Vec<(Option<StreamId>, String)>,
    subshells: Vec<Outcome>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        let mut executor = Self::default();
        executor.codes.insert("false".to_string(), 1);
        executor
    }

    pub fn with_code(mut self, program: &str, code: i32) -> Self {
        self.codes.insert(program.to_string(), code);
        self
    }

    /// Spawning `program` fails as if it had been killed by a signal.
    pub fn with_crash(mut self, program: &str) -> Self {
        self.crashing.insert(program.to_string());
        self
    }

    pub fn with_missing_file(mut self, path: &str) -> Self {
        self.missing_files.insert(path.to_string());
        self
    }

    pub fn spawned(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Spawn { program, .. } => Some(program.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn pipes(&self) -> Vec<(StreamId, StreamId)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Pipe { read, write } => Some((*read, *write)),
                _ => None,
            })
            .collect()
    }

    pub fn open_streams(&self) -> usize {
        self.open.len()
    }

    /// Everything builtins wrote, regardless of destination.
    pub fn written(&self) -> String {
        self.writes.iter().map(|(_, text)| text.as_str()).collect()
    }

    pub fn writes(&self) -> &[(Option<StreamId>, String)] {
        &self.writes
    }

    fn register(&mut self) -> StreamId {
        let id = StreamId(self.next_id);
        self.next_id += 1;
        self.open.insert(id);
        id
    }

    fn open_file(&mut self, kind: &'static str, path: &str) -> Result<StreamId, ExecError> {
        if self.missing_files.contains(path) {
            return Err(ExecError::OpenFile {
                kind,
                path: path.to_string(),
                source: io::Error::from(io::ErrorKind::NotFound),
            });
        }
        let stream = self.register();
        self.events.push(Event::Open {
            kind,
            path: path.to_string(),
            stream,
        });
        Ok(stream)
    }
}

impl Executor for RecordingExecutor {
    fn spawn(
        &mut self,
        program: &str,
        arguments: &[String],
        wait: WaitMode,
    ) -> Result<i32, ExecError> {
        self.events.push(Event::Spawn {
            program: program.to_string(),
            arguments: arguments.to_vec(),
            wait,
            input: self.input,
            output: self.output,
        });
        if self.crashing.contains(program) {
            return Err(ExecError::AbnormalTermination {
                program: program.to_string(),
                signal: "SIGKILL".to_string(),
            });
        }
        match wait {
            WaitMode::Wait => Ok(self.codes.get(program).copied().unwrap_or(0)),
            WaitMode::Continue => Ok(0),
        }
    }

    /// Runs `body` right away; its outcome is kept until collected.
    fn spawn_subshell(
        &mut self,
        body: &mut dyn FnMut(&mut dyn Executor) -> Outcome,
    ) -> Result<(), ExecError> {
        self.events.push(Event::Subshell {
            input: self.input,
            output: self.output,
        });
        let input = self.input.take();
        let output = self.output.take();
        let outcome = body(self);
        self.input = input;
        self.output = output;
        self.subshells.push(outcome);
        Ok(())
    }

    fn pending_subshells(&self) -> usize {
        self.subshells.len()
    }

    fn collect_subshells(&mut self, keep: usize) -> Result<Option<i32>, ExecError> {
        let pending = self.subshells.split_off(keep.min(self.subshells.len()));
        Ok(pending.into_iter().find_map(|outcome| match outcome {
            Outcome::Terminate(code) => Some(code),
            Outcome::Completed(_) => None,
        }))
    }

    fn create_pipe(&mut self) -> Result<(StreamId, StreamId), ExecError> {
        let read = self.register();
        let write = self.register();
        self.events.push(Event::Pipe { read, write });
        Ok((read, write))
    }

    fn create_input_file(&mut self, path: &str) -> Result<StreamId, ExecError> {
        self.open_file("input", path)
    }

    fn create_output_file(&mut self, path: &str) -> Result<StreamId, ExecError> {
        self.open_file("output", path)
    }

    fn create_append_file(&mut self, path: &str) -> Result<StreamId, ExecError> {
        self.open_file("append", path)
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
        if !self.open.remove(&stream) {
            return Err(ExecError::UnknownStream(stream));
        }
        self.events.push(Event::Close(stream));
        Ok(())
    }

    fn write_output(&mut self, text: &str) -> Result<(), ExecError> {
        self.writes.push((self.output, text.to_string()));
        Ok(())
    }
}
