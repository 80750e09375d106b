use std::fmt;

use super::execution::Outcome;
use crate::shell::error::ExecError;

/// Whether spawning a process blocks until it terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    Wait,
    Continue,
}

/// Handle to a stream held in an executor's open-stream registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId(pub(crate) usize);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Process and stream operations the command tree is executed against.
///
/// Stream substitutions set through [`Executor::set_input_stream`] and
/// [`Executor::set_output_stream`] apply to processes spawned afterwards.
/// The setters return the previous value so callers can restore it once
/// their own command is done.
pub trait Executor {
    /// Runs `program` with `arguments`. With [`WaitMode::Wait`] the exit code
    /// of the process is returned; with [`WaitMode::Continue`] the call
    /// returns `0` right away and the process keeps running. A program that
    /// cannot be found is reported and yields `1`.
    fn spawn(
        &mut self,
        program: &str,
        arguments: &[String],
        wait: WaitMode,
    ) -> Result<i32, ExecError>;

    /// Starts `body` in a copy of the interpreter with the active streams as
    /// its standard input and output, without waiting for it. The copy stays
    /// pending until [`Executor::collect_subshells`] waits for it.
    fn spawn_subshell(
        &mut self,
        body: &mut dyn FnMut(&mut dyn Executor) -> Outcome,
    ) -> Result<(), ExecError>;

    /// Number of subshells started and not yet collected.
    fn pending_subshells(&self) -> usize;

    /// Waits for every pending subshell after the first `keep`. Returns the
    /// exit code of the first one whose body ended in [`Outcome::Terminate`].
    fn collect_subshells(&mut self, keep: usize) -> Result<Option<i32>, ExecError>;

    /// Creates a pipe, returning its `(read, write)` ends.
    fn create_pipe(&mut self) -> Result<(StreamId, StreamId), ExecError>;

    /// Opens an existing file for reading.
    fn create_input_file(&mut self, path: &str) -> Result<StreamId, ExecError>;

    /// Creates or truncates a file for writing.
    fn create_output_file(&mut self, path: &str) -> Result<StreamId, ExecError>;

    /// Creates or opens a file for appending.
    fn create_append_file(&mut self, path: &str) -> Result<StreamId, ExecError>;

    fn input_stream(&self) -> Option<StreamId>;

    fn output_stream(&self) -> Option<StreamId>;

    fn set_input_stream(&mut self, stream: Option<StreamId>) -> Option<StreamId>;

    fn set_output_stream(&mut self, stream: Option<StreamId>) -> Option<StreamId>;

    /// Closes a stream and removes it from the registry.
    fn close_stream(&mut self, stream: StreamId) -> Result<(), ExecError>;

    /// Writes builtin output to the active output stream, or to the
    /// interpreter's own standard output when none is set.
    fn write_output(&mut self, text: &str) -> Result<(), ExecError>;
}
