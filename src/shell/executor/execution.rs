use log::{debug, error, trace};

use super::builtins;
use super::executor::{Executor, StreamId, WaitMode};
use crate::shell::error::ExecError;
use crate::shell::parser::Command;

/// How the execution of a node ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The node ran to completion with this exit code.
    Completed(i32),
    /// An `exit` builtin was reached; unwinds everything up to the driver.
    Terminate(i32),
}

impl Outcome {
    pub fn code(self) -> i32 {
        match self {
            Outcome::Completed(code) | Outcome::Terminate(code) => code,
        }
    }
}

/// Evaluates to the exit code of a completed outcome and returns early from
/// the enclosing function on anything else.
macro_rules! completed {
    ($outcome:expr) => {
        match $outcome? {
            Outcome::Completed(code) => code,
            terminate => return Ok(terminate),
        }
    };
}

#[derive(Debug, Clone, Copy)]
enum FileMode {
    Read,
    Truncate,
    Append,
}

#[derive(Debug, Default)]
struct PipeEnds {
    read: Option<StreamId>,
    write: Option<StreamId>,
}

/// Executes a whole command line and waits for it.
pub fn run(command: &Command, executor: &mut dyn Executor) -> Result<Outcome, ExecError> {
    debug!("executing {:?}", command);
    let outcome = execute(command, executor, WaitMode::Wait)?;
    debug!("command line finished: {:?}", outcome);
    Ok(outcome)
}

pub fn execute(
    command: &Command,
    executor: &mut dyn Executor,
    wait: WaitMode,
) -> Result<Outcome, ExecError> {
    if wait == WaitMode::Continue && command.is_composite() {
        return execute_in_subshell(command, executor);
    }

    match command {
        Command::Executable { program, arguments } => executor
            .spawn(program, arguments, wait)
            .map(Outcome::Completed),
        Command::Builtin(builtin) => builtins::execute(builtin, executor),
        Command::Sequential(commands) => {
            let (last, rest) = commands.split_last().ok_or(ExecError::EmptySequence)?;
            for command in rest {
                completed!(execute(command, executor, WaitMode::Wait));
            }
            execute(last, executor, wait)
        }
        Command::Conjunctive { primary, secondary } => {
            let code = completed!(execute(primary, executor, WaitMode::Wait));
            if code == 0 {
                execute(secondary, executor, wait)
            } else {
                trace!("skipping conjunction operand after exit code {}", code);
                Ok(Outcome::Completed(code))
            }
        }
        Command::Disjunctive { primary, secondary } => {
            let code = completed!(execute(primary, executor, WaitMode::Wait));
            if code != 0 {
                execute(secondary, executor, wait)
            } else {
                trace!("skipping disjunction operand");
                Ok(Outcome::Completed(code))
            }
        }
        Command::Pipe { .. } => execute_pipeline(&command.pipeline_stages(), executor),
        Command::InputRedirection { primary, path } => {
            execute_redirection(primary, path, FileMode::Read, executor, wait)
        }
        Command::OutputRedirection { primary, path } => {
            execute_redirection(primary, path, FileMode::Truncate, executor, wait)
        }
        Command::AppendRedirection { primary, path } => {
            execute_redirection(primary, path, FileMode::Append, executor, wait)
        }
    }
}

/// Runs a composite node as a background pipeline stage. The copy of the
/// interpreter waits on the node itself; an `exit` inside it is reported
/// back when the pipeline collects its subshells.
fn execute_in_subshell(
    command: &Command,
    executor: &mut dyn Executor,
) -> Result<Outcome, ExecError> {
    let mut body = |subshell: &mut dyn Executor| match execute(command, subshell, WaitMode::Wait) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("rshell: error: {}", e);
            error!("subshell failed: {}", e);
            Outcome::Completed(1)
        }
    };
    executor.spawn_subshell(&mut body)?;
    Ok(Outcome::Completed(0))
}

fn execute_pipeline(
    stages: &[&Command],
    executor: &mut dyn Executor,
) -> Result<Outcome, ExecError> {
    let mut pipes: Vec<PipeEnds> = Vec::with_capacity(stages.len().saturating_sub(1));
    for _ in 1..stages.len() {
        match executor.create_pipe() {
            Ok((read, write)) => pipes.push(PipeEnds {
                read: Some(read),
                write: Some(write),
            }),
            Err(e) => {
                let _ = release_all(executor, &mut pipes);
                return Err(e);
            }
        }
    }

    let inherited_input = executor.input_stream();
    let inherited_output = executor.output_stream();
    let earlier_subshells = executor.pending_subshells();

    let result = run_stages(stages, &mut pipes, executor, inherited_input, inherited_output);

    executor.set_input_stream(inherited_input);
    executor.set_output_stream(inherited_output);
    let released = release_all(executor, &mut pipes);
    // Subshell stages may still be reading from the pipes closed above
    let collected = executor.collect_subshells(earlier_subshells);

    let outcome = result?;
    released?;
    match (outcome, collected?) {
        (Outcome::Completed(_), Some(code)) => Ok(Outcome::Terminate(code)),
        (outcome, _) => Ok(outcome),
    }
}

fn run_stages(
    stages: &[&Command],
    pipes: &mut [PipeEnds],
    executor: &mut dyn Executor,
    inherited_input: Option<StreamId>,
    inherited_output: Option<StreamId>,
) -> Result<Outcome, ExecError> {
    let last = stages.len() - 1;
    let mut code = 0;

    for (i, stage) in stages.iter().enumerate() {
        let input = if i == 0 { inherited_input } else { pipes[i - 1].read };
        let output = if i == last { inherited_output } else { pipes[i].write };
        executor.set_input_stream(input);
        executor.set_output_stream(output);

        let wait = if i == last {
            WaitMode::Wait
        } else {
            WaitMode::Continue
        };
        let outcome = execute(stage, executor, wait)?;

        // The stage owns these ends now
        if i > 0 {
            release(executor, &mut pipes[i - 1].read)?;
        }
        if i < last {
            release(executor, &mut pipes[i].write)?;
        }

        match outcome {
            Outcome::Completed(stage_code) => code = stage_code,
            terminate => return Ok(terminate),
        }
    }
    Ok(Outcome::Completed(code))
}

fn release(executor: &mut dyn Executor, end: &mut Option<StreamId>) -> Result<(), ExecError> {
    match end.take() {
        Some(stream) => executor.close_stream(stream),
        None => Ok(()),
    }
}

/// Closes every end still open. All of them are attempted; the first failure
/// is reported.
fn release_all(executor: &mut dyn Executor, pipes: &mut [PipeEnds]) -> Result<(), ExecError> {
    let mut first_error = None;
    for ends in pipes.iter_mut() {
        for end in [&mut ends.read, &mut ends.write] {
            if let Err(e) = release(executor, end) {
                first_error.get_or_insert(e);
            }
        }
    }
    first_error.map_or(Ok(()), Err)
}

fn execute_redirection(
    primary: &Command,
    path: &str,
    mode: FileMode,
    executor: &mut dyn Executor,
    wait: WaitMode,
) -> Result<Outcome, ExecError> {
    let stream = match mode {
        FileMode::Read => executor.create_input_file(path)?,
        FileMode::Truncate => executor.create_output_file(path)?,
        FileMode::Append => executor.create_append_file(path)?,
    };
    let previous = match mode {
        FileMode::Read => executor.set_input_stream(Some(stream)),
        FileMode::Truncate | FileMode::Append => executor.set_output_stream(Some(stream)),
    };

    let result = execute(primary, executor, wait);

    match mode {
        FileMode::Read => executor.set_input_stream(previous),
        FileMode::Truncate | FileMode::Append => executor.set_output_stream(previous),
    };
    let closed = executor.close_stream(stream);

    let outcome = result?;
    closed?;
    Ok(outcome)
}
