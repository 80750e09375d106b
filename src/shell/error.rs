use std::io;

use nix::errno::Errno;
use rustyline::error::ReadlineError;
use thiserror::Error;

use super::executor::StreamId;

#[derive(Debug, Error)]
pub enum TokenizeError {
    #[error("unexpected {0}")]
    Unexpected(char),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("word {0:?} in invalid position")]
    WordInInvalidPosition(String),
    #[error("{0} must follow a command")]
    ConnectiveWithoutCommand(&'static str),
    #[error("{0} must be followed by a command")]
    ConnectiveWithoutOperand(&'static str),
    #[error("redirection must follow a command")]
    RedirectionWithoutCommand,
    #[error("redirection must be followed by a path")]
    RedirectionWithoutPath,
    #[error("scope must not follow a command")]
    ScopeAfterCommand,
    #[error("empty scope")]
    EmptyScope,
    #[error("unbalanced closing parenthesis")]
    UnbalancedClose,
    #[error("unbalanced opening parenthesis")]
    UnbalancedOpen,
    #[error("commands nested deeper than {0} levels")]
    NestingTooDeep(usize),
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("unable to fork: {0}")]
    Fork(Errno),
    #[error("error while waiting for {program}: {source}")]
    Wait { program: String, source: Errno },
    #[error("abnormal process termination: {program} ({signal})")]
    AbnormalTermination { program: String, signal: String },
    #[error("unable to create pipe: {0}")]
    Pipe(Errno),
    #[error("unable to open {kind} file {path}: {source}")]
    OpenFile {
        kind: &'static str,
        path: String,
        source: io::Error,
    },
    #[error("argument contains a nul byte: {0:?}")]
    InvalidArgument(String),
    #[error("stream {0} is not open")]
    UnknownStream(StreamId),
    #[error("incomplete sequential command")]
    EmptySequence,
    #[error("unable to write output: {0}")]
    Output(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("readline: {0}")]
    Readline(#[from] ReadlineError),
    #[error("{0}")]
    Io(#[from] io::Error),
}
