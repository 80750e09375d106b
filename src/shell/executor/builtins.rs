use log::{debug, warn};

use super::execution::Outcome;
use super::executor::Executor;
use crate::shell::error::ExecError;
use crate::shell::parser::Builtin;
use crate::utils::path::{self, FileKind};

const TEST_USAGE: &str = "usage: test [-e|-f|-d] path\n";

pub fn execute(builtin: &Builtin, executor: &mut dyn Executor) -> Result<Outcome, ExecError> {
    match builtin {
        Builtin::Exit { arguments } => {
            let code = exit_code(arguments);
            debug!("exit requested with code {}", code);
            Ok(Outcome::Terminate(code))
        }
        Builtin::Test { bracket, arguments } => {
            let code = test(*bracket, arguments, executor)?;
            Ok(Outcome::Completed(code))
        }
    }
}

/// Only the first argument is considered, and only its leading number, so
/// `3abc` means 3. Anything without one keeps the default of 0.
pub fn exit_code(arguments: &[String]) -> i32 {
    let Some(argument) = arguments.first() else {
        return 0;
    };
    match leading_integer(argument) {
        Some(code) => code,
        None => {
            eprintln!("rshell: warning: exit: {}: numeric argument required", argument);
            warn!("exit argument {:?} is not a number", argument);
            0
        }
    }
}

/// Optional leading whitespace and sign followed by at least one digit.
fn leading_integer(text: &str) -> Option<i32> {
    let text = text.trim_start();
    let sign = usize::from(text.starts_with(|c| c == '+' || c == '-'));
    let digits = text[sign..].chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    text[..sign + digits].parse().ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TestFlag {
    Exists,
    File,
    Directory,
}

impl TestFlag {
    fn parse(flag: &str) -> Option<Self> {
        match flag {
            "-e" => Some(TestFlag::Exists),
            "-f" => Some(TestFlag::File),
            "-d" => Some(TestFlag::Directory),
            _ => None,
        }
    }

    fn holds(self, path: &str) -> bool {
        match (self, path::file_kind(path)) {
            (_, None) => false,
            (TestFlag::Exists, Some(_)) => true,
            (TestFlag::File, Some(kind)) => kind == FileKind::File,
            (TestFlag::Directory, Some(kind)) => kind == FileKind::Directory,
        }
    }
}

fn test(bracket: bool, arguments: &[String], executor: &mut dyn Executor) -> Result<i32, ExecError> {
    let arguments = if bracket {
        match arguments.split_last() {
            Some((last, rest)) if last == "]" => rest,
            _ => {
                eprintln!("rshell: [: missing ']'");
                return Ok(1);
            }
        }
    } else {
        arguments
    };

    let (flag, path) = match arguments {
        [path] => (TestFlag::Exists, path),
        [flag, path] => match TestFlag::parse(flag) {
            Some(flag) => (flag, path),
            None => {
                eprintln!("rshell: test: flag must be one of -e|-f|-d");
                return Ok(1);
            }
        },
        _ => {
            executor.write_output(TEST_USAGE)?;
            return Ok(1);
        }
    };

    let result = flag.holds(path);
    debug!("test {:?} {} -> {}", flag, path, result);
    if result {
        executor.write_output("(True)\n")?;
        Ok(0)
    } else {
        executor.write_output("(False)\n")?;
        Ok(1)
    }
}
