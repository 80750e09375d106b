use std::fs::File;
use std::io::{self, BufReader, IsTerminal};

use log::{debug, error, info, warn};

use crate::shell::error::ShellError;
use crate::shell::executor::{self, Outcome, PosixExecutor};
use crate::shell::parser::{parse, tokenize, Token, TokenKind};
use crate::shell::readline::{BufferedSource, LineSource, ReadlineError, ReadlineManager};
use crate::shell::signals;
use crate::utils::config::Config;
use crate::utils::theme::Theme;

/// What to do with the text read so far before appending the next line.
enum Continuation {
    /// Drop the trailing backslash and join the lines directly.
    JoinEscaped,
    /// Keep the line break, which belongs to the quoted word.
    Newline,
    /// Separate the commands of an open scope.
    NewlineSequence,
}

pub struct Shell<'a> {
    theme: &'a Theme,
    input: Box<dyn LineSource + 'a>,
    executor: PosixExecutor,
    interactive: bool,
    prompt: String,
}

impl<'a> Shell<'a> {
    /// Reads the configured script, or standard input. Only a terminal on
    /// standard input makes the shell interactive.
    pub fn new(config: &'a Config, theme: &'a Theme) -> Result<Self, ShellError> {
        if let Some(script) = &config.script {
            let file = File::open(script)?;
            info!("reading commands from {}", script.display());
            return Ok(Self::with_source(theme, BufferedSource::new(BufReader::new(file)), false));
        }

        if io::stdin().is_terminal() {
            let readline = ReadlineManager::new(config)?;
            Ok(Self::with_source(theme, readline, true))
        } else {
            let stdin = BufferedSource::new(io::stdin().lock());
            Ok(Self::with_source(theme, stdin, false))
        }
    }

    pub fn with_source(theme: &'a Theme, input: impl LineSource + 'a, interactive: bool) -> Self {
        Self {
            theme,
            input: Box::new(input),
            executor: PosixExecutor::new(),
            interactive,
            prompt: theme.command_prompt(),
        }
    }

    /// Runs until end of input or `exit`, returning the process exit code.
    pub fn run(&mut self) -> Result<i32, ShellError> {
        debug!("starting rshell (interactive: {})", self.interactive);
        if self.interactive {
            signals::ignore_interactive_signals();
        }

        self.input.load_history();
        let code = self.run_loop();
        self.input.save_history();

        debug!("leaving rshell: {:?}", code);
        code
    }

    fn run_loop(&mut self) -> Result<i32, ShellError> {
        loop {
            let reaped = self.executor.reap_children();
            if reaped > 0 {
                debug!("reaped {} background children", reaped);
            }

            match self.read_command() {
                Ok(Some((text, tokens))) => {
                    if !text.trim().is_empty() {
                        self.input.add_history(&text);
                    }
                    if let Some(code) = self.process(&tokens) {
                        return Ok(code);
                    }
                }
                Ok(None) => {
                    debug!("end of input");
                    return Ok(0);
                }
                Err(ShellError::Readline(ReadlineError::Interrupted)) => {
                    debug!("pending line discarded");
                }
                Err(ShellError::Readline(e)) => return Err(ShellError::Readline(e)),
                Err(e @ ShellError::UnexpectedEof) => {
                    self.report(&e);
                    return Ok(1);
                }
                Err(e) => self.report(&e),
            }
        }
    }

    fn prompt(&self, continued: bool) -> &str {
        match (self.interactive, continued) {
            (false, _) => "",
            (true, false) => &self.prompt,
            (true, true) => &self.theme.continuation_prompt,
        }
    }

    /// Reads lines until they tokenize into a complete command. Returns the
    /// command text with its tokens, or `None` at end of input.
    fn read_command(&mut self) -> Result<Option<(String, Vec<Token>)>, ShellError> {
        let mut text = String::new();
        let mut continued = false;

        loop {
            let prompt = self.prompt(continued).to_string();
            let Some(line) = self.input.read_line(&prompt)? else {
                return if continued {
                    Err(ShellError::UnexpectedEof)
                } else {
                    Ok(None)
                };
            };
            text.push_str(&line);

            let tokenizer = tokenize(&text)?;
            let continuation = if tokenizer.is_valid() {
                None
            } else if tokenizer.in_escape() {
                Some(Continuation::JoinEscaped)
            } else if tokenizer.in_quote() {
                Some(Continuation::Newline)
            } else {
                let open = tokenizer.tokens().last().is_some_and(|token| {
                    token.is_connective() || token.kind == TokenKind::OpenScope
                });
                Some(if open {
                    Continuation::Newline
                } else {
                    Continuation::NewlineSequence
                })
            };

            match continuation {
                None => {
                    let tokens = tokenizer.into_tokens();
                    debug!("tokens: {:?}", tokens);
                    return Ok(Some((text, tokens)));
                }
                Some(Continuation::JoinEscaped) => {
                    text.pop();
                }
                Some(Continuation::Newline) => text.push('\n'),
                Some(Continuation::NewlineSequence) => text.push_str("\n;"),
            }
            continued = true;
        }
    }

    /// Parses and runs one command line. Returns the exit code when the
    /// shell should stop.
    fn process(&mut self, tokens: &[Token]) -> Option<i32> {
        let command = match parse(tokens) {
            Ok(Some(command)) => command,
            Ok(None) => return None,
            Err(e) => {
                self.report(&e.into());
                return None;
            }
        };

        let result = executor::run(&command, &mut self.executor);
        let open = self.executor.open_streams();
        if open > 0 {
            warn!("{} streams still open after command", open);
        }

        match result {
            Ok(Outcome::Completed(code)) => {
                debug!("exit code {}", code);
                None
            }
            Ok(Outcome::Terminate(code)) => Some(code),
            Err(e) => {
                self.report(&e.into());
                None
            }
        }
    }

    fn report(&self, e: &ShellError) {
        error!("{}", e);
        eprintln!("{}", self.theme.format_error(&e.to_string()));
    }
}
