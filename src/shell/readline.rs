use std::io::BufRead;

use log::{debug, warn};
pub use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::Editor;
use rustyline::{CompletionType, Config as RLConfig};

use crate::utils::config::Config;

/// Where command text comes from. `Ok(None)` is end of input, which is not
/// the same as an empty line.
pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>, ReadlineError>;

    fn load_history(&mut self) {}

    fn add_history(&mut self, _line: &str) {}

    fn save_history(&mut self) {}
}

/// Interactive line editing backed by rustyline.
pub struct ReadlineManager<'a> {
    config: &'a Config,
    editor: Editor<(), FileHistory>,
}

impl<'a> ReadlineManager<'a> {
    pub fn new(config: &'a Config) -> Result<Self, ReadlineError> {
        let rl_config = RLConfig::builder()
            .history_ignore_space(true)
            .auto_add_history(false)
            .completion_type(CompletionType::List)
            .edit_mode(config.get_edit_mode())
            .build();

        let editor = Editor::with_config(rl_config)?;
        Ok(Self { config, editor })
    }
}

impl LineSource for ReadlineManager<'_> {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>, ReadlineError> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(Some(line)),
            Err(ReadlineError::Eof) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn load_history(&mut self) {
        if let Err(err) = self.editor.load_history(&self.config.history_file) {
            warn!(
                "unable to load history {}: {}",
                self.config.history_file.display(),
                err
            );
        } else {
            debug!("history loaded");
        }
    }

    fn add_history(&mut self, line: &str) {
        if let Err(err) = self.editor.add_history_entry(line) {
            warn!("unable to add history entry: {}", err);
        }
    }

    fn save_history(&mut self) {
        if let Err(err) = self.editor.save_history(&self.config.history_file) {
            warn!("unable to save history: {}", err);
        } else {
            debug!("history saved");
        }
    }
}

/// Lines from a script file or a non-terminal standard input.
pub struct BufferedSource<R> {
    reader: R,
}

impl<R: BufRead> BufferedSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> LineSource for BufferedSource<R> {
    fn read_line(&mut self, _prompt: &str) -> Result<Option<String>, ReadlineError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }
}
