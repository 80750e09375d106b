use std::env;
use std::fs;
use std::path::PathBuf;

use dotenv::dotenv;
use log::warn;
use rustyline::EditMode;

#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    pub config_dir: PathBuf,
    pub theme: String,
    pub history_file: PathBuf,
    pub editor_mode: String,
    pub logger_level: String,
    pub logger_dir: PathBuf,
    pub log_to_stderr: bool,
    /// Script to read commands from instead of standard input.
    pub script: Option<PathBuf>,
}

fn expand(path: &str, home: Option<String>) -> PathBuf {
    PathBuf::from(shellexpand::tilde_with_context(path, || home).into_owned())
}

impl Config {
    fn with_home(home: Option<String>) -> Self {
        let config_dir = expand("~/.config/rshell", home);
        Config {
            name: env!("CARGO_PKG_NAME").to_string(),
            theme: String::from("default"),
            history_file: config_dir.join(".rshell_history"),
            editor_mode: String::from("emacs"),
            logger_level: String::from("warn"),
            logger_dir: config_dir.join("logs"),
            log_to_stderr: false,
            script: None,
            config_dir,
        }
    }

    /// Builds the configuration from `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let home = lookup("HOME");
        let mut config = Config::with_home(home.clone());

        if let Some(theme) = lookup("RSHELL_THEME") {
            config.theme = theme;
        }
        if let Some(editor) = lookup("RSHELL_EDITOR") {
            config.editor_mode = editor;
        }
        if let Some(history) = lookup("RSHELL_HISTORY") {
            config.history_file = expand(&history, home.clone());
        }
        if let Some(level) = lookup("RSHELL_LOG_LEVEL") {
            config.logger_level = level;
        }
        if let Some(dir) = lookup("RSHELL_LOG_DIR") {
            config.logger_dir = expand(&dir, home);
        }
        config.log_to_stderr = lookup("RSHELL_LOG_STDERR").is_some();
        config
    }

    pub fn new() -> Self {
        if cfg!(debug_assertions) {
            dotenv::from_filename(".env.development").ok();
        } else {
            dotenv().ok();
        }

        let config = Config::from_lookup(|name| env::var(name).ok());

        if let Some(parent) = config.history_file.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("unable to create history directory {}: {}", parent.display(), e);
            }
        }
        config
    }

    /// Applies command-line arguments, program name excluded.
    pub fn with_args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        self.script = args.next().map(PathBuf::from);
        let ignored: Vec<String> = args.collect();
        if !ignored.is_empty() {
            warn!("ignoring extra arguments: {:?}", ignored);
        }
        self
    }

    pub fn get_edit_mode(&self) -> EditMode {
        match self.editor_mode.to_lowercase().as_str() {
            "vi" => EditMode::Vi,
            _ => EditMode::Emacs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("HOME", "/home/someone")]);
        assert_eq!(config.theme, "default");
        assert_eq!(config.logger_level, "warn");
        assert_eq!(config.get_edit_mode(), EditMode::Emacs);
        assert_eq!(
            config.history_file,
            PathBuf::from("/home/someone/.config/rshell/.rshell_history")
        );
        assert_eq!(
            config.logger_dir,
            PathBuf::from("/home/someone/.config/rshell/logs")
        );
        assert!(!config.log_to_stderr);
        assert!(config.script.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("HOME", "/home/someone"),
            ("RSHELL_THEME", "plain"),
            ("RSHELL_EDITOR", "vi"),
            ("RSHELL_HISTORY", "~/history"),
            ("RSHELL_LOG_LEVEL", "debug"),
            ("RSHELL_LOG_DIR", "/var/log/rshell"),
            ("RSHELL_LOG_STDERR", "1"),
        ]);
        assert_eq!(config.theme, "plain");
        assert_eq!(config.get_edit_mode(), EditMode::Vi);
        assert_eq!(config.history_file, PathBuf::from("/home/someone/history"));
        assert_eq!(config.logger_level, "debug");
        assert_eq!(config.logger_dir, PathBuf::from("/var/log/rshell"));
        assert!(config.log_to_stderr);
    }

    #[test]
    fn test_script_argument() {
        let config = config_from(&[]).with_args(vec!["run.sh".to_string()]);
        assert_eq!(config.script, Some(PathBuf::from("run.sh")));

        let config = config_from(&[]).with_args(Vec::new());
        assert!(config.script.is_none());
    }
}
