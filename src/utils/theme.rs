use std::env;

use colored::Colorize;
use nix::unistd::gethostname;

pub struct Theme {
    pub continuation_prompt: String,
    pub prompt_style: Box<dyn Fn(&str) -> String>,
    pub error_style: Box<dyn Fn(&str) -> String>,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            continuation_prompt: "> ".bright_black().to_string(),
            prompt_style: Box::new(|s| s.bright_cyan().to_string()),
            error_style: Box::new(|s| s.bright_red().to_string()),
        }
    }
}

impl Theme {
    pub fn plain() -> Self {
        Theme {
            continuation_prompt: "> ".to_string(),
            prompt_style: Box::new(|s| s.to_string()),
            error_style: Box::new(|s| s.to_string()),
        }
    }

    /// `user@host$ `, dropping whichever part is unknown.
    pub fn command_prompt(&self) -> String {
        let user = env::var("USER")
            .or_else(|_| env::var("LOGNAME"))
            .ok()
            .filter(|user| !user.is_empty());
        let host = gethostname()
            .ok()
            .and_then(|host| host.into_string().ok())
            .filter(|host| !host.is_empty());

        let prefix = match (user, host) {
            (Some(user), Some(host)) => format!("{}@{}", user, host),
            (Some(user), None) => user,
            (None, Some(host)) => format!("@{}", host),
            (None, None) => String::new(),
        };
        (self.prompt_style)(&format!("{}$ ", prefix))
    }

    pub fn format_error(&self, message: &str) -> String {
        format!("rshell: {} {}", (self.error_style)("error:"), message)
    }
}

pub fn load_theme(theme_name: &str) -> Theme {
    match theme_name {
        "plain" => Theme::plain(),
        "default" => Theme::default(),
        other => {
            log::warn!("unknown theme {:?}, using default", other);
            Theme::default()
        }
    }
}
