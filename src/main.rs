use std::env;
use std::process;

use log::{debug, error};

use crate::shell::Shell;
use crate::utils::config::Config;
use crate::utils::log::init_logger;
use crate::utils::theme;

mod shell;
mod utils;

fn main() {
    let config = Config::new().with_args(env::args().skip(1));
    init_logger(&config);
    debug!("configuration loaded from {}", config.config_dir.display());
    let theme = theme::load_theme(&config.theme);

    let code = match Shell::new(&config, &theme).and_then(|mut shell| shell.run()) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", theme.format_error(&e.to_string()));
            1
        }
    };
    process::exit(code);
}
