use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::process;

use chrono::Local;
use env_logger::{Builder, Target};
use log::LevelFilter;

use crate::utils::config::Config;

pub fn parse_level(level: &str) -> LevelFilter {
    match level {
        level if level.eq_ignore_ascii_case("off") => LevelFilter::Off,
        level if level.eq_ignore_ascii_case("error") => LevelFilter::Error,
        level if level.eq_ignore_ascii_case("warn") => LevelFilter::Warn,
        level if level.eq_ignore_ascii_case("info") => LevelFilter::Info,
        level if level.eq_ignore_ascii_case("debug") => LevelFilter::Debug,
        level if level.eq_ignore_ascii_case("trace") => LevelFilter::Trace,
        _ => LevelFilter::Warn,
    }
}

fn open_log_file(dir: &Path) -> io::Result<File> {
    fs::create_dir_all(dir)?;
    let date = Local::now().format("%Y-%m-%d");
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(format!("rshell_{}.log", date)))
}

pub fn init_logger(config: &Config) {
    let level = parse_level(&config.logger_level);

    let mut writers: Vec<Box<dyn Write + Send + Sync>> = Vec::new();
    let mut file_error = None;
    match open_log_file(&config.logger_dir) {
        Ok(file) => writers.push(Box::new(file)),
        Err(e) => file_error = Some(e),
    }
    if config.log_to_stderr || writers.is_empty() {
        writers.push(Box::new(io::stderr()));
    }

    let installed = Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "[PID:{}][{}] {} - {}",
                process::id(),
                record.level(),
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(MultiWriter { writers })))
        .filter(None, LevelFilter::Warn)
        .filter(Some(&config.name), level)
        .try_init();

    if let Err(e) = installed {
        eprintln!("rshell: warning: logger already initialized: {}", e);
        return;
    }
    if let Some(e) = file_error {
        log::warn!(
            "unable to open log file in {}: {}",
            config.logger_dir.display(),
            e
        );
    }
    log::debug!("log level set to {}", level);
}

struct MultiWriter {
    writers: Vec<Box<dyn Write + Send + Sync>>,
}

impl Write for MultiWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for writer in &mut self.writers {
            writer.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        for writer in &mut self.writers {
            writer.flush()?;
        }
        Ok(())
    }
}
