use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use chrono::Local;
use env_logger::{Builder, Target};
use log::{log, LevelFilter};

use crate::error::Result;

pub struct LogConfig {
    pub log_file: PathBuf,
    pub log_level: LevelFilter,
}
impl LogConfig {
    pub fn new(log_file: impl Into<PathBuf>, log_level: LevelFilter) -> Self {
        Self { log_file: log_file.into(), log_level }
    }
}

/// Process-wide logger writing to stdout and to an append-only log file.
pub struct Logger {
    config: LogConfig,
}

impl Logger {
    /// Install the global logger.
    ///
    /// # Returns
    ///
    /// * `Ok(Logger)` - The logger is installed.
    /// * `Err(e)` - The log file could not be created.
    pub fn init(config: LogConfig) -> Result<Self> {
        if let Some(parent) = config.log_file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)?;

        let multi_writer = MultiWriter {
            writers: vec![
                Box::new(std::io::stdout()),
                Box::new(file),
            ],
        };

        // A second init in the same process (tests) keeps the first logger.
        let _ = Builder::new()
            .format(|buf, record| {
                writeln!(buf, "{} [{}] {} - {}",
                    Local::now().format("%Y-%m-%d %H:%M:%S"),
                    record.level(),
                    record.module_path().unwrap_or("unknown"),
                    record.args())
            })
            .filter(None, config.log_level)
            .target(Target::Pipe(Box::new(multi_writer)))
            .try_init();

        Ok(Self { config })
    }

    pub fn log_file(&self) -> &PathBuf {
        &self.config.log_file
    }

    /// Log a pipeline stage boundary.
    pub fn stage(number: usize, title: &str) {
        log!(log::Level::Info, "[{}] {}", number, title);
    }

    /// Log an event with optional details and cause.
    pub fn log_event(
        level: log::Level,
        event: &str,
        details: Option<&str>,
        error: Option<&dyn std::error::Error>,
    ) {
        match (details, error) {
            (Some(d), Some(e)) => log!(level, "{}: {} - {}", event, d, e),
            (Some(d), None) => log!(level, "{}: {}", event, d),
            (None, Some(e)) => log!(level, "{} - {}", event, e),
            (None, None) => log!(level, "{}", event),
        }
    }
}

struct MultiWriter {
    writers: Vec<Box<dyn Write + Send + Sync>>,
}

impl Write for MultiWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        for writer in &mut self.writers {
            writer.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        for writer in &mut self.writers {
            writer.flush()?;
        }
        Ok(())
    }
}
