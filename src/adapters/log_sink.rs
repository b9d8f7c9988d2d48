//! `log` facade adapter.
//!
//! [`CaptureLogger`] writes every enabled `log` record into the
//! [`Console`], so developer diagnostics appear in the serial stream, the
//! ring buffer and the live channel exactly as the device prints them.

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::log_capture::Console;

/// Logger that appends records to the captured console.
pub struct CaptureLogger {
    console: Console,
    level: LevelFilter,
}

impl CaptureLogger {
    pub fn new(console: Console, level: LevelFilter) -> Self {
        Self { console, level }
    }
}

impl Log for CaptureLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // ESP-IDF style: level letter, then target.
        let letter = match record.level() {
            log::Level::Error => 'E',
            log::Level::Warn => 'W',
            log::Level::Info => 'I',
            log::Level::Debug => 'D',
            log::Level::Trace => 'V',
        };
        self.console
            .line(format_args!("{} {}: {}", letter, record.target(), record.args()));
    }

    fn flush(&self) {}
}

/// Install a [`CaptureLogger`] as the process logger.
pub fn install(console: &Console, level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_boxed_logger(Box::new(CaptureLogger::new(console.clone(), level)))?;
    log::set_max_level(level);
    Ok(())
}
