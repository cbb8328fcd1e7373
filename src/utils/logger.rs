use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::sync::Once;
use std::sync::OnceLock;

// Global sink for the run log; None when no file could be opened
static LOGGER: OnceLock<Mutex<Option<File>>> = OnceLock::new();
static INIT: Once = Once::new();

/// Tees run output to stdout and a `result.log` inside the output directory.
/// Initialization is optional; without it the macros fall back to plain
/// console output.
pub struct Logger;

impl Logger {
    pub fn init(output_dir: &str) {
        INIT.call_once(|| {
            let dir = Path::new(output_dir.trim_end_matches('/'));
            let log_path = dir.join("result.log");

            if !dir.exists() {
                if let Err(e) = fs::create_dir_all(dir) {
                    eprintln!("cannot create log directory: {e}");
                    LOGGER.get_or_init(|| Mutex::new(None));
                    return;
                }
            }

            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&log_path);

            match file {
                Ok(file) => {
                    println!("writing run log to '{}'", log_path.display());
                    LOGGER.get_or_init(|| Mutex::new(Some(file)));
                }
                Err(e) => {
                    eprintln!("cannot open log file: {e}");
                    LOGGER.get_or_init(|| Mutex::new(None));
                }
            }
        });
    }

    pub fn log(message: &str) {
        println!("{message}");

        if let Some(logger) = LOGGER.get() {
            if let Ok(mut file_guard) = logger.lock() {
                if let Some(file) = file_guard.as_mut() {
                    if let Err(e) = writeln!(file, "{message}") {
                        eprintln!("log write failed: {e}");
                    }
                }
            }
        }
    }

    pub fn log_error(message: &str) {
        eprintln!("{message}");

        if let Some(logger) = LOGGER.get() {
            if let Ok(mut file_guard) = logger.lock() {
                if let Some(file) = file_guard.as_mut() {
                    if let Err(e) = writeln!(file, "ERROR: {message}") {
                        eprintln!("error log write failed: {e}");
                    }
                }
            }
        }
    }

    pub fn flush() -> std::io::Result<()> {
        if let Some(logger) = LOGGER.get() {
            if let Ok(mut file_guard) = logger.lock() {
                if let Some(file) = file_guard.as_mut() {
                    file.flush()?;
                }
            }
        }
        Ok(())
    }
}

#[macro_export]
macro_rules! log {
    ($($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::utils::Logger::log(&message);
    }};
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::utils::Logger::log_error(&message);
    }};
}
