//! Log writer module
//!
//! Owns the process-wide log targets. Each target is stdout, stderr, or an
//! append-mode file; the choice is fixed once at startup from the
//! `[logging]` section and shared through a `OnceLock`.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, OnceLock};

/// Global log writer instance
static LOG_WRITER: OnceLock<LogWriter> = OnceLock::new();

/// One log output target
enum LogTarget {
    Stdout,
    Stderr,
    File(Mutex<File>),
}

impl LogTarget {
    /// Target for `path`, or `fallback` when no path is configured.
    ///
    /// The file is opened for appending, creating it and its parent
    /// directories as needed.
    fn open(path: Option<&str>, fallback: Self) -> io::Result<Self> {
        let Some(path) = path else {
            return Ok(fallback);
        };
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::File(Mutex::new(file)))
    }

    /// Write one line to this target. Write failures are swallowed; there is
    /// nowhere left to report them.
    fn write_line(&self, message: &str) {
        match self {
            Self::Stdout => println!("{message}"),
            Self::Stderr => eprintln!("{message}"),
            Self::File(file) => {
                if let Ok(mut f) = file.lock() {
                    let _ = writeln!(f, "{message}");
                }
            }
        }
    }
}

/// Thread-safe pair of log targets
pub struct LogWriter {
    /// Access and info log target
    access: LogTarget,
    /// Error and warning log target
    error: LogTarget,
}

impl LogWriter {
    pub fn write_access(&self, message: &str) {
        self.access.write_line(message);
    }

    /// Info messages share the access target
    pub fn write_info(&self, message: &str) {
        self.access.write_line(message);
    }

    pub fn write_error(&self, message: &str) {
        self.error.write_line(message);
    }
}

/// Initialize the global log writer. Call once at startup.
///
/// Returns an error if a configured log file cannot be opened, or if the
/// writer was already initialized.
pub fn init(access_log_file: Option<&str>, error_log_file: Option<&str>) -> io::Result<()> {
    let writer = LogWriter {
        access: LogTarget::open(access_log_file, LogTarget::Stdout)?,
        error: LogTarget::open(error_log_file, LogTarget::Stderr)?,
    };
    LOG_WRITER.set(writer).map_err(|_| {
        io::Error::new(
            io::ErrorKind::AlreadyExists,
            "Log writer already initialized",
        )
    })
}

/// The global log writer, or `None` before `init` has run
pub fn get() -> Option<&'static LogWriter> {
    LOG_WRITER.get()
}
