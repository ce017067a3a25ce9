//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber from `LogConfig`
//! - Route output to stderr or a dated, append-mode log file
//! - Log panics with a backtrace
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, text format for development
//! - `RUST_LOG` overrides the configured level
//! - The file name is re-rendered per record; a new name opens a new file

use chrono::{DateTime, Local, TimeZone};
use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriter};
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{LogConfig, LogStyle};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log level: {0}")]
    Filter(#[from] ParseError),
    #[error("cannot open log file {path}: {source}")]
    File {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("logging already initialised: {0}")]
    Init(#[from] TryInitError),
}

/// Log file named by a strftime pattern under a fixed directory.
#[derive(Debug)]
pub struct DatedLog {
    dir: PathBuf,
    pattern: String,
    prefix: String,
    current: Mutex<Option<(PathBuf, File)>>,
}

impl DatedLog {
    /// Open the file for the current time. Every line gets `prefix` in front.
    pub fn open(
        dir: impl Into<PathBuf>,
        pattern: impl Into<String>,
        prefix: impl Into<String>,
    ) -> io::Result<Self> {
        let log = Self {
            dir: dir.into(),
            pattern: pattern.into(),
            prefix: prefix.into(),
            current: Mutex::new(None),
        };
        let path = log.path_at(&Local::now())?;
        let file = open_log_file(&path)?;
        *log.lock()? = Some((path, file));
        Ok(log)
    }

    /// The file a record written at `now` goes to.
    pub fn path_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> io::Result<PathBuf>
    where
        Tz::Offset: std::fmt::Display,
    {
        let mut name = String::new();
        write!(name, "{}", now.format(&self.pattern)).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot render log file pattern {:?}", self.pattern),
            )
        })?;
        Ok(self.dir.join(name))
    }

    /// The file currently open.
    pub fn current_path(&self) -> Option<PathBuf> {
        self.lock()
            .ok()
            .and_then(|current| current.as_ref().map(|(path, _)| path.clone()))
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, Option<(PathBuf, File)>>> {
        self.current
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))
    }

    fn write_record(&self, prefix: &[u8], buf: &[u8]) -> io::Result<()> {
        let path = self.path_at(&Local::now())?;
        let mut current = self.lock()?;
        if !matches!(&*current, Some((open, _)) if *open == path) {
            *current = Some((path.clone(), open_log_file(&path)?));
        }
        match current.as_mut() {
            Some((_, file)) => {
                file.write_all(prefix)?;
                file.write_all(buf)
            }
            None => Err(io::Error::other("log file not open")),
        }
    }
}

/// One record's writer; the prefix goes before its first byte.
pub struct RecordWriter<'a> {
    log: &'a DatedLog,
    first: bool,
}

impl Write for RecordWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let prefix = if std::mem::take(&mut self.first) {
            self.log.prefix.as_bytes()
        } else {
            &b""[..]
        };
        self.log.write_record(prefix, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.log.lock()?.as_mut() {
            Some((_, file)) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for DatedLog {
    type Writer = RecordWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RecordWriter {
            log: self,
            first: true,
        }
    }
}

/// Install the global subscriber and the panic hook.
pub fn init_logging(config: &LogConfig) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)?,
    };

    let (writer, ansi) = match &config.dir {
        Some(dir) => {
            // A prefix would break one-object-per-line JSON.
            let prefix = match config.style {
                LogStyle::Text => config.prefix.clone(),
                LogStyle::Json => String::new(),
            };
            let log = DatedLog::open(dir, config.file_pattern(), prefix).map_err(|source| {
                LoggingError::File {
                    path: dir.clone(),
                    source,
                }
            })?;
            (BoxMakeWriter::new(log), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true);
    let layer = match config.style {
        LogStyle::Json => layer.json().boxed(),
        LogStyle::Text => layer.boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()?;

    install_panic_hook();
    Ok(())
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Log every panic, with a backtrace, through tracing.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::force_capture();
        let location = info
            .location()
            .map(ToString::to_string)
            .unwrap_or_default();
        tracing::error!(
            panic = %panic_message(info.payload()),
            location = %location,
            backtrace = %backtrace,
            "Panic caught"
        );
    }));
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
