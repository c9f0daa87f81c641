//! Tracing setup for Batchflow binaries: stderr plus a size-rotated log file.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable overriding the Batchflow home directory.
pub const HOME_ENV: &str = "BATCHFLOW_HOME";

const DEFAULT_LOG_FILTER: &str = "batchflow=info,batchflow_core=info,batchflow_io=info";
const VERBOSE_LOG_FILTER: &str = "batchflow=debug,batchflow_core=debug,batchflow_io=debug";
const MAX_LOG_FILES: usize = 5;
const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

pub struct LogConfig<'a> {
    /// Base name of the log file
    pub app_name: &'a str,
    /// Widen stderr output to debug
    pub verbose: bool,
    /// Also write to `<home>/logs/<app_name>.log`
    pub log_file: bool,
}

/// Install the global subscriber.
///
/// `RUST_LOG` replaces the default filter for both outputs.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let env_filter = || EnvFilter::try_from_default_env().ok();
    let file_filter = env_filter().unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER));
    let console_filter = match env_filter() {
        Some(filter) => filter,
        None if config.verbose => EnvFilter::new(VERBOSE_LOG_FILTER),
        None => EnvFilter::new(DEFAULT_LOG_FILTER),
    };

    let file_layer = if config.log_file {
        let dir = ensure_logs_dir().context("Failed to ensure log directory")?;
        let writer = SharedRollingWriter::new(&dir, config.app_name)
            .context("Failed to initialize rolling log writer")?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_filter),
        )
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok(())
}

/// `$BATCHFLOW_HOME`, or `~/.batchflow`.
pub fn batchflow_home() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(HOME_ENV) {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".batchflow"))
}

pub fn logs_dir() -> Result<PathBuf> {
    Ok(batchflow_home()?.join("logs"))
}

pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir()?;
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

/// Appends to `<name>.log`, shifting it to `<name>.log.1` (and older files
/// up by one) once it would exceed `max_size`.
struct RollingFile {
    dir: PathBuf,
    name: String,
    max_files: usize,
    max_size: u64,
    file: Option<File>,
    size: u64,
}

impl RollingFile {
    fn open(dir: &Path, name: &str, max_files: usize, max_size: u64) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let mut rolling = Self {
            dir: dir.to_path_buf(),
            name: file_stem(name),
            max_files: max_files.max(1),
            max_size,
            file: None,
            size: 0,
        };
        rolling.reopen()?;
        if rolling.size > rolling.max_size {
            rolling.rotate()?;
        }
        Ok(rolling)
    }

    fn path(&self, generation: usize) -> PathBuf {
        match generation {
            0 => self.dir.join(format!("{}.log", self.name)),
            n => self.dir.join(format!("{}.log.{}", self.name, n)),
        }
    }

    fn reopen(&mut self) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(0))?;
        self.size = file.metadata()?.len();
        self.file = Some(file);
        Ok(())
    }

    fn rotate(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }

        let oldest = self.max_files - 1;
        if oldest > 0 {
            let expired = self.path(oldest);
            if expired.exists() {
                fs::remove_file(&expired)?;
            }
            for generation in (0..oldest).rev() {
                let from = self.path(generation);
                if from.exists() {
                    fs::rename(&from, self.path(generation + 1))?;
                }
            }
        } else {
            fs::remove_file(self.path(0))?;
        }

        self.reopen()
    }
}

impl Write for RollingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.size > 0 && self.size + buf.len() as u64 > self.max_size {
            self.rotate()?;
        }
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log file unavailable"))?;
        let written = file.write(buf)?;
        self.size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

#[derive(Clone)]
struct SharedRollingWriter {
    inner: Arc<Mutex<RollingFile>>,
}

impl SharedRollingWriter {
    fn new(dir: &Path, name: &str) -> Result<Self> {
        let file = RollingFile::open(dir, name, MAX_LOG_FILES, MAX_LOG_FILE_SIZE)
            .with_context(|| format!("Failed to open log file for {}", name))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(file)),
        })
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedRollingWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl Write for SharedRollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?
            .flush()
    }
}

fn file_stem(name: &str) -> String {
    name.chars()
        .map(|ch| match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => ch,
            _ => '_',
        })
        .collect()
}
