//! Byte streams behind the file adapters.
//!
//! A medium hands out one reader or writer per open; dropping it is the close.

use std::cell::{Cell, RefCell};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use batchflow_core::{Error, Result};

pub trait InputMedium {
    fn open(&self) -> Result<Box<dyn Read>>;

    /// Human-readable location for logs and errors.
    fn describe(&self) -> String;
}

pub trait OutputMedium {
    fn create(&self) -> Result<Box<dyn Write>>;

    fn describe(&self) -> String;
}

/// A file on disk.
#[derive(Debug, Clone)]
pub struct FileInput {
    path: PathBuf,
}

impl FileInput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl InputMedium for FileInput {
    fn open(&self) -> Result<Box<dyn Read>> {
        let file = File::open(&self.path).map_err(|e| {
            Error::resource(format!("Cannot open file: {}", self.path.display()), e)
        })?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// A file on disk, truncated on create. Missing parent directories are created.
#[derive(Debug, Clone)]
pub struct FileOutput {
    path: PathBuf,
}

impl FileOutput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputMedium for FileOutput {
    fn create(&self) -> Result<Box<dyn Write>> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                Error::resource(
                    format!("Failed to create output directory: {}", parent.display()),
                    e,
                )
            })?;
        }
        let file = File::create(&self.path).map_err(|e| {
            Error::resource(format!("Cannot create file: {}", self.path.display()), e)
        })?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Open and close counts of an in-memory medium.
#[derive(Debug, Clone, Default)]
pub struct HandleStats {
    opened: Rc<Cell<usize>>,
    closed: Rc<Cell<usize>>,
}

impl HandleStats {
    pub fn opened(&self) -> usize {
        self.opened.get()
    }

    pub fn closed(&self) -> usize {
        self.closed.get()
    }

    fn track<T>(&self, inner: T) -> Tracked<T> {
        self.opened.set(self.opened.get() + 1);
        Tracked {
            inner,
            closed: Rc::clone(&self.closed),
        }
    }
}

struct Tracked<T> {
    inner: T,
    closed: Rc<Cell<usize>>,
}

impl<T: Read> Read for Tracked<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<T: Write> Write for Tracked<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<T> Drop for Tracked<T> {
    fn drop(&mut self) {
        self.closed.set(self.closed.get() + 1);
    }
}

/// Fixed bytes served from memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryInput {
    data: Rc<Vec<u8>>,
    stats: HandleStats,
}

impl MemoryInput {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Rc::new(data.into()),
            stats: HandleStats::default(),
        }
    }

    pub fn stats(&self) -> HandleStats {
        self.stats.clone()
    }
}

impl InputMedium for MemoryInput {
    fn open(&self) -> Result<Box<dyn Read>> {
        let bytes = Cursor::new(self.data.as_ref().clone());
        Ok(Box::new(self.stats.track(bytes)))
    }

    fn describe(&self) -> String {
        format!("<memory: {} bytes>", self.data.len())
    }
}

/// A shared in-memory buffer; every create starts it afresh.
#[derive(Debug, Clone, Default)]
pub struct MemoryOutput {
    buffer: Rc<RefCell<Vec<u8>>>,
    stats: HandleStats,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> HandleStats {
        self.stats.clone()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.buffer.borrow().clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.buffer.borrow()).into_owned()
    }
}

struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl OutputMedium for MemoryOutput {
    fn create(&self) -> Result<Box<dyn Write>> {
        self.buffer.borrow_mut().clear();
        let writer = SharedBuffer(Rc::clone(&self.buffer));
        Ok(Box::new(self.stats.track(writer)))
    }

    fn describe(&self) -> String {
        "<memory>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_input_counts_handles() {
        let input = MemoryInput::new("a,b\n");
        let stats = input.stats();
        {
            let mut reader = input.open().unwrap();
            let mut text = String::new();
            reader.read_to_string(&mut text).unwrap();
            assert_eq!(text, "a,b\n");
            assert_eq!(stats.opened(), 1);
            assert_eq!(stats.closed(), 0);
        }
        assert_eq!(stats.closed(), 1);
    }

    #[test]
    fn test_memory_output_restarts_on_create() {
        let output = MemoryOutput::new();
        output.create().unwrap().write_all(b"first").unwrap();
        output.create().unwrap().write_all(b"second").unwrap();
        assert_eq!(output.text(), "second");
        assert_eq!(output.stats().closed(), 2);
    }

    #[test]
    fn test_missing_file_is_a_resource_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = FileInput::new(dir.path().join("absent.csv"));
        let err = input.open().err().unwrap();
        assert!(matches!(err, Error::Resource { .. }));
        assert!(err.to_string().contains("absent.csv"));
    }

    #[test]
    fn test_file_output_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/data.txt");
        let output = FileOutput::new(&path);
        {
            let mut writer = output.create().unwrap();
            writer.write_all(b"ok").unwrap();
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "ok");
    }
}
