//! One record per directory entry matching a glob pattern.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{debug, info};

use batchflow_core::{Bindings, DatePattern, Error, RecordSource, Result, Schema};

/// Entry attributes a directory source can populate.
pub const DIRECTORY_FIELDS: [&str; 8] = [
    "filename",
    "basename",
    "path",
    "size",
    "modified",
    "extension",
    "is_file",
    "is_dir",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attribute {
    Filename,
    Basename,
    Path,
    Size,
    Modified,
    Extension,
    IsFile,
    IsDir,
}

impl Attribute {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "filename" => Attribute::Filename,
            "basename" => Attribute::Basename,
            "path" => Attribute::Path,
            "size" => Attribute::Size,
            "modified" => Attribute::Modified,
            "extension" => Attribute::Extension,
            "is_file" => Attribute::IsFile,
            "is_dir" => Attribute::IsDir,
            _ => return None,
        })
    }
}

fn flag(value: bool) -> String {
    (if value { "1" } else { "0" }).to_string()
}

/// Lists `directory/pattern` in path order.
///
/// `modified` is rendered as local time in `Y-m-d H:i:s`; `basename` is the
/// file name without its extension.
pub struct DirectorySource {
    directory: PathBuf,
    pattern: String,
    attributes: Vec<Attribute>,
    bindings: Bindings,
    entries: Option<std::vec::IntoIter<PathBuf>>,
    timestamp: DatePattern,
}

impl DirectorySource {
    pub fn new(directory: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            pattern: pattern.into(),
            attributes: Vec::new(),
            bindings: Bindings::default(),
            entries: None,
            timestamp: DatePattern::default(),
        }
    }

    fn attribute(&self, attribute: Attribute, path: &Path, meta: &fs::Metadata) -> String {
        let os = |s: Option<&std::ffi::OsStr>| s.map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        match attribute {
            Attribute::Filename => os(path.file_name()),
            Attribute::Basename => os(path.file_stem()),
            Attribute::Path => path.display().to_string(),
            Attribute::Size => meta.len().to_string(),
            Attribute::Modified => meta
                .modified()
                .map(|time| self.timestamp.render(&DateTime::<Local>::from(time).naive_local()))
                .unwrap_or_default(),
            Attribute::Extension => os(path.extension()),
            Attribute::IsFile => flag(meta.is_file()),
            Attribute::IsDir => flag(meta.is_dir()),
        }
    }
}

impl RecordSource for DirectorySource {
    fn configure(&mut self, schema: &Schema, field_names: &[String]) -> Result<()> {
        let bindings = Bindings::resolve(schema, field_names)?;
        self.attributes = field_names
            .iter()
            .map(|name| {
                Attribute::from_name(name).ok_or_else(|| {
                    Error::configuration(format!(
                        "Field '{}' is not a directory attribute (expected one of {})",
                        name,
                        DIRECTORY_FIELDS.join(", ")
                    ))
                })
            })
            .collect::<Result<_>>()?;
        self.bindings = bindings;
        Ok(())
    }

    fn open(&mut self) -> Result<()> {
        if !self.directory.is_dir() {
            return Err(Error::resource(
                format!("Directory does not exist: {}", self.directory.display()),
                anyhow::anyhow!("not a directory"),
            ));
        }
        let pattern = self.directory.join(&self.pattern);
        let pattern = pattern.to_string_lossy();
        let paths = glob::glob(&pattern)
            .map_err(|e| Error::configuration(format!("Invalid pattern '{}': {}", pattern, e)))?;

        let mut entries = Vec::new();
        for entry in paths {
            let path = entry.map_err(|e| {
                Error::resource(format!("Cannot read directory entry under {}", self.directory.display()), e)
            })?;
            entries.push(path);
        }
        entries.sort();
        info!(
            directory = %self.directory.display(),
            pattern = %self.pattern,
            entries = entries.len(),
            "opened directory source"
        );
        self.entries = Some(entries.into_iter());
        Ok(())
    }

    fn read(&mut self) -> Result<bool> {
        let entries = self
            .entries
            .as_mut()
            .ok_or_else(|| Error::configuration("Directory source is not open"))?;
        let Some(path) = entries.next() else {
            return Ok(false);
        };
        let meta = fs::metadata(&path)
            .map_err(|e| Error::resource(format!("Cannot stat {}", path.display()), e))?;

        for ((_, value), attribute) in self.bindings.iter().zip(&self.attributes) {
            value.set_raw(Some(&self.attribute(*attribute, &path, &meta)))?;
        }
        Ok(true)
    }

    fn close(&mut self) -> Result<()> {
        if self.entries.take().is_some() {
            debug!(directory = %self.directory.display(), "closed directory source");
        }
        Ok(())
    }

    fn bindings(&self) -> &Bindings {
        &self.bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batchflow_core::{BooleanValue, DateTimeValue, IntegerValue, Record, StringValue};

    fn schema() -> Schema {
        let mut schema = Schema::new();
        schema.add("filename", StringValue::new()).unwrap();
        schema.add("basename", StringValue::new()).unwrap();
        schema.add("extension", StringValue::new()).unwrap();
        schema.add("size", IntegerValue::new()).unwrap();
        schema.add("is_file", BooleanValue::new()).unwrap();
        schema.add("modified", DateTimeValue::default()).unwrap();
        schema
    }

    #[test]
    fn test_lists_matching_entries_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.csv"), "12345").unwrap();
        fs::write(dir.path().join("a.csv"), "1").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let schema = schema();
        let names: Vec<String> = schema.keys().map(str::to_string).collect();
        let mut source = DirectorySource::new(dir.path(), "*.csv");
        source.configure(&schema, &names).unwrap();

        let records: Vec<Record> = source.records().collect::<Result<_>>().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].raw("filename").unwrap(), "a.csv");
        assert_eq!(records[0].raw("basename").unwrap(), "a");
        assert_eq!(records[0].raw("extension").unwrap(), "csv");
        assert_eq!(records[1].integer("size").unwrap(), Some(5));
        assert_eq!(records[1].boolean("is_file").unwrap(), Some(true));
        assert!(records[1].datetime("modified").unwrap().is_some());
    }

    #[test]
    fn test_unknown_attribute_fails_at_configure() {
        let mut schema = Schema::new();
        schema.add("owner", StringValue::new()).unwrap();
        let mut source = DirectorySource::new(".", "*");
        let err = source.configure(&schema, &["owner".to_string()]).unwrap_err();
        assert!(err.to_string().contains("not a directory attribute"));
    }

    #[test]
    fn test_missing_directory_is_a_resource_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = DirectorySource::new(dir.path().join("gone"), "*");
        source.configure(&Schema::new(), &[]).unwrap();
        let first = source.records().next().unwrap();
        assert!(matches!(first, Err(Error::Resource { .. })));
    }
}
