//! TOML job files: one source, one sink, and the fields between them.
//!
//! ```toml
//! [source]
//! kind = "csv"
//! path = "people.csv"
//! delimiter = ";"
//!
//! [sink]
//! kind = "fixed"
//! path = "out/people.txt"
//!
//! [[sink.fields]]
//! name = "id"
//! type = "integer"
//! layout = "%05d"
//! ```
//!
//! Without `[[source.fields]]` the sink's schema is configured directly
//! against the source. With them, sink fields are fed from that input schema
//! through their transfer policy (`input`, `input_type`).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use batchflow_core::{
    field_raw, DeclaredType, FieldDef, InputType, MappedSource, RecordSink, RecordSource,
    SchemaDef,
};
use batchflow_io::{
    CsvDialect, CsvSink, CsvSource, DirectorySource, FileInput, FileOutput, FixedColumn,
    FixedColumns, FixedSink, FixedSource,
};

use crate::error::HelpfulError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Csv,
    Fixed,
    Directory,
    Sql,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Csv => "csv",
            SourceKind::Fixed => "fixed",
            SourceKind::Directory => "directory",
            SourceKind::Sql => "sql",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Csv,
    Fixed,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::Csv => "csv",
            SinkKind::Fixed => "fixed",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub kind: SourceKind,

    /// Input file (csv, fixed) or directory (directory)
    pub path: Option<PathBuf>,

    pub delimiter: Option<char>,
    pub enclosure: Option<char>,
    pub has_header: Option<bool>,

    /// Field name to column: an index (csv), `{ start, length }` (fixed) or a
    /// column name (sql). A csv source without it maps its header row.
    #[serde(default)]
    pub columns: IndexMap<String, toml::Value>,

    /// Back-to-back fixed-width columns, as `[name, length]` pairs
    #[serde(default)]
    pub widths: Vec<(String, usize)>,

    /// Glob pattern for directory sources
    pub pattern: Option<String>,

    /// Database file for sql sources; in-memory when absent
    pub database: Option<PathBuf>,
    pub query: Option<String>,

    /// Input schema; turns on mapped mode
    #[serde(default)]
    pub fields: Vec<SourceField>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceField {
    #[serde(flatten)]
    pub def: FieldDef,

    /// Keys no field option claims; must stay empty
    #[serde(flatten)]
    pub unknown: toml::Table,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SinkConfig {
    pub kind: SinkKind,
    pub path: PathBuf,
    pub delimiter: Option<char>,
    pub enclosure: Option<char>,
    pub has_header: Option<bool>,
    pub fields: Vec<SinkField>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SinkField {
    #[serde(flatten)]
    pub def: FieldDef,

    /// Fixed-width layout pattern, e.g. `%010.2f|no_dot`
    pub layout: Option<String>,

    /// Keys no field option claims; must stay empty
    #[serde(flatten)]
    pub unknown: toml::Table,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    pub source: SourceConfig,
    pub sink: SinkConfig,
}

fn dialect(delimiter: Option<char>, enclosure: Option<char>, has_header: Option<bool>) -> CsvDialect {
    let defaults = CsvDialect::default();
    CsvDialect {
        delimiter: delimiter.unwrap_or(defaults.delimiter),
        enclosure: enclosure.unwrap_or(defaults.enclosure),
        has_header: has_header.unwrap_or(defaults.has_header),
    }
}

/// One sink field as `check` reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSummary {
    pub name: String,
    pub declared: DeclaredType,
    pub input: String,
    pub input_type: InputType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub source: SourceKind,
    pub sink: SinkKind,
    pub mapped: bool,
    pub fields: Vec<FieldSummary>,
}

/// Records a sink would receive, rendered as raw strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// A loaded job file. Relative paths resolve against the file's directory.
#[derive(Debug, Clone)]
pub struct Job {
    path: PathBuf,
    base: PathBuf,
    config: JobConfig,
}

impl Job {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|_| HelpfulError::job_not_found(path))?;
        let base = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::parse(&text, path, base)
    }

    /// Parse job text; `path` is only used in messages.
    pub fn parse(text: &str, path: impl Into<PathBuf>, base: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config: JobConfig =
            toml::from_str(text).map_err(|e| HelpfulError::invalid_job(&path, &e.to_string()))?;
        let job = Self {
            path,
            base: base.into(),
            config,
        };
        job.validate()?;
        Ok(job)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn is_mapped(&self) -> bool {
        !self.config.source.fields.is_empty()
    }

    fn validate(&self) -> Result<()> {
        let sink = &self.config.sink;
        if sink.fields.is_empty() {
            return Err(HelpfulError::new("[sink] has no fields")
                .with_suggestion("TRY: Add at least one [[sink.fields]] entry with `name` and `type`")
                .into());
        }
        for field in &self.config.source.fields {
            reject_unknown_keys("source", &field.def.name, &field.unknown)?;
        }
        for field in &sink.fields {
            reject_unknown_keys("sink", &field.def.name, &field.unknown)?;
            if field.layout.is_some() && sink.kind != SinkKind::Fixed {
                return Err(HelpfulError::new(format!(
                    "Field '{}' has a layout, but the sink is '{}'",
                    field.def.name,
                    sink.kind.as_str()
                ))
                .with_context("`layout` only applies to fixed-width sinks")
                .into());
            }
            let transfers = field.def.input.is_some() || field.def.input_type.is_some();
            if transfers && !self.is_mapped() {
                return Err(HelpfulError::new(format!(
                    "Field '{}' sets `input` or `input_type`, but the source has no fields",
                    field.def.name
                ))
                .with_suggestion("TRY: Declare the input schema with [[source.fields]]")
                .into());
            }
        }
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base.join(path)
        }
    }

    fn source_path(&self) -> Result<PathBuf> {
        let source = &self.config.source;
        let path = source
            .path
            .as_deref()
            .ok_or_else(|| HelpfulError::missing_option("source", source.kind.as_str(), "path"))?;
        Ok(self.resolve(path))
    }

    /// The sink's schema definition.
    ///
    /// In mapped mode a field without an explicit policy is cast from its
    /// input, since the two schemas never share values.
    pub fn sink_def(&self) -> SchemaDef {
        let mapped = self.is_mapped();
        SchemaDef::new(
            self.config
                .sink
                .fields
                .iter()
                .map(|field| {
                    let mut def = field.def.clone();
                    if mapped && def.input_type.is_none() && def.value.is_none() {
                        def.input_type = Some(InputType::Cast);
                    }
                    def
                })
                .collect(),
        )
    }

    /// The configured reader, wrapped in a [`MappedSource`] in mapped mode.
    pub fn build_source(&self) -> Result<Box<dyn RecordSource>> {
        let reader = self.build_reader()?;
        if !self.is_mapped() {
            return Ok(reader);
        }
        let input = SchemaDef::new(
            self.config.source.fields.iter().map(|field| field.def.clone()).collect(),
        )
            .build()
            .context("Invalid [[source.fields]]")?;
        debug!(inputs = input.len(), "source runs in mapped mode");
        Ok(Box::new(MappedSource::new(reader, input, self.sink_def().to_fields())))
    }

    fn build_reader(&self) -> Result<Box<dyn RecordSource>> {
        let source = &self.config.source;
        let reader: Box<dyn RecordSource> = match source.kind {
            SourceKind::Csv => {
                let input = FileInput::new(self.source_path()?);
                let csv_dialect = dialect(source.delimiter, source.enclosure, source.has_header);
                if !source.columns.is_empty() {
                    Box::new(CsvSource::new(input, csv_dialect, self.columns::<usize>()?))
                } else if csv_dialect.has_header {
                    Box::new(CsvSource::from_header(input, csv_dialect)?)
                } else {
                    return Err(HelpfulError::missing_option("source", "csv", "columns")
                        .with_context("Without a header row, fields need explicit column indexes")
                        .into());
                }
            }
            SourceKind::Fixed => {
                let columns = if source.widths.is_empty() {
                    let mut columns = FixedColumns::new();
                    for (name, column) in self.columns::<FixedColumn>()? {
                        columns.insert(name, column.start, column.length);
                    }
                    columns
                } else {
                    FixedColumns::sequential(&source.widths)
                };
                Box::new(FixedSource::new(FileInput::new(self.source_path()?), columns))
            }
            SourceKind::Directory => Box::new(DirectorySource::new(
                self.source_path()?,
                source.pattern.as_deref().unwrap_or("*"),
            )),
            SourceKind::Sql => self.build_sql()?,
        };
        Ok(reader)
    }

    #[cfg(feature = "duckdb")]
    fn build_sql(&self) -> Result<Box<dyn RecordSource>> {
        use batchflow_io::{DuckDbBackend, SqlSource};

        let source = &self.config.source;
        let query = source
            .query
            .clone()
            .ok_or_else(|| HelpfulError::missing_option("source", "sql", "query"))?;
        let backend = match &source.database {
            Some(path) => DuckDbBackend::open(self.resolve(path))?,
            None => DuckDbBackend::open_in_memory()?,
        };
        let mut sql = SqlSource::new(backend, query);
        for (field, column) in self.columns::<String>()? {
            sql = sql.with_column(field, column);
        }
        Ok(Box::new(sql))
    }

    #[cfg(not(feature = "duckdb"))]
    fn build_sql(&self) -> Result<Box<dyn RecordSource>> {
        Err(HelpfulError::sql_unavailable().into())
    }

    /// Interpret `[source] columns` for the configured kind.
    fn columns<T: serde::de::DeserializeOwned>(&self) -> Result<IndexMap<String, T>> {
        let source = &self.config.source;
        source
            .columns
            .iter()
            .map(|(name, value)| -> Result<(String, T)> {
                let column = value.clone().try_into::<T>().map_err(|e| {
                    HelpfulError::new(format!("Invalid column for field '{}'", name))
                        .with_context(format!("{} sources: {}", source.kind.as_str(), e))
                })?;
                Ok((name.clone(), column))
            })
            .collect()
    }

    pub fn build_sink(&self) -> Result<Box<dyn RecordSink>> {
        let sink = &self.config.sink;
        let output = FileOutput::new(self.resolve(&sink.path));
        let def = self.sink_def();
        let built: Box<dyn RecordSink> = match sink.kind {
            SinkKind::Csv => Box::new(CsvSink::new(
                output,
                dialect(sink.delimiter, sink.enclosure, sink.has_header),
                def,
            )?),
            SinkKind::Fixed => {
                let layouts: IndexMap<String, String> = sink
                    .fields
                    .iter()
                    .filter_map(|field| Some((field.def.name.clone(), field.layout.clone()?)))
                    .collect();
                Box::new(FixedSink::new(output, def, &layouts)?)
            }
        };
        Ok(built)
    }

    /// Stream every record from the source into the sink.
    pub fn run(&self) -> Result<u64> {
        let mut source = self.build_source()?;
        let mut sink = self.build_sink()?;
        info!(
            job = %self.path.display(),
            source = self.config.source.kind.as_str(),
            sink = self.config.sink.kind.as_str(),
            "running job"
        );
        let rows = sink
            .process(source.as_mut())
            .with_context(|| format!("Job failed: {}", self.path.display()))?;
        Ok(rows)
    }

    /// Build both sides and configure the source without touching any data.
    pub fn check(&self) -> Result<JobSummary> {
        let mut source = self.build_source()?;
        let sink = self.build_sink()?;
        source
            .configure(sink.schema(), &sink.input_fields())
            .context("Source does not provide the sink's fields")?;

        let fields = self
            .sink_def()
            .fields
            .into_iter()
            .map(|def| FieldSummary {
                input: def.input.clone().unwrap_or_else(|| def.name.clone()),
                input_type: def.effective_input_type(),
                declared: def.declared,
                name: def.name,
            })
            .collect();
        Ok(JobSummary {
            source: self.config.source.kind,
            sink: self.config.sink.kind,
            mapped: self.is_mapped(),
            fields,
        })
    }

    /// Pull at most `limit` records and render them the way the sink would
    /// see them.
    pub fn preview(&self, limit: usize) -> Result<Preview> {
        let mut source = self.build_source()?;
        let sink = self.build_sink()?;
        source.configure(sink.schema(), &sink.input_fields())?;

        let columns = self.sink_def().names();
        let mut rows = Vec::new();
        for record in source.records().take(limit) {
            let record = record?;
            let row = columns
                .iter()
                .map(|name| field_raw(&record, sink.schema(), name))
                .collect::<batchflow_core::Result<Vec<_>>>()?;
            rows.push(row);
        }
        Ok(Preview { columns, rows })
    }
}

const FIELD_KEYS: &str =
    "name, type, min, max, notation, date_format, format, input, input_type, value";

fn reject_unknown_keys(table: &str, field: &str, unknown: &toml::Table) -> Result<()> {
    let Some(key) = unknown.keys().next() else {
        return Ok(());
    };
    let mut known = FIELD_KEYS.to_string();
    if table == "sink" {
        known.push_str(", layout");
    }
    Err(HelpfulError::new(format!(
        "Unknown key `{}` in [[{}.fields]] entry '{}'",
        key, table, field
    ))
    .with_context(format!("Field entries accept: {}", known))
    .with_suggestion("TRY: Check the key's spelling")
    .into())
}
