//! Fixed-width text source and sink.

use std::io::{BufRead, BufReader, Read, Write};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use batchflow_core::{
    field_raw, Bindings, DeclaredType, Error, FormatArg, Record, RecordSink, RecordSource, RenderPattern,
    Result, Schema, SchemaDef,
};

use crate::medium::{InputMedium, OutputMedium};

/// Modifier stripping every `.` from the rendered value.
pub const NO_DOT: &str = "|no_dot";

/// Character offset and width of one field within a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedColumn {
    pub start: usize,
    pub length: usize,
}

impl FixedColumn {
    /// Offset of the column following this one.
    pub fn end(&self) -> usize {
        self.start.saturating_add(self.length)
    }

    fn slice<'a>(&self, line: &'a str) -> &'a str {
        let byte_at = |chars: usize| line.char_indices().nth(chars).map_or(line.len(), |(i, _)| i);
        &line[byte_at(self.start)..byte_at(self.end())]
    }
}

/// Field name to column layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FixedColumns(IndexMap<String, FixedColumn>);

impl FixedColumns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lay columns out back to back, starting at offset zero.
    pub fn sequential<S: AsRef<str>>(widths: &[(S, usize)]) -> Self {
        let mut columns = Self::new();
        let mut start = 0;
        for (name, length) in widths {
            start = columns.insert(name.as_ref(), start, *length);
        }
        columns
    }

    /// Add a column and return the offset just past it.
    pub fn insert(&mut self, name: impl Into<String>, start: usize, length: usize) -> usize {
        let column = FixedColumn { start, length };
        self.0.insert(name.into(), column);
        column.end()
    }

    pub fn get(&self, name: &str) -> Option<FixedColumn> {
        self.0.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, FixedColumn)> {
        self.0.iter().map(|(name, column)| (name.as_str(), *column))
    }
}

/// Reads one record per line, slicing each field by character offsets.
pub struct FixedSource {
    medium: Box<dyn InputMedium>,
    columns: FixedColumns,
    layout: Vec<FixedColumn>,
    bindings: Bindings,
    reader: Option<BufReader<Box<dyn Read>>>,
    line: String,
    line_number: u64,
}

impl FixedSource {
    pub fn new(medium: impl InputMedium + 'static, columns: FixedColumns) -> Self {
        Self {
            medium: Box::new(medium),
            columns,
            layout: Vec::new(),
            bindings: Bindings::default(),
            reader: None,
            line: String::new(),
            line_number: 0,
        }
    }
}

impl RecordSource for FixedSource {
    fn configure(&mut self, schema: &Schema, field_names: &[String]) -> Result<()> {
        let bindings = Bindings::resolve(schema, field_names)?;
        self.layout = field_names
            .iter()
            .map(|name| {
                self.columns.get(name).ok_or_else(|| {
                    Error::configuration(format!("Field '{}' has no fixed-width column", name))
                })
            })
            .collect::<Result<_>>()?;
        self.bindings = bindings;
        Ok(())
    }

    fn open(&mut self) -> Result<()> {
        self.reader = Some(BufReader::new(self.medium.open()?));
        self.line_number = 0;
        info!(source = %self.medium.describe(), "opened fixed-width source");
        Ok(())
    }

    fn read(&mut self) -> Result<bool> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| Error::configuration("Fixed-width source is not open"))?;
        self.line.clear();
        let read = reader.read_line(&mut self.line).map_err(|e| {
            Error::resource(
                format!(
                    "Failed to read line {} of {}",
                    self.line_number + 1,
                    self.medium.describe()
                ),
                e,
            )
        })?;
        if read == 0 {
            return Ok(false);
        }
        self.line_number += 1;

        let line = self.line.trim_end_matches(['\n', '\r']);
        for ((_, value), column) in self.bindings.iter().zip(&self.layout) {
            let cell = column.slice(line).trim();
            // A blank boolean cell is the null raw form.
            let blank_boolean = cell.is_empty() && value.declared_type() == DeclaredType::Boolean;
            value.set_raw((!blank_boolean).then_some(cell))?;
        }
        Ok(true)
    }

    fn close(&mut self) -> Result<()> {
        if self.reader.take().is_some() {
            debug!(
                source = %self.medium.describe(),
                lines = self.line_number,
                "closed fixed-width source"
            );
        }
        Ok(())
    }

    fn bindings(&self) -> &Bindings {
        &self.bindings
    }
}

/// A printf-style layout with the optional `|no_dot` modifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutPattern {
    pattern: RenderPattern,
    no_dot: bool,
}

impl LayoutPattern {
    pub fn parse(layout: &str) -> Result<Self> {
        let no_dot = layout.contains(NO_DOT);
        let pattern = RenderPattern::parse(&layout.replace(NO_DOT, ""))?;
        Ok(Self { pattern, no_dot })
    }

    /// Pass a raw value through the pattern, then apply the modifier.
    pub fn render(&self, raw: &str) -> String {
        let rendered = self.pattern.render(FormatArg::Str(raw));
        if self.no_dot {
            rendered.replace('.', "")
        } else {
            rendered
        }
    }
}

/// Writes one line per record, concatenating each field's rendered layout.
pub struct FixedSink {
    medium: Box<dyn OutputMedium>,
    def: SchemaDef,
    schema: Schema,
    layouts: Vec<(String, LayoutPattern)>,
    writer: Option<Box<dyn Write>>,
    line: String,
    rows_written: u64,
}

impl FixedSink {
    /// Every field in `def` needs a layout, and every layout a field.
    pub fn new(
        medium: impl OutputMedium + 'static,
        def: SchemaDef,
        layouts: &IndexMap<String, String>,
    ) -> Result<Self> {
        if let Some(name) = layouts.keys().find(|name| !def.fields.iter().any(|f| &f.name == *name)) {
            return Err(Error::configuration(format!(
                "Layout '{}' does not match any sink field",
                name
            )));
        }
        let layouts = def
            .fields
            .iter()
            .map(|field| -> Result<(String, LayoutPattern)> {
                let layout = layouts.get(&field.name).ok_or_else(|| {
                    Error::configuration(format!("Field '{}' has no fixed-width layout", field.name))
                })?;
                Ok((field.name.clone(), LayoutPattern::parse(layout)?))
            })
            .collect::<Result<Vec<_>>>()?;
        let schema = def.build()?;

        Ok(Self {
            medium: Box::new(medium),
            def,
            schema,
            layouts,
            writer: None,
            line: String::new(),
            rows_written: 0,
        })
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    fn write_error(&self, e: std::io::Error) -> Error {
        Error::resource(format!("Failed to write to {}", self.medium.describe()), e)
    }
}

impl RecordSink for FixedSink {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn input_fields(&self) -> Vec<String> {
        self.def.input_names()
    }

    fn open(&mut self) -> Result<()> {
        self.writer = Some(self.medium.create()?);
        self.rows_written = 0;
        info!(sink = %self.medium.describe(), "opened fixed-width sink");
        Ok(())
    }

    fn write(&mut self, record: &Record) -> Result<()> {
        self.line.clear();
        for (name, layout) in &self.layouts {
            let raw = field_raw(record, &self.schema, name)?;
            self.line.push_str(&layout.render(&raw));
        }
        self.line.push('\n');

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::configuration("Fixed-width sink is not open"))?;
        if let Err(e) = writer.write_all(self.line.as_bytes()) {
            return Err(self.write_error(e));
        }
        self.rows_written += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer.flush().map_err(|e| self.write_error(e))?;
        debug!(sink = %self.medium.describe(), rows = self.rows_written, "closed fixed-width sink");
        Ok(())
    }
}
