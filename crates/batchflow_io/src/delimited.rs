//! Delimited text source and sink.

use std::io::{Read, Write};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use batchflow_core::{
    field_raw, Bindings, Error, Record, RecordSink, RecordSource, Result, Schema, SchemaDef,
};

use crate::medium::{InputMedium, OutputMedium};

fn default_delimiter() -> char {
    ','
}

fn default_enclosure() -> char {
    '"'
}

fn default_has_header() -> bool {
    true
}

/// Delimiter, enclosure and header settings shared by source and sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvDialect {
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    #[serde(default = "default_enclosure")]
    pub enclosure: char,

    /// The first row holds column names (skipped when reading, written when writing)
    #[serde(default = "default_has_header")]
    pub has_header: bool,
}

impl Default for CsvDialect {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            enclosure: default_enclosure(),
            has_header: default_has_header(),
        }
    }
}

impl CsvDialect {
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    fn bytes(&self) -> Result<(u8, u8)> {
        let byte = |c: char, what: &str| {
            u8::try_from(c)
                .ok()
                .filter(u8::is_ascii)
                .ok_or_else(|| Error::configuration(format!("CSV {} must be ASCII, got {:?}", what, c)))
        };
        Ok((byte(self.delimiter, "delimiter")?, byte(self.enclosure, "enclosure")?))
    }
}

/// Reads one record per CSV row, mapping field names to column indexes.
pub struct CsvSource {
    medium: Box<dyn InputMedium>,
    dialect: CsvDialect,
    columns: IndexMap<String, usize>,
    positions: Vec<usize>,
    bindings: Bindings,
    reader: Option<csv::Reader<Box<dyn Read>>>,
    row: StringRecord,
}

impl CsvSource {
    pub fn new(
        medium: impl InputMedium + 'static,
        dialect: CsvDialect,
        columns: IndexMap<String, usize>,
    ) -> Self {
        Self {
            medium: Box::new(medium),
            dialect,
            columns,
            positions: Vec::new(),
            bindings: Bindings::default(),
            reader: None,
            row: StringRecord::new(),
        }
    }

    /// Map every column of the header row to its index.
    ///
    /// The header is read here, while building the source, so that a field
    /// missing from it fails at `configure` like any other unmapped field.
    pub fn from_header(medium: impl InputMedium + 'static, dialect: CsvDialect) -> Result<Self> {
        if !dialect.has_header {
            return Err(Error::configuration(
                "CSV columns can only be taken from a header row when the dialect has one",
            ));
        }
        let (delimiter, quote) = dialect.bytes()?;
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .quote(quote)
            .has_headers(true)
            .flexible(true)
            .from_reader(medium.open()?);
        let headers = reader.headers().map_err(|e| {
            Error::resource(format!("Failed to read CSV header of {}", medium.describe()), e)
        })?;

        let mut columns = IndexMap::with_capacity(headers.len());
        for (index, name) in headers.iter().enumerate() {
            columns.entry(name.trim().to_string()).or_insert(index);
        }
        debug!(source = %medium.describe(), columns = columns.len(), "mapped CSV header");
        Ok(Self::new(medium, dialect, columns))
    }

    pub fn columns(&self) -> &IndexMap<String, usize> {
        &self.columns
    }
}

impl RecordSource for CsvSource {
    fn configure(&mut self, schema: &Schema, field_names: &[String]) -> Result<()> {
        self.dialect.bytes()?;
        let bindings = Bindings::resolve(schema, field_names)?;
        self.positions = field_names
            .iter()
            .map(|name| {
                self.columns.get(name).copied().ok_or_else(|| {
                    Error::configuration(format!("Field '{}' has no CSV column", name))
                })
            })
            .collect::<Result<_>>()?;
        self.bindings = bindings;
        Ok(())
    }

    fn open(&mut self) -> Result<()> {
        let (delimiter, quote) = self.dialect.bytes()?;
        let input = self.medium.open()?;
        let reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .quote(quote)
            .has_headers(self.dialect.has_header)
            .flexible(true)
            .from_reader(input);

        self.reader = Some(reader);
        info!(source = %self.medium.describe(), "opened CSV source");
        Ok(())
    }

    fn read(&mut self) -> Result<bool> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| Error::configuration("CSV source is not open"))?;
        let more = reader.read_record(&mut self.row).map_err(|e| {
            let line = e.position().map_or(0, |p| p.line());
            Error::resource(
                format!("Failed to read CSV row at line {} of {}", line, self.medium.describe()),
                e,
            )
        })?;
        if !more {
            return Ok(false);
        }

        for ((_, value), position) in self.bindings.iter().zip(&self.positions) {
            // Short rows leave the missing cells null.
            value.set_raw(self.row.get(*position))?;
        }
        Ok(true)
    }

    fn close(&mut self) -> Result<()> {
        if self.reader.take().is_some() {
            debug!(source = %self.medium.describe(), "closed CSV source");
        }
        Ok(())
    }

    fn bindings(&self) -> &Bindings {
        &self.bindings
    }
}

/// Writes one CSV row per record, in schema order.
pub struct CsvSink {
    medium: Box<dyn OutputMedium>,
    dialect: CsvDialect,
    def: SchemaDef,
    schema: Schema,
    writer: Option<csv::Writer<Box<dyn Write>>>,
    rows_written: u64,
}

impl CsvSink {
    pub fn new(medium: impl OutputMedium + 'static, dialect: CsvDialect, def: SchemaDef) -> Result<Self> {
        dialect.bytes()?;
        let schema = def.build()?;
        Ok(Self {
            medium: Box::new(medium),
            dialect,
            def,
            schema,
            writer: None,
            rows_written: 0,
        })
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    fn write_error(&self, e: impl Into<anyhow::Error>) -> Error {
        Error::resource(format!("Failed to write CSV to {}", self.medium.describe()), e)
    }
}

impl RecordSink for CsvSink {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn input_fields(&self) -> Vec<String> {
        self.def.input_names()
    }

    fn open(&mut self) -> Result<()> {
        let (delimiter, quote) = self.dialect.bytes()?;
        let output = self.medium.create()?;
        let mut writer = WriterBuilder::new()
            .delimiter(delimiter)
            .quote(quote)
            .from_writer(output);
        if self.dialect.has_header {
            writer
                .write_record(self.def.names())
                .map_err(|e| self.write_error(e))?;
        }
        self.writer = Some(writer);
        self.rows_written = 0;
        info!(sink = %self.medium.describe(), "opened CSV sink");
        Ok(())
    }

    fn write(&mut self, record: &Record) -> Result<()> {
        let row = self
            .def
            .fields
            .iter()
            .map(|field| field_raw(record, &self.schema, &field.name))
            .collect::<Result<Vec<_>>>()?;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::configuration("CSV sink is not open"))?;
        if let Err(e) = writer.write_record(&row) {
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
        debug!(sink = %self.medium.describe(), rows = self.rows_written, "closed CSV sink");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medium::{MemoryInput, MemoryOutput};
    use batchflow_core::{DeclaredType, FieldDef, IntegerValue, StringValue};

    fn columns(pairs: &[(&str, usize)]) -> IndexMap<String, usize> {
        pairs.iter().map(|(name, i)| (name.to_string(), *i)).collect()
    }

    #[test]
    fn test_reads_by_column_index_and_skips_header() {
        let input = MemoryInput::new("name;id\n\"Doe; Jane\";007\nSmith;8\n");
        let stats = input.stats();
        let mut schema = Schema::new();
        schema.add("id", IntegerValue::new()).unwrap();
        schema.add("name", StringValue::new()).unwrap();

        let mut source = CsvSource::new(
            input,
            CsvDialect::default().with_delimiter(';'),
            columns(&[("name", 0), ("id", 1)]),
        );
        source
            .configure(&schema, &["id".to_string(), "name".to_string()])
            .unwrap();

        let records: Vec<Record> = source.records().collect::<Result<_>>().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].integer("id").unwrap(), Some(7));
        assert_eq!(records[0].string("name").unwrap().as_deref(), Some("Doe; Jane"));
        assert_eq!(records[1].raw("name").unwrap(), "Smith");
        assert_eq!(stats.opened(), 1);
        assert_eq!(stats.closed(), 1);
    }

    #[test]
    fn test_header_columns_are_checked_at_configure() {
        let input = MemoryInput::new("id, name\n1,Ada\n");
        let stats = input.stats();
        let mut source = CsvSource::from_header(input, CsvDialect::default()).unwrap();
        assert_eq!(source.columns().get("name"), Some(&1));
        assert_eq!(stats.opened(), 1);
        assert_eq!(stats.closed(), 1);

        let mut schema = Schema::new();
        schema.add("name", StringValue::new()).unwrap();
        schema.add("nmae", StringValue::new()).unwrap();
        let err = source.configure(&schema, &["nmae".to_string()]).unwrap_err();
        assert!(err.to_string().contains("Field 'nmae' has no CSV column"));
        assert_eq!(stats.opened(), 1);

        source.configure(&schema, &["name".to_string()]).unwrap();
        let records: Vec<Record> = source.records().collect::<Result<_>>().unwrap();
        assert_eq!(records[0].raw("name").unwrap(), "Ada");
    }

    #[test]
    fn test_header_columns_need_a_header_row() {
        let result = CsvSource::from_header(MemoryInput::new("1,2\n"), CsvDialect::default().with_header(false));
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_short_rows_leave_cells_null() {
        let input = MemoryInput::new("1,x\n2\n");
        let mut schema = Schema::new();
        schema.add("id", IntegerValue::new()).unwrap();
        schema.add("tag", StringValue::new()).unwrap();
        let mut source = CsvSource::new(
            input,
            CsvDialect::default().with_header(false),
            columns(&[("id", 0), ("tag", 1)]),
        );
        source
            .configure(&schema, &["id".to_string(), "tag".to_string()])
            .unwrap();
        let records: Vec<Record> = source.records().collect::<Result<_>>().unwrap();
        assert_eq!(records[1].string("tag").unwrap(), None);
    }

    #[test]
    fn test_unmapped_field_fails_at_configure() {
        let mut schema = Schema::new();
        schema.add("id", IntegerValue::new()).unwrap();
        let input = MemoryInput::new("");
        let stats = input.stats();
        let mut source = CsvSource::new(input, CsvDialect::default(), IndexMap::new());
        let err = source.configure(&schema, &["id".to_string()]).unwrap_err();
        assert!(err.to_string().contains("has no CSV column"));
        assert_eq!(stats.opened(), 0);
    }

    #[test]
    fn test_sink_writes_header_and_quotes() {
        let output = MemoryOutput::new();
        let mut amount = FieldDef::new("amount", DeclaredType::Decimal);
        amount.format = Some("%.2f".to_string());
        let def = SchemaDef::new(vec![FieldDef::new("name", DeclaredType::String), amount]);
        let mut sink = CsvSink::new(output.clone(), CsvDialect::default(), def).unwrap();

        let mut source = CsvSource::new(
            MemoryInput::new("Doe, Jane;12.5\nSmith;3\n"),
            CsvDialect::default().with_delimiter(';').with_header(false),
            columns(&[("name", 0), ("amount", 1)]),
        );
        assert_eq!(sink.process(&mut source).unwrap(), 2);
        assert_eq!(sink.rows_written(), 2);
        assert_eq!(output.text(), "name,amount\n\"Doe, Jane\",12.50\nSmith,3.00\n");
        assert_eq!(output.stats().closed(), 1);
    }

    #[test]
    fn test_non_ascii_delimiter_is_rejected() {
        let def = SchemaDef::new(vec![FieldDef::new("name", DeclaredType::String)]);
        let dialect = CsvDialect::default().with_delimiter('§');
        assert!(matches!(
            CsvSink::new(MemoryOutput::new(), dialect, def),
            Err(Error::Configuration(_))
        ));
    }
}
