//! The record sink protocol.

use tracing::{info, warn};

use crate::error::Result;
use crate::record::Record;
use crate::schema::Schema;
use crate::source::{RecordSource, Records};

/// A row-oriented consumer owning its schema and output resource.
pub trait RecordSink {
    /// The schema built by this sink's factory.
    fn schema(&self) -> &Schema;

    /// Names the upstream source must populate. Defaults to every field.
    fn input_fields(&self) -> Vec<String> {
        self.schema().keys().map(str::to_string).collect()
    }

    fn open(&mut self) -> Result<()>;

    fn write(&mut self, record: &Record) -> Result<()>;

    /// Release the output resource. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Configure `source` against this sink's schema and write every record.
    ///
    /// The output is closed on every path; an earlier error wins over a close
    /// error.
    fn process(&mut self, source: &mut dyn RecordSource) -> Result<u64> {
        let inputs = self.input_fields();
        source.configure(self.schema(), &inputs)?;

        self.open()?;
        let written = write_all(self, source);
        let closed = self.close();

        match written {
            Ok(rows) => {
                closed?;
                info!(rows, "sink finished");
                Ok(rows)
            }
            Err(err) => {
                if let Err(close_err) = closed {
                    warn!(error = %close_err, "failed to close sink after error");
                }
                Err(err)
            }
        }
    }
}

fn write_all<K: RecordSink + ?Sized>(sink: &mut K, source: &mut dyn RecordSource) -> Result<u64> {
    let mut rows = 0u64;
    for record in Records::new(source) {
        sink.write(&record?)?;
        rows += 1;
    }
    Ok(rows)
}

/// Raw string for `name`: from the record when present, otherwise from the
/// schema (fields populated outside the source, such as constants).
pub fn field_raw(record: &Record, schema: &Schema, name: &str) -> Result<String> {
    match record.get(name) {
        Some(value) => Ok(value.raw()),
        None => Ok(schema.value(name)?.raw()),
    }
}
