//! Query results as records.
//!
//! The backend is a cursor: the query starts at open and each read pulls
//! one row from it. SQL NULL becomes a null value.

use indexmap::IndexMap;
use tracing::{debug, info};

use batchflow_core::{Bindings, Error, RecordSource, Result, Schema};

/// One result row, cells already rendered as raw strings.
pub type SqlRow = Vec<Option<String>>;

/// Runs one query at a time and yields its rows in order.
pub trait SqlBackend {
    /// Start `sql` and return the names of its result columns.
    fn execute(&mut self, sql: &str) -> anyhow::Result<Vec<String>>;

    /// The next row of the running query, `None` once it is exhausted.
    fn next_row(&mut self) -> anyhow::Result<Option<SqlRow>>;

    /// Abandon the running query, if any.
    fn finish(&mut self);

    fn describe(&self) -> String;
}

/// Reads the rows of one query.
///
/// Each configured field reads the column of the same name unless
/// `columns` maps it elsewhere.
pub struct SqlSource<B> {
    backend: B,
    query: String,
    columns: IndexMap<String, String>,
    bindings: Bindings,
    positions: Vec<usize>,
    rows_read: Option<u64>,
}

impl<B: SqlBackend> SqlSource<B> {
    pub fn new(backend: B, query: impl Into<String>) -> Self {
        Self {
            backend,
            query: query.into(),
            columns: IndexMap::new(),
            bindings: Bindings::default(),
            positions: Vec::new(),
            rows_read: None,
        }
    }

    /// Read `field` from `column` instead of the column of the same name.
    pub fn with_column(mut self, field: impl Into<String>, column: impl Into<String>) -> Self {
        self.columns.insert(field.into(), column.into());
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn column_for<'a>(&'a self, field: &'a str) -> &'a str {
        self.columns.get(field).map_or(field, String::as_str)
    }

    fn resolve_positions(&self, result_columns: &[String]) -> Result<Vec<usize>> {
        self.bindings
            .names()
            .map(|name| {
                let column = self.column_for(name);
                result_columns
                    .iter()
                    .position(|candidate| candidate == column)
                    .ok_or_else(|| {
                        Error::configuration(format!(
                            "Query result has no column '{}' for field '{}'",
                            column, name
                        ))
                    })
            })
            .collect()
    }
}

impl<B: SqlBackend> RecordSource for SqlSource<B> {
    fn configure(&mut self, schema: &Schema, field_names: &[String]) -> Result<()> {
        self.bindings = Bindings::resolve(schema, field_names)?;
        Ok(())
    }

    fn open(&mut self) -> Result<()> {
        let result_columns = self.backend.execute(&self.query).map_err(|e| {
            Error::resource(format!("Query failed on {}", self.backend.describe()), e)
        })?;

        let positions = match self.resolve_positions(&result_columns) {
            Ok(positions) => positions,
            Err(e) => {
                self.backend.finish();
                return Err(e);
            }
        };

        info!(
            backend = %self.backend.describe(),
            columns = result_columns.len(),
            "opened sql source"
        );
        self.positions = positions;
        self.rows_read = Some(0);
        Ok(())
    }

    fn read(&mut self) -> Result<bool> {
        let rows_read = self
            .rows_read
            .as_mut()
            .ok_or_else(|| Error::configuration("SQL source is not open"))?;
        let row = self.backend.next_row().map_err(|e| {
            Error::resource(format!("Fetching a row failed on {}", self.backend.describe()), e)
        })?;
        let Some(row) = row else {
            return Ok(false);
        };
        *rows_read += 1;
        for ((_, value), position) in self.bindings.iter().zip(&self.positions) {
            let cell = row.get(*position).and_then(Option::as_deref);
            value.set_raw(cell)?;
        }
        Ok(true)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(rows) = self.rows_read.take() {
            self.backend.finish();
            debug!(backend = %self.backend.describe(), rows, "closed sql source");
        }
        Ok(())
    }

    fn bindings(&self) -> &Bindings {
        &self.bindings
    }
}

#[cfg(feature = "sql-duckdb")]
pub use duck::DuckDbBackend;

#[cfg(feature = "sql-duckdb")]
mod duck {
    use std::path::{Path, PathBuf};
    use std::sync::mpsc::{self, Receiver};
    use std::thread::{self, JoinHandle};
    use std::time::Instant;

    use duckdb::types::{TimeUnit, ValueRef};
    use tracing::debug_span;

    use super::{SqlBackend, SqlRow};

    /// Rows fetched ahead of the reader.
    const ROW_BUFFER: usize = 256;

    struct Cursor {
        rows: Receiver<anyhow::Result<SqlRow>>,
        worker: JoinHandle<()>,
    }

    /// DuckDB database file, or an in-memory database.
    ///
    /// Each query runs on its own thread over a clone of the connection and
    /// hands rows over a bounded channel.
    pub struct DuckDbBackend {
        conn: duckdb::Connection,
        path: Option<PathBuf>,
        cursor: Option<Cursor>,
    }

    impl DuckDbBackend {
        pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
            let path = path.as_ref();
            Ok(Self {
                conn: duckdb::Connection::open(path)?,
                path: Some(path.to_path_buf()),
                cursor: None,
            })
        }

        pub fn open_in_memory() -> anyhow::Result<Self> {
            Ok(Self {
                conn: duckdb::Connection::open_in_memory()?,
                path: None,
                cursor: None,
            })
        }

        pub fn execute_batch(&self, sql: &str) -> anyhow::Result<()> {
            self.conn.execute_batch(sql)?;
            Ok(())
        }
    }

    impl SqlBackend for DuckDbBackend {
        fn execute(&mut self, sql: &str) -> anyhow::Result<Vec<String>> {
            self.finish();

            let conn = self.conn.try_clone()?;
            let sql = sql.to_string();
            let (columns_tx, columns_rx) = mpsc::sync_channel(1);
            let (rows_tx, rows_rx) = mpsc::sync_channel(ROW_BUFFER);
            let worker = thread::spawn(move || {
                let span = debug_span!("sql.query", duration_ms = tracing::field::Empty);
                let _guard = span.enter();
                let start = Instant::now();

                let mut stmt = match conn.prepare(&sql) {
                    Ok(stmt) => stmt,
                    Err(err) => {
                        let _ = columns_tx.send(Err(anyhow::Error::from(err)));
                        return;
                    }
                };
                let mut rows_iter = match stmt.query([]) {
                    Ok(rows) => rows,
                    Err(err) => {
                        let _ = columns_tx.send(Err(anyhow::Error::from(err)));
                        return;
                    }
                };

                let Some(stmt_ref) = rows_iter.as_ref() else {
                    let _ = columns_tx.send(Ok(Vec::new()));
                    return;
                };
                let column_count = stmt_ref.column_count();
                let columns: Vec<String> = (0..column_count)
                    .map(|i| {
                        stmt_ref
                            .column_name(i)
                            .map(|s| s.to_string())
                            .unwrap_or_else(|_| format!("col{}", i))
                    })
                    .collect();
                if columns_tx.send(Ok(columns)).is_err() {
                    return;
                }

                loop {
                    let fetched = rows_iter.next().and_then(|row| {
                        row.map(|row| {
                            (0..column_count)
                                .map(|i| -> duckdb::Result<Option<String>> {
                                    Ok(cell_to_raw(row.get_ref(i)?))
                                })
                                .collect::<duckdb::Result<SqlRow>>()
                        })
                        .transpose()
                    });
                    let message = match fetched {
                        Ok(Some(row)) => Ok(row),
                        Ok(None) => break,
                        Err(err) => Err(anyhow::Error::from(err)),
                    };
                    let failed = message.is_err();
                    // send blocks while the buffer is full and fails once the reader is gone
                    if rows_tx.send(message).is_err() || failed {
                        break;
                    }
                }
                span.record("duration_ms", start.elapsed().as_millis() as u64);
            });

            let columns = match columns_rx.recv() {
                Ok(columns) => columns,
                Err(_) => Err(anyhow::anyhow!("DuckDB query thread exited before starting")),
            };
            self.cursor = Some(Cursor {
                rows: rows_rx,
                worker,
            });
            match columns {
                Ok(columns) => Ok(columns),
                Err(err) => {
                    self.finish();
                    Err(err)
                }
            }
        }

        fn next_row(&mut self) -> anyhow::Result<Option<SqlRow>> {
            let Some(cursor) = self.cursor.as_ref() else {
                return Ok(None);
            };
            match cursor.rows.recv() {
                Ok(row) => row.map(Some),
                Err(_) => {
                    let finished = self.cursor.take().map(|cursor| cursor.worker.join());
                    match finished {
                        Some(Err(_)) => anyhow::bail!("DuckDB query thread panicked"),
                        _ => Ok(None),
                    }
                }
            }
        }

        fn finish(&mut self) {
            if let Some(cursor) = self.cursor.take() {
                drop(cursor.rows);
                let _ = cursor.worker.join();
            }
        }

        fn describe(&self) -> String {
            match &self.path {
                Some(path) => format!("duckdb:{}", path.display()),
                None => "duckdb:memory".to_string(),
            }
        }
    }

    impl Drop for DuckDbBackend {
        fn drop(&mut self) {
            self.finish();
        }
    }

    fn micros(unit: TimeUnit, v: i64) -> Option<i64> {
        match unit {
            TimeUnit::Second => v.checked_mul(1_000_000),
            TimeUnit::Millisecond => v.checked_mul(1_000),
            TimeUnit::Microsecond => Some(v),
            TimeUnit::Nanosecond => Some(v.div_euclid(1_000)),
        }
    }

    /// Whole seconds and the nanosecond remainder, flooring toward the past.
    fn split_micros(micros: i64) -> (i64, u32) {
        let secs = micros.div_euclid(1_000_000);
        let nanos = micros.rem_euclid(1_000_000) * 1_000;
        (secs, nanos as u32)
    }

    fn timestamp_raw(unit: TimeUnit, v: i64) -> String {
        micros(unit, v)
            .map(split_micros)
            .and_then(|(secs, nanos)| chrono::DateTime::from_timestamp(secs, nanos))
            .map(|dt| dt.naive_utc().format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| v.to_string())
    }

    fn time_raw(unit: TimeUnit, v: i64) -> String {
        micros(unit, v)
            .map(split_micros)
            .and_then(|(secs, nanos)| {
                let secs = u32::try_from(secs).ok()?;
                chrono::NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
            })
            .map(|time| time.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| v.to_string())
    }

    /// Render a cell the way the typed values parse it back.
    fn cell_to_raw(value: ValueRef<'_>) -> Option<String> {
        let raw = match value {
            ValueRef::Null => return None,
            ValueRef::Boolean(v) => (if v { "1" } else { "0" }).to_string(),
            ValueRef::TinyInt(v) => v.to_string(),
            ValueRef::SmallInt(v) => v.to_string(),
            ValueRef::Int(v) => v.to_string(),
            ValueRef::BigInt(v) => v.to_string(),
            ValueRef::HugeInt(v) => v.to_string(),
            ValueRef::UTinyInt(v) => v.to_string(),
            ValueRef::USmallInt(v) => v.to_string(),
            ValueRef::UInt(v) => v.to_string(),
            ValueRef::UBigInt(v) => v.to_string(),
            ValueRef::Float(v) => v.to_string(),
            ValueRef::Double(v) => v.to_string(),
            ValueRef::Decimal(v) => v.normalize().to_string(),
            ValueRef::Text(v) => String::from_utf8_lossy(v).to_string(),
            ValueRef::Timestamp(unit, v) => timestamp_raw(unit, v),
            ValueRef::Date32(days) => {
                match days
                    .checked_add(719_163)
                    .and_then(chrono::NaiveDate::from_num_days_from_ce_opt)
                {
                    Some(date) => date.format("%Y-%m-%d").to_string(),
                    None => days.to_string(),
                }
            }
            ValueRef::Time64(unit, v) => time_raw(unit, v),
            other => {
                tracing::warn!(
                    "DuckDB type {:?} mapped to debug string",
                    std::mem::discriminant(&other)
                );
                format!("{:?}", other)
            }
        };
        Some(raw)
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::sql::SqlSource;
        use batchflow_core::{
            BooleanValue, DateTimeValue, DecimalValue, Record, RecordSource, Result, Schema,
            StringValue,
        };
        use rust_decimal::Decimal;
        use std::str::FromStr;

        #[test]
        fn test_duckdb_cells_read_through_records() {
            let backend = DuckDbBackend::open_in_memory().unwrap();
            backend
                .execute_batch(
                    "CREATE TABLE events (
                        at TIMESTAMP, day DATE, clock TIME, amount DECIMAL(10,2),
                        paid BOOLEAN, note VARCHAR
                    );
                    INSERT INTO events VALUES
                        ('2024-02-29 09:05:01', '2024-02-29', '23:59:58', 12.50, true, 'first'),
                        (NULL, NULL, NULL, NULL, NULL, NULL);",
                )
                .unwrap();

            let mut schema = Schema::new();
            schema.add("at", DateTimeValue::new("Y-m-d H:i:s")).unwrap();
            schema.add("day", DateTimeValue::new("Y-m-d")).unwrap();
            schema.add("clock", StringValue::new()).unwrap();
            schema.add("amount", DecimalValue::new()).unwrap();
            schema.add("paid", BooleanValue::new()).unwrap();
            schema.add("note", StringValue::new()).unwrap();
            let names: Vec<String> = ["at", "day", "clock", "amount", "paid", "note"]
                .iter()
                .map(|name| name.to_string())
                .collect();

            let mut source = SqlSource::new(
                backend,
                "SELECT at, day, clock, amount, paid, note FROM events ORDER BY note NULLS LAST",
            );
            source.configure(&schema, &names).unwrap();
            let records: Vec<Record> = source.records().collect::<Result<_>>().unwrap();
            assert_eq!(records.len(), 2);

            let first = &records[0];
            assert_eq!(first.raw("at").unwrap(), "2024-02-29 09:05:01");
            assert_eq!(first.raw("day").unwrap(), "2024-02-29");
            assert_eq!(first.string("clock").unwrap(), Some("23:59:58".to_string()));
            assert_eq!(
                first.decimal("amount").unwrap(),
                Some(Decimal::from_str("12.5").unwrap())
            );
            assert_eq!(first.boolean("paid").unwrap(), Some(true));
            assert_eq!(first.string("note").unwrap(), Some("first".to_string()));

            let second = &records[1];
            for name in &names {
                assert!(second.value(name).unwrap().is_null(), "{} should be null", name);
            }
        }

        #[test]
        fn test_query_errors_surface_at_open() {
            let backend = DuckDbBackend::open_in_memory().unwrap();
            let mut schema = Schema::new();
            schema.add("id", StringValue::new()).unwrap();
            let mut source = SqlSource::new(backend, "SELECT id FROM missing_table");
            source.configure(&schema, &["id".to_string()]).unwrap();
            let err = source.records().next().unwrap().unwrap_err();
            assert!(err.to_string().contains("Query failed on duckdb:memory"));
        }

        #[test]
        fn test_out_of_range_times_fall_back_to_the_integer() {
            assert_eq!(timestamp_raw(TimeUnit::Second, i64::MAX), i64::MAX.to_string());
            assert_eq!(timestamp_raw(TimeUnit::Millisecond, i64::MIN), i64::MIN.to_string());
            assert_eq!(timestamp_raw(TimeUnit::Microsecond, -1), "1969-12-31 23:59:59");
            assert_eq!(time_raw(TimeUnit::Microsecond, 3_600_000_000), "01:00:00");
            assert_eq!(time_raw(TimeUnit::Microsecond, -1), "-1");
            assert_eq!(time_raw(TimeUnit::Second, i64::MAX), i64::MAX.to_string());
        }
    }
}
