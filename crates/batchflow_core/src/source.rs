//! The record source protocol and its lazy, self-closing iterator.
//!
//! A source moves through `configure -> open -> read* -> close`. Callers
//! normally only touch [`Records`], which opens on the first pull and closes
//! exactly once however iteration ends: exhaustion, an error, or the
//! iterator being dropped early.

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::record::Record;
use crate::schema::Schema;
use crate::value::SharedValue;

/// The schema values a configured source writes into, keyed by field name.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: IndexMap<String, SharedValue>,
}

impl Bindings {
    /// Look up every name in `schema`; a missing name is a configuration error.
    pub fn resolve<S: AsRef<str>>(schema: &Schema, field_names: &[S]) -> Result<Self> {
        let mut values = IndexMap::with_capacity(field_names.len());
        for name in field_names {
            let name = name.as_ref();
            values.insert(name.to_string(), schema.value(name)?.clone());
        }
        Ok(Self { values })
    }

    pub fn get(&self, name: &str) -> Option<&SharedValue> {
        self.values.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SharedValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn reset(&self) {
        for value in self.values.values() {
            value.reset();
        }
    }

    /// Clone every bound value into a new record.
    pub fn snapshot(&self) -> Record {
        self.values
            .iter()
            .map(|(name, value)| (name.clone(), value.snapshot()))
            .collect()
    }
}

/// A row-oriented producer writing into schema values.
pub trait RecordSource {
    /// Bind the fields this source populates. Unknown names fail here, before
    /// any I/O.
    fn configure(&mut self, schema: &Schema, field_names: &[String]) -> Result<()>;

    /// Acquire the underlying resource.
    fn open(&mut self) -> Result<()>;

    /// Advance one row. `false` means exhausted, and nothing was written.
    fn read(&mut self) -> Result<bool>;

    /// Release the underlying resource. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;

    fn bindings(&self) -> &Bindings;

    fn records(&mut self) -> Records<'_, Self>
    where
        Self: Sized,
    {
        Records::new(self)
    }
}

impl<S: RecordSource + ?Sized> RecordSource for Box<S> {
    fn configure(&mut self, schema: &Schema, field_names: &[String]) -> Result<()> {
        (**self).configure(schema, field_names)
    }

    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn read(&mut self) -> Result<bool> {
        (**self).read()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn bindings(&self) -> &Bindings {
        (**self).bindings()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Pending,
    Open,
    Closed,
}

/// Forward-only, single-pass iterator over a source's rows.
///
/// Each item is an independent [`Record`]. After an error is yielded the
/// iterator is closed and returns `None`.
pub struct Records<'a, S: RecordSource + ?Sized> {
    source: &'a mut S,
    state: State,
    rows: u64,
}

impl<'a, S: RecordSource + ?Sized> Records<'a, S> {
    pub fn new(source: &'a mut S) -> Self {
        Self {
            source,
            state: State::Pending,
            rows: 0,
        }
    }

    /// Rows yielded so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    fn finish(&mut self) -> Result<()> {
        if self.state == State::Closed {
            return Ok(());
        }
        self.state = State::Closed;
        debug!(rows = self.rows, "closing record source");
        self.source.close()
    }

    fn fail(&mut self, err: Error) -> Option<Result<Record>> {
        if let Err(close_err) = self.finish() {
            warn!(error = %close_err, "failed to close record source after error");
        }
        Some(Err(err))
    }
}

impl<S: RecordSource + ?Sized> Iterator for Records<'_, S> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            State::Closed => return None,
            State::Pending => {
                self.state = State::Open;
                if let Err(err) = self.source.open() {
                    return self.fail(err);
                }
                debug!(fields = self.source.bindings().len(), "record source opened");
            }
            State::Open => {}
        }

        match self.source.read() {
            Ok(true) => {
                self.rows += 1;
                Some(Ok(self.source.bindings().snapshot()))
            }
            Ok(false) => self.finish().err().map(Err),
            Err(err) => self.fail(err),
        }
    }
}

impl<S: RecordSource + ?Sized> Drop for Records<'_, S> {
    fn drop(&mut self) {
        if self.state == State::Open {
            if let Err(err) = self.finish() {
                warn!(error = %err, rows = self.rows, "failed to close record source");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{IntegerValue, StringValue};

    /// Feeds fixed rows and counts lifecycle calls.
    #[derive(Default)]
    struct ScriptedSource {
        rows: Vec<Vec<&'static str>>,
        fail_at: Option<usize>,
        fail_open: bool,
        cursor: usize,
        opened: usize,
        closed: usize,
        is_open: bool,
        bindings: Bindings,
    }

    impl RecordSource for ScriptedSource {
        fn configure(&mut self, schema: &Schema, field_names: &[String]) -> Result<()> {
            self.bindings = Bindings::resolve(schema, field_names)?;
            Ok(())
        }

        fn open(&mut self) -> Result<()> {
            if self.fail_open {
                return Err(Error::resource("cannot open", anyhow::anyhow!("denied")));
            }
            self.opened += 1;
            self.is_open = true;
            self.cursor = 0;
            Ok(())
        }

        fn read(&mut self) -> Result<bool> {
            if self.fail_at == Some(self.cursor) {
                return Err(Error::misformatted("x", "test", crate::DeclaredType::Integer));
            }
            let Some(row) = self.rows.get(self.cursor) else {
                return Ok(false);
            };
            for ((_, value), raw) in self.bindings.iter().zip(row) {
                value.set_raw(Some(*raw))?;
            }
            self.cursor += 1;
            Ok(true)
        }

        fn close(&mut self) -> Result<()> {
            if self.is_open {
                self.is_open = false;
                self.closed += 1;
            }
            Ok(())
        }

        fn bindings(&self) -> &Bindings {
            &self.bindings
        }
    }

    fn configured(rows: Vec<Vec<&'static str>>) -> (Schema, ScriptedSource) {
        let mut schema = Schema::new();
        schema.add("id", IntegerValue::new()).unwrap();
        schema.add("name", StringValue::new()).unwrap();
        let mut source = ScriptedSource {
            rows,
            ..Default::default()
        };
        source
            .configure(&schema, &["id".to_string(), "name".to_string()])
            .unwrap();
        (schema, source)
    }

    fn three_rows() -> Vec<Vec<&'static str>> {
        vec![vec!["1", "a"], vec!["2", "b"], vec!["3", "c"]]
    }

    #[test]
    fn test_unknown_field_fails_at_configure() {
        let schema = Schema::new();
        let mut source = ScriptedSource::default();
        let err = source.configure(&schema, &["missing".to_string()]).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(source.opened, 0);
    }

    #[test]
    fn test_full_iteration_closes_once() {
        let (_schema, mut source) = configured(three_rows());
        let records: Vec<Record> = source.records().collect::<Result<_>>().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(source.opened, 1);
        assert_eq!(source.closed, 1);
    }

    #[test]
    fn test_early_abandonment_closes_once() {
        let (_schema, mut source) = configured(three_rows());
        {
            let mut records = source.records();
            assert!(records.next().is_some());
            assert_eq!(records.rows(), 1);
        }
        assert_eq!(source.closed, 1);
    }

    #[test]
    fn test_untouched_iterator_does_not_open() {
        let (_schema, mut source) = configured(three_rows());
        drop(source.records());
        assert_eq!(source.opened, 0);
        assert_eq!(source.closed, 0);
    }

    #[test]
    fn test_error_is_yielded_after_closing() {
        let (_schema, mut source) = configured(three_rows());
        source.fail_at = Some(1);
        let mut records = source.records();
        assert!(records.next().unwrap().is_ok());
        assert!(records.next().unwrap().is_err());
        assert!(records.next().is_none());
        drop(records);
        assert_eq!(source.closed, 1);
    }

    #[test]
    fn test_open_failure_propagates() {
        let (_schema, mut source) = configured(three_rows());
        source.fail_open = true;
        let results: Vec<_> = source.records().collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(Error::Resource { .. })));
        assert_eq!(source.closed, 0);
    }

    #[test]
    fn test_records_are_independent_of_later_reads() {
        let (schema, mut source) = configured(three_rows());
        let records: Vec<Record> = source.records().collect::<Result<_>>().unwrap();
        let ids: Vec<_> = records
            .iter()
            .map(|record| record.integer("id").unwrap())
            .collect();
        assert_eq!(ids, vec![Some(1), Some(2), Some(3)]);
        assert_eq!(schema.value("name").unwrap().raw(), "c");
    }

    #[test]
    fn test_each_pass_reopens() {
        let (_schema, mut source) = configured(three_rows());
        assert_eq!(source.records().count(), 3);
        assert_eq!(source.records().count(), 3);
        assert_eq!(source.opened, 2);
        assert_eq!(source.closed, 2);
    }
}
