//! The long-lived, row-mutated template of typed values.

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::record::Record;
use crate::value::{SharedValue, TypedValue};

/// Ordered map of field name to a shared value.
///
/// Sources overwrite the same instances on every row. Take a [`Record`]
/// with [`Schema::snapshot`] to keep a row.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    values: IndexMap<String, SharedValue>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new field; names are unique.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<TypedValue>) -> Result<SharedValue> {
        self.add_shared(name, SharedValue::new(value))
    }

    /// Add an existing handle, so the schema shares the instance.
    pub fn add_shared(&mut self, name: impl Into<String>, value: SharedValue) -> Result<SharedValue> {
        let name = name.into();
        if self.values.contains_key(&name) {
            return Err(Error::configuration(format!(
                "Field '{}' is already defined",
                name
            )));
        }
        self.values.insert(name, value.clone());
        Ok(value)
    }

    pub fn get(&self, name: &str) -> Option<&SharedValue> {
        self.values.get(name)
    }

    /// Like [`Schema::get`], but a missing key is a configuration error.
    pub fn value(&self, name: &str) -> Result<&SharedValue> {
        self.values
            .get(name)
            .ok_or_else(|| Error::configuration(format!("Schema has no field '{}'", name)))
    }

    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<SharedValue> {
        self.values.shift_remove(name)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Null every contained value.
    pub fn reset(&self) {
        for value in self.values.values() {
            value.reset();
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
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

    /// Copy the named values, in the order given, into a new record.
    pub fn snapshot<S: AsRef<str>>(&self, keys: &[S]) -> Result<Record> {
        keys.iter()
            .map(|key| -> Result<(String, TypedValue)> {
                let key = key.as_ref();
                Ok((key.to_string(), self.value(key)?.snapshot()))
            })
            .collect()
    }

    /// Copy every value into a new record.
    pub fn snapshot_all(&self) -> Record {
        self.values
            .iter()
            .map(|(name, value)| (name.clone(), value.snapshot()))
            .collect()
    }
}
