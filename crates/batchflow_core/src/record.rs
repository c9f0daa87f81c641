//! Independently owned per-row snapshots.

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::value::TypedValue;

/// An ordered, owned copy of a row's values.
///
/// Records never share state with the [`Schema`](crate::Schema) they were
/// taken from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: IndexMap<String, TypedValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `name`, keeping the original position on replace.
    pub fn add(&mut self, name: impl Into<String>, value: TypedValue) -> &mut Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.values.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut TypedValue> {
        self.values.get_mut(name)
    }

    /// Like [`Record::get`], but a missing key is a configuration error.
    pub fn value(&self, name: &str) -> Result<&TypedValue> {
        self.values
            .get(name)
            .ok_or_else(|| Error::configuration(format!("Record has no field '{}'", name)))
    }

    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<TypedValue> {
        self.values.shift_remove(name)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypedValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Canonical raw string of `name`.
    pub fn raw(&self, name: &str) -> Result<String> {
        Ok(self.value(name)?.raw())
    }

    pub fn integer(&self, name: &str) -> Result<Option<i64>> {
        self.value(name)?.get_as_integer_or_null()
    }

    pub fn decimal(&self, name: &str) -> Result<Option<Decimal>> {
        self.value(name)?.get_as_decimal_or_null()
    }

    pub fn boolean(&self, name: &str) -> Result<Option<bool>> {
        self.value(name)?.get_as_boolean_or_null()
    }

    pub fn string(&self, name: &str) -> Result<Option<String>> {
        self.value(name)?.get_as_string_or_null()
    }

    pub fn datetime(&self, name: &str) -> Result<Option<NaiveDateTime>> {
        self.value(name)?.get_as_datetime_or_null()
    }
}

impl IntoIterator for Record {
    type Item = (String, TypedValue);
    type IntoIter = indexmap::map::IntoIter<String, TypedValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl FromIterator<(String, TypedValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, TypedValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
