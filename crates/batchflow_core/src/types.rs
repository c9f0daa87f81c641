//! Declared value types and field input policies.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed scalar kind of a [`TypedValue`](crate::TypedValue).
///
/// Assigned at construction and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclaredType {
    /// 64-bit signed integer
    Integer,
    /// Exact decimal number
    Decimal,
    /// Date and/or time value
    #[serde(alias = "date_time")]
    DateTime,
    /// Boolean value (true or false)
    Boolean,
    /// String of characters (text)
    String,
}

impl DeclaredType {
    pub fn all() -> [DeclaredType; 5] {
        [
            DeclaredType::Integer,
            DeclaredType::Decimal,
            DeclaredType::DateTime,
            DeclaredType::Boolean,
            DeclaredType::String,
        ]
    }

    /// Returns true for integer and decimal values.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DeclaredType::Integer | DeclaredType::Decimal)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeclaredType::Integer => "integer",
            DeclaredType::Decimal => "decimal",
            DeclaredType::DateTime => "datetime",
            DeclaredType::Boolean => "boolean",
            DeclaredType::String => "string",
        }
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a [`Field`](crate::Field) receives its value from an upstream value.
///
/// | policy | transfer |
/// |--------|----------|
/// | `Manual` | nothing, the value is populated by external logic |
/// | `Auto` | the field shares the upstream instance itself |
/// | `Cast` | null propagates, otherwise through the canonical raw string |
/// | `Raw` | the raw string is copied verbatim |
/// | `Value` | null propagates, otherwise through the typed accessor pair |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Manual,
    #[default]
    Auto,
    Cast,
    Raw,
    Value,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Manual => "manual",
            InputType::Auto => "auto",
            InputType::Cast => "cast",
            InputType::Raw => "raw",
            InputType::Value => "value",
        }
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
