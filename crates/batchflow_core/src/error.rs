//! Error taxonomy shared by values, fields, sources and sinks.
//!
//! Every failure is raised at first detection and propagated unchanged.
//! Record iteration releases its resource before the error reaches the caller
//! but never swallows it.

use thiserror::Error;

use crate::types::{DeclaredType, InputType};

/// Core result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the batchflow core and the adapters built on it.
#[derive(Debug, Error)]
pub enum Error {
    /// Schema or structure mismatch, detected when a source or sink is configured.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A raw string failed the type-specific validation.
    #[error("Cannot validate '{raw}' with {validator} in {type_name}.")]
    MisFormatted {
        raw: String,
        validator: String,
        type_name: DeclaredType,
    },

    /// A typed accessor was called on a value of another declared type.
    #[error(
        "Type mismatch: the value type is \"{current}\", but the method called ({method}) expects \"{expected}\""
    )]
    TypeMismatch {
        current: DeclaredType,
        method: &'static str,
        expected: DeclaredType,
    },

    /// A strict typed getter was called on a null value.
    #[error("Value is null ({type_name})")]
    ValueIsNull { type_name: DeclaredType },

    /// The underlying medium could not be opened, read or written.
    #[error("{message}")]
    Resource {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// No transfer policy covers this field/input combination.
    #[error("Unsupported input type '{input_type}' for field '{field}'")]
    UnsupportedInputType { input_type: InputType, field: String },
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    pub fn resource(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Error::Resource {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn misformatted(
        raw: impl Into<String>,
        validator: impl Into<String>,
        type_name: DeclaredType,
    ) -> Self {
        Error::MisFormatted {
            raw: raw.into(),
            validator: validator.into(),
            type_name,
        }
    }

    pub(crate) fn type_mismatch(
        current: DeclaredType,
        method: &'static str,
        expected: DeclaredType,
    ) -> Self {
        Error::TypeMismatch {
            current,
            method,
            expected,
        }
    }

    /// True for failures caused by the data rather than by the caller or the medium.
    pub fn is_data_error(&self) -> bool {
        matches!(self, Error::MisFormatted { .. } | Error::ValueIsNull { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Resource {
            message: format!("I/O error: {}", err),
            source: err.into(),
        }
    }
}
