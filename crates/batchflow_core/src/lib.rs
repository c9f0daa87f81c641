//! Batchflow core: typed values, schemas and the record source/sink protocol.
//!
//! Rows move from a [`RecordSource`] into the shared values of a [`Schema`],
//! are copied out as independent [`Record`]s by [`Records`], and are rendered
//! back to raw strings by a [`RecordSink`]. [`Field`] policies govern moving
//! a value between two schemas.

pub mod date_pattern;
pub mod definition;
pub mod error;
pub mod field;
pub mod mapped;
pub mod pattern;
pub mod record;
pub mod schema;
pub mod sink;
pub mod source;
pub mod types;
pub mod value;

pub use date_pattern::{DatePattern, DEFAULT_DATE_PATTERN};
pub use definition::{FieldDef, SchemaDef};
pub use error::{Error, Result};
pub use field::Field;
pub use mapped::MappedSource;
pub use pattern::{FormatArg, RenderPattern};
pub use record::Record;
pub use schema::Schema;
pub use sink::{field_raw, RecordSink};
pub use source::{Bindings, RecordSource, Records};
pub use types::{DeclaredType, InputType};
pub use value::{
    BooleanValue, DateTimeValue, DecimalNotation, DecimalValue, IntegerValue, ScalarValue,
    SharedValue, StringValue, TypedValue,
};
