//! File, directory and SQL adapters implementing the Batchflow record
//! source and sink protocol.

pub mod delimited;
pub mod directory;
pub mod fixed;
pub mod medium;
pub mod sql;

pub use delimited::{CsvDialect, CsvSink, CsvSource};
pub use directory::{DirectorySource, DIRECTORY_FIELDS};
pub use fixed::{FixedColumn, FixedColumns, FixedSink, FixedSource, LayoutPattern, NO_DOT};
pub use medium::{
    FileInput, FileOutput, HandleStats, InputMedium, MemoryInput, MemoryOutput, OutputMedium,
};
#[cfg(feature = "sql-duckdb")]
pub use sql::DuckDbBackend;
pub use sql::{SqlBackend, SqlRow, SqlSource};
