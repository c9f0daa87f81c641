//! Batchflow job runner: TOML job files wired to the core record pipeline.

pub mod error;
pub mod job;

pub use error::HelpfulError;
pub use job::{Job, JobSummary, Preview};
