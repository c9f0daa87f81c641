//! Command-line interface for Batchflow.

pub mod check;
pub mod output;
pub mod preview;
pub mod run;
