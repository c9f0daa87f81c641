//! `batchflow preview`: show the first records a job would write.
//!
//! Stops pulling after `limit` records; the source is released as soon as
//! the preview is taken.

use std::path::PathBuf;

use anyhow::Result;

use batchflow::Job;

use crate::cli::output::{display_raw, print_table};

pub const DEFAULT_LIMIT: usize = 10;

#[derive(Debug)]
pub struct PreviewArgs {
    pub job: PathBuf,
    pub limit: usize,
    pub json: bool,
}

pub fn run(args: PreviewArgs) -> Result<()> {
    let job = Job::load(&args.job)?;
    let preview = job.preview(args.limit)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&preview)?);
        return Ok(());
    }

    let headers: Vec<&str> = preview.columns.iter().map(String::as_str).collect();
    let count = preview.rows.len();
    let rows = preview
        .rows
        .into_iter()
        .map(|row| row.iter().map(|raw| display_raw(raw)).collect())
        .collect();
    print_table(&headers, rows);
    println!("{} record{} shown", count, if count == 1 { "" } else { "s" });
    Ok(())
}
