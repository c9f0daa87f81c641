//! `batchflow run`: stream a job from source to sink.

use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use batchflow::Job;

#[derive(Debug)]
pub struct RunArgs {
    pub job: PathBuf,
}

pub fn run(args: RunArgs) -> Result<()> {
    let job = Job::load(&args.job)?;
    let rows = job.run()?;
    info!(job = %args.job.display(), rows, "job finished");
    println!(
        "Wrote {} record{} to {}",
        rows,
        if rows == 1 { "" } else { "s" },
        job.config().sink.path.display()
    );
    Ok(())
}
