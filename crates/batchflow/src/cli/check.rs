//! `batchflow check`: validate a job without reading or writing data.

use std::path::PathBuf;

use anyhow::Result;

use batchflow::Job;

use crate::cli::output::print_table;

#[derive(Debug)]
pub struct CheckArgs {
    pub job: PathBuf,
    pub json: bool,
}

pub fn run(args: CheckArgs) -> Result<()> {
    let job = Job::load(&args.job)?;
    let summary = job.check()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!(
        "{}: {} -> {}{}",
        args.job.display(),
        summary.source.as_str(),
        summary.sink.as_str(),
        if summary.mapped { " (mapped)" } else { "" }
    );
    let rows = summary
        .fields
        .iter()
        .map(|field| {
            vec![
                field.name.clone(),
                field.declared.to_string(),
                field.input.clone(),
                field.input_type.to_string(),
            ]
        })
        .collect();
    print_table(&["field", "type", "input", "input type"], rows);
    println!("OK");
    Ok(())
}
