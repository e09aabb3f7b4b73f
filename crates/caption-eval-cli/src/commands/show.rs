//! Re-render a persisted report.

use std::path::Path;

use anyhow::{Context, Result};
use caption_eval::ReportFormatter;

pub fn run(input: &Path, no_legend: bool) -> Result<()> {
    let json = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let report = ReportFormatter::from_json(&json)
        .with_context(|| format!("Failed to parse {} as a report", input.display()))?;

    println!("Models: {}", report.len());
    println!();
    print!("{}", ReportFormatter::table(&report));
    if !no_legend {
        print!("{}", ReportFormatter::legend());
    }

    Ok(())
}
