//! Full evaluation run.

use std::path::PathBuf;

use anyhow::{Context, Result};
use caption_eval::{CommandScorer, CompositeScorer, EvalConfig, EvalSession, ReportFormatter};
use tracing::{info, warn};

use crate::InputArgs;

pub struct EvaluateOptions {
    pub input: InputArgs,
    pub predictions: PathBuf,
    pub output: PathBuf,
    pub csv: bool,
    pub scorer_cmd: Option<PathBuf>,
    pub scorer_args: Vec<String>,
    pub no_native: bool,
}

pub fn run(opts: EvaluateOptions) -> Result<()> {
    let config = EvalConfig::builder()
        .reference(&opts.input.reference)
        .predictions_dir(&opts.predictions)
        .output_dir(&opts.output)
        .trace_ids(opts.input.trace_set())
        .row_policy(opts.input.row_policy())
        .prediction_schema(opts.input.schema())
        .write_csv(opts.csv)
        .build();

    let mut scorer = if opts.no_native {
        CompositeScorer::new()
    } else {
        CompositeScorer::native()
    };
    if let Some(program) = &opts.scorer_cmd {
        info!(program = %program.display(), "using external evaluator");
        scorer.push(Box::new(
            CommandScorer::new(program)
                .args(opts.scorer_args.iter().cloned())
                .trace_ids(opts.input.trace_set()),
        ));
    } else {
        warn!("no external evaluator configured; SPICE and METEOR will show as 0.0000");
    }

    let session = EvalSession::new(config, scorer);
    let outcome = session.run().context("Evaluation aborted")?;

    let report_path = session
        .write_report(&outcome.report)
        .with_context(|| format!("Failed to write report to {}", opts.output.display()))?;

    let rendered = ReportFormatter::render(&outcome.report)?;

    println!();
    println!("{:=<88}", "");
    println!("SUMMARY OF RESULTS");
    println!("{:=<88}", "");
    println!("Results saved to: {}", report_path.display());
    println!();
    print!("{}", rendered.table);

    if !outcome.skipped.is_empty() {
        println!("Skipped (no common images): {}", outcome.skipped.join(", "));
    }
    for failure in &outcome.failures {
        println!("Failed: {}: {}", failure.model_name, failure.error);
    }

    Ok(())
}
