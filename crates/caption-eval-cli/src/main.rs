//! caption-eval CLI - Image captioning model comparison tool

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;

/// Image captioning model evaluation tool.
#[derive(Parser)]
#[command(name = "caption-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where reference and prediction data live.
#[derive(Args, Clone)]
pub struct InputArgs {
    /// COCO captions file with reference captions
    #[arg(
        short,
        long,
        env = "CAPTION_EVAL_REFERENCE",
        default_value = "coco/captions_val2017.json"
    )]
    reference: PathBuf,

    /// Image id column name in prediction CSVs
    #[arg(long, default_value = "image_id")]
    image_col: String,

    /// Caption column name in prediction CSVs
    #[arg(long, default_value = "caption_text")]
    caption_col: String,

    /// Skip rows with an unparsable image id instead of failing the model
    #[arg(long)]
    skip_malformed: bool,

    /// Log full alignment details for these image ids
    #[arg(long = "trace-id", value_name = "IMAGE_ID")]
    trace_ids: Vec<i64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every prediction CSV against the references
    Evaluate {
        #[command(flatten)]
        input: InputArgs,

        /// Directory containing one prediction CSV per model
        #[arg(short, long, env = "CAPTION_EVAL_PREDICTIONS", default_value = "csv")]
        predictions: PathBuf,

        /// Directory the report is written to
        #[arg(short, long, env = "CAPTION_EVAL_OUTPUT", default_value = ".")]
        output: PathBuf,

        /// Also write a CSV summary
        #[arg(long)]
        csv: bool,

        /// External evaluator for SPICE/METEOR (receives gt and result file paths)
        #[arg(long, env = "CAPTION_EVAL_SCORER")]
        scorer_cmd: Option<PathBuf>,

        /// Extra argument for the external evaluator (repeatable)
        #[arg(long = "scorer-arg", allow_hyphen_values = true)]
        scorer_args: Vec<String>,

        /// Only use the external evaluator
        #[arg(long, requires = "scorer_cmd")]
        no_native: bool,
    },

    /// Show how one prediction CSV aligns with the references
    Align {
        #[command(flatten)]
        input: InputArgs,

        /// Prediction CSV file
        #[arg(short = 'i', long = "input")]
        file: PathBuf,
    },

    /// Render a previously written report
    Show {
        /// Report JSON file
        #[arg(short, long, default_value = "evaluation_results.json")]
        input: PathBuf,

        /// Omit the metric legend
        #[arg(long)]
        no_legend: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli) {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Evaluate {
            input,
            predictions,
            output,
            csv,
            scorer_cmd,
            scorer_args,
            no_native,
        } => commands::evaluate::run(commands::evaluate::EvaluateOptions {
            input,
            predictions,
            output,
            csv,
            scorer_cmd,
            scorer_args,
            no_native,
        }),
        Commands::Align { input, file } => commands::align::run(&input, &file),
        Commands::Show { input, no_legend } => commands::show::run(&input, no_legend),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
