//! # caption-eval
//!
//! Batch evaluation of image captioning models.
//!
//! Model predictions (one CSV per model) are aligned with a COCO reference
//! corpus, scored by a pluggable [`Scorer`], and collected into a report
//! sorted by model name.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use caption_eval::{CompositeScorer, EvalConfig, EvalSession, ReportFormatter};
//!
//! let config = EvalConfig::builder()
//!     .reference("coco/captions_val2017.json")
//!     .predictions_dir("csv")
//!     .output_dir(".")
//!     .build();
//!
//! let session = EvalSession::new(config, CompositeScorer::native());
//! let outcome = session.run()?;
//! session.write_report(&outcome.report)?;
//! print!("{}", ReportFormatter::render(&outcome.report)?.table);
//! ```
//!
//! ## Modules
//!
//! - [`error`]: Error types for the library
//! - [`coco`]: COCO caption JSON interchange types
//! - [`corpus`]: Reference corpus and prediction source discovery
//! - [`import`]: CSV import of model predictions
//! - [`eval`]: Alignment, evaluation session and reports
//! - [`metrics`]: Scorer contract and caption metrics
//! - [`format`]: Report rendering

pub mod coco;
pub mod corpus;
pub mod error;
pub mod eval;
pub mod format;
pub mod import;
pub mod metrics;

/// Image identifier shared by references and predictions.
pub type ImageId = i64;

// Re-export commonly used types
pub use corpus::{PredictionSource, ReferenceSet, discover_prediction_sources};
pub use error::{Error, Result};
pub use eval::{
    align::{AlignedBatch, AlignedImage, align},
    report::{EvaluationResult, Report, ResultAggregator},
    session::{EvalConfig, EvalSession, ModelFailure, RunOutcome},
};
pub use format::{RenderedReport, ReportFormatter};
pub use import::{PredictionLoader, PredictionSchema, PredictionSet, RowPolicy};
pub use metrics::{
    BleuScorer, CiderScorer, CommandScorer, CompositeScorer, MetricScores, RougeScorer, Scorer,
    SummaryMetric,
};
