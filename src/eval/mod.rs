//! Alignment, evaluation session and report generation.
//!
//! - [`align`]: Intersection of references and predictions
//! - [`session::EvalSession`]: Runs the pipeline over every model
//! - [`session::EvalConfig`]: Configuration for a run
//! - [`report`]: Per-model results and the sorted report

pub mod align;
pub mod report;
pub mod session;

pub use align::{AlignedBatch, AlignedImage, align};
pub use report::{EvaluationResult, Report, ResultAggregator};
pub use session::{EvalConfig, EvalSession, ModelFailure, RunOutcome};
