//! Evaluation session driving the whole pipeline.
//!
//! [`EvalSession`] loads the reference corpus once, then evaluates every
//! prediction source in file name order: load, align, score, record. A
//! failure while evaluating one model is logged and recorded in the
//! [`RunOutcome`]; only a missing reference file or an empty predictions
//! directory stops the run.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::ImageId;
use crate::corpus::{PredictionSource, ReferenceSet, discover_prediction_sources};
use crate::error::{Error, Result};
use crate::eval::align::align;
use crate::eval::report::{EvaluationResult, Report, ResultAggregator};
use crate::format::ReportFormatter;
use crate::import::{PredictionLoader, PredictionSchema, RowPolicy};
use crate::metrics::Scorer;

/// File name of the persisted JSON report.
pub const REPORT_FILE_NAME: &str = "evaluation_results.json";

/// File name of the optional CSV summary.
pub const CSV_SUMMARY_FILE_NAME: &str = "evaluation_results.csv";

/// Configuration for an evaluation run.
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// COCO captions file with the reference captions.
    pub reference: PathBuf,

    /// Directory containing one prediction CSV per model.
    pub predictions_dir: PathBuf,

    /// Directory the report is written to.
    pub output_dir: PathBuf,

    /// Image ids whose alignment is logged in full.
    pub trace_ids: BTreeSet<ImageId>,

    /// Handling of rows with an unparsable image id.
    pub row_policy: RowPolicy,

    /// Column names of the prediction files.
    pub prediction_schema: PredictionSchema,

    /// Also write a CSV summary next to the JSON report.
    pub write_csv: bool,
}

impl EvalConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> EvalConfigBuilder {
        EvalConfigBuilder::default()
    }

    /// Path of the JSON report.
    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(REPORT_FILE_NAME)
    }
}

/// Builder for [`EvalConfig`].
#[derive(Debug, Default)]
pub struct EvalConfigBuilder {
    reference: Option<PathBuf>,
    predictions_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    trace_ids: BTreeSet<ImageId>,
    row_policy: RowPolicy,
    prediction_schema: Option<PredictionSchema>,
    write_csv: bool,
}

impl EvalConfigBuilder {
    /// Set the reference captions file.
    #[must_use]
    pub fn reference(mut self, path: impl Into<PathBuf>) -> Self {
        self.reference = Some(path.into());
        self
    }

    /// Set the predictions directory.
    #[must_use]
    pub fn predictions_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.predictions_dir = Some(path.into());
        self
    }

    /// Set the report output directory.
    #[must_use]
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Add an image id to trace.
    #[must_use]
    pub fn trace_id(mut self, id: ImageId) -> Self {
        self.trace_ids.insert(id);
        self
    }

    /// Add several image ids to trace.
    #[must_use]
    pub fn trace_ids(mut self, ids: impl IntoIterator<Item = ImageId>) -> Self {
        self.trace_ids.extend(ids);
        self
    }

    /// Set the malformed row policy.
    #[must_use]
    pub fn row_policy(mut self, policy: RowPolicy) -> Self {
        self.row_policy = policy;
        self
    }

    /// Set the prediction column names.
    #[must_use]
    pub fn prediction_schema(mut self, schema: PredictionSchema) -> Self {
        self.prediction_schema = Some(schema);
        self
    }

    /// Also write a CSV summary.
    #[must_use]
    pub fn write_csv(mut self, enabled: bool) -> Self {
        self.write_csv = enabled;
        self
    }

    /// Build the configuration.
    ///
    /// Unset paths default to `coco/captions_val2017.json`, `csv` and `.`.
    #[must_use]
    pub fn build(self) -> EvalConfig {
        EvalConfig {
            reference: self
                .reference
                .unwrap_or_else(|| PathBuf::from("coco/captions_val2017.json")),
            predictions_dir: self.predictions_dir.unwrap_or_else(|| PathBuf::from("csv")),
            output_dir: self.output_dir.unwrap_or_else(|| PathBuf::from(".")),
            trace_ids: self.trace_ids,
            row_policy: self.row_policy,
            prediction_schema: self.prediction_schema.unwrap_or_default(),
            write_csv: self.write_csv,
        }
    }
}

/// A model whose evaluation failed.
#[derive(Debug)]
pub struct ModelFailure {
    /// Model name.
    pub model_name: String,
    /// What went wrong.
    pub error: Error,
}

/// Everything a run produced.
#[derive(Debug, Default)]
pub struct RunOutcome {
    /// Results of the models that were scored.
    pub report: Report,
    /// Models skipped because they share no image with the references.
    pub skipped: Vec<String>,
    /// Models whose loading or scoring failed.
    pub failures: Vec<ModelFailure>,
}

/// Evaluation session for captioning model comparison.
///
/// # Example
///
/// ```rust,ignore
/// use caption_eval::{CompositeScorer, EvalConfig, EvalSession};
///
/// let config = EvalConfig::builder()
///     .reference("coco/captions_val2017.json")
///     .predictions_dir("csv")
///     .trace_id(285)
///     .build();
///
/// let session = EvalSession::new(config, CompositeScorer::native());
/// let outcome = session.run()?;
/// session.write_report(&outcome.report)?;
/// ```
pub struct EvalSession<S> {
    config: EvalConfig,
    scorer: S,
    loader: PredictionLoader,
}

impl<S: Scorer> EvalSession<S> {
    /// Create a new evaluation session.
    pub fn new(config: EvalConfig, scorer: S) -> Self {
        let loader = PredictionLoader::new(config.prediction_schema.clone())
            .row_policy(config.row_policy);
        Self {
            config,
            scorer,
            loader,
        }
    }

    /// The session configuration.
    #[must_use]
    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Load references, then evaluate every prediction source in order.
    ///
    /// Fails before evaluating anything if the reference file or the
    /// predictions directory is missing, or if no prediction file exists.
    pub fn run(&self) -> Result<RunOutcome> {
        let references = ReferenceSet::load(&self.config.reference)?;
        let sources = discover_prediction_sources(&self.config.predictions_dir)?;

        info!(count = sources.len(), "found prediction files to evaluate");
        for source in &sources {
            debug!(file = %source.path.display(), "prediction source");
        }

        let mut aggregator = ResultAggregator::new();
        let mut outcome = RunOutcome::default();

        for source in &sources {
            match self.evaluate_source(&references, source) {
                Ok(result) => {
                    aggregator.record(result);
                }
                Err(Error::NoOverlap { model }) => {
                    warn!(model = %model, "no common images between ground truth and predictions; skipping");
                    outcome.skipped.push(model);
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    error!(model = %source.model_name, error = %err, "evaluation failed");
                    outcome.failures.push(ModelFailure {
                        model_name: source.model_name.clone(),
                        error: err,
                    });
                }
            }
        }

        outcome.report = aggregator.finalize();
        Ok(outcome)
    }

    /// Evaluate one prediction file against the references.
    pub fn evaluate_model(
        &self,
        references: &ReferenceSet,
        path: impl AsRef<Path>,
    ) -> Result<EvaluationResult> {
        self.evaluate_source(references, &PredictionSource::from_path(path.as_ref()))
    }

    fn evaluate_source(
        &self,
        references: &ReferenceSet,
        source: &PredictionSource,
    ) -> Result<EvaluationResult> {
        info!(model = %source.model_name, "evaluating");

        let predictions = self.loader.load(&source.path)?;
        let batch = align(references, &predictions, &self.config.trace_ids)?;

        info!(
            model = %batch.model_name,
            images = batch.len(),
            dropped_candidates = batch.dropped_total(),
            "found images with both ground truth and predictions"
        );

        let metrics = self.scorer.score(&batch)?;
        for (metric, score) in &metrics {
            info!(model = %batch.model_name, metric = %metric, score = %format!("{score:.4}"), "score");
        }

        Ok(EvaluationResult {
            model_name: batch.model_name.clone(),
            num_images: batch.len(),
            num_captions: batch.hypothesis_count(),
            metrics,
        })
    }

    /// Write the JSON report (and the CSV summary if enabled).
    ///
    /// Returns the path of the JSON report.
    pub fn write_report(&self, report: &Report) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let json_path = self.config.report_path();
        std::fs::write(&json_path, ReportFormatter::to_json(report)?)?;

        if self.config.write_csv {
            let csv_path = self.config.output_dir.join(CSV_SUMMARY_FILE_NAME);
            ReportFormatter::write_csv_summary(report, &csv_path)?;
        }

        info!(path = %json_path.display(), "results saved");
        Ok(json_path)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::metrics::MetricScores;
    use crate::metrics::test_support::{FailingScorer, FixedScorer};

    const REFERENCES: &str = r#"{
        "images": [{"id": 1}, {"id": 2}],
        "annotations": [
            {"id": 1, "image_id": 1, "caption": "a dog runs"},
            {"id": 2, "image_id": 1, "caption": "a brown dog running"},
            {"id": 3, "image_id": 2, "caption": "a cat sleeps"}
        ]
    }"#;

    struct Fixture {
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            fs::create_dir(dir.path().join("csv")).unwrap();
            fs::write(dir.path().join("refs.json"), REFERENCES).unwrap();
            Self { dir }
        }

        fn predictions(&self, model: &str, body: &str) -> &Self {
            fs::write(self.dir.path().join("csv").join(format!("{model}.csv")), body).unwrap();
            self
        }

        fn config(&self) -> EvalConfig {
            EvalConfig::builder()
                .reference(self.dir.path().join("refs.json"))
                .predictions_dir(self.dir.path().join("csv"))
                .output_dir(self.dir.path().join("out"))
                .build()
        }
    }

    fn fixed(pairs: &[(&str, f64)]) -> FixedScorer {
        FixedScorer(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), *v))
                .collect::<MetricScores>(),
        )
    }

    /// Echoes the batch contents back as scores.
    struct EchoScorer;

    impl Scorer for EchoScorer {
        fn name(&self) -> &str {
            "echo"
        }

        fn score(&self, batch: &crate::eval::align::AlignedBatch) -> Result<MetricScores> {
            let img = &batch.images[0];
            Ok(MetricScores::from([
                ("refs".to_string(), img.references.len() as f64),
                ("hyp_len".to_string(), img.hypothesis.len() as f64),
            ]))
        }
    }

    #[test]
    fn test_single_model_result() {
        let fx = Fixture::new();
        fx.predictions("m1", "image_id,caption_text\n1,a dog\n");

        let session = EvalSession::new(fx.config(), EchoScorer);
        let outcome = session.run().unwrap();
        let result = outcome.report.get("m1").unwrap();

        assert_eq!(result.num_images, 1);
        assert_eq!(result.num_captions, 1);
        assert_eq!(result.metrics["refs"], 2.0);
        assert_eq!(result.metrics["hyp_len"], "a dog".len() as f64);
    }

    #[test]
    fn test_no_overlap_skipped() {
        let fx = Fixture::new();
        fx.predictions("m1", "image_id,caption_text\n1,a dog\n")
            .predictions("m2", "image_id,caption_text\n99,a cat\n");

        let session = EvalSession::new(fx.config(), fixed(&[("CIDEr", 1.0)]));
        let outcome = session.run().unwrap();

        assert_eq!(outcome.report.model_names().collect::<Vec<_>>(), vec!["m1"]);
        assert_eq!(outcome.skipped, vec!["m2"]);
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn test_missing_reference_aborts_before_side_effects() {
        let fx = Fixture::new();
        fx.predictions("m1", "image_id,caption_text\n1,a dog\n");
        fs::remove_file(fx.dir.path().join("refs.json")).unwrap();

        let session = EvalSession::new(fx.config(), fixed(&[]));
        let err = session.run().unwrap_err();
        assert!(err.is_fatal());
        assert!(!fx.dir.path().join("out").exists());
    }

    #[test]
    fn test_truncated_reference_aborts_before_side_effects() {
        let fx = Fixture::new();
        fx.predictions("m1", "image_id,caption_text\n1,a dog\n");
        fs::write(fx.dir.path().join("refs.json"), "{\"annotations\": [").unwrap();

        let session = EvalSession::new(fx.config(), fixed(&[]));
        let err = session.run().unwrap_err();
        assert!(matches!(err, Error::Reference { .. }));
        assert!(err.is_fatal());
        assert!(!fx.dir.path().join("out").exists());
    }

    #[test]
    fn test_empty_predictions_dir_aborts() {
        let fx = Fixture::new();
        let session = EvalSession::new(fx.config(), fixed(&[]));
        assert!(matches!(
            session.run(),
            Err(Error::NoPredictionSources { .. })
        ));
    }

    #[test]
    fn test_per_model_failures_isolated() {
        let fx = Fixture::new();
        fx.predictions("a_bad_schema", "id,caption\n1,a dog\n")
            .predictions("b_bad_id", "image_id,caption_text\none,a dog\n")
            .predictions("c_good", "image_id,caption_text\n2,a cat\n");

        let session = EvalSession::new(fx.config(), fixed(&[("CIDEr", 0.5)]));
        let outcome = session.run().unwrap();

        assert_eq!(outcome.report.model_names().collect::<Vec<_>>(), vec!["c_good"]);
        let failed: Vec<_> = outcome.failures.iter().map(|f| f.model_name.as_str()).collect();
        assert_eq!(failed, vec!["a_bad_schema", "b_bad_id"]);
        assert!(matches!(outcome.failures[0].error, Error::Schema { .. }));
        assert!(matches!(outcome.failures[1].error, Error::Parse { .. }));
    }

    #[test]
    fn test_scorer_failure_isolated() {
        let fx = Fixture::new();
        fx.predictions("m1", "image_id,caption_text\n1,a dog\n");

        let session = EvalSession::new(fx.config(), FailingScorer);
        let outcome = session.run().unwrap();
        assert!(outcome.report.is_empty());
        assert_eq!(outcome.failures.len(), 1);

        // the run still completes and writes a (empty) report
        let path = session.write_report(&outcome.report).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap().trim(), "{}");
    }

    #[test]
    fn test_write_report_with_csv() {
        let fx = Fixture::new();
        fx.predictions("beta", "image_id,caption_text\n2,a cat\n")
            .predictions("alpha", "image_id,caption_text\n1,a dog\n1,a puppy\n");

        let config = EvalConfig {
            write_csv: true,
            ..fx.config()
        };
        let session = EvalSession::new(config, fixed(&[("Bleu_4", 0.25)]));
        let outcome = session.run().unwrap();
        let json_path = session.write_report(&outcome.report).unwrap();

        assert_eq!(json_path, fx.dir.path().join("out").join(REPORT_FILE_NAME));
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(value["alpha"]["num_captions"], 1);
        assert_eq!(value["beta"]["metrics"]["Bleu_4"], 0.25);
        assert!(fx.dir.path().join("out").join(CSV_SUMMARY_FILE_NAME).exists());
    }

    #[test]
    fn test_evaluate_model_directly() {
        let fx = Fixture::new();
        fx.predictions("m1", "image_id,caption_text\n1,a dog\n");
        let session = EvalSession::new(fx.config(), fixed(&[("CIDEr", 2.0)]));
        let refs = ReferenceSet::load(fx.dir.path().join("refs.json")).unwrap();

        let result = session
            .evaluate_model(&refs, fx.dir.path().join("csv/m1.csv"))
            .unwrap();
        assert_eq!(result.model_name, "m1");
        assert_eq!(result.metrics["CIDEr"], 2.0);
    }

    #[test]
    fn test_config_defaults() {
        let config = EvalConfig::builder().trace_id(285).build();
        assert_eq!(config.reference, PathBuf::from("coco/captions_val2017.json"));
        assert_eq!(config.predictions_dir, PathBuf::from("csv"));
        assert_eq!(config.report_path(), PathBuf::from("./evaluation_results.json"));
        assert!(config.trace_ids.contains(&285));
        assert_eq!(config.row_policy, RowPolicy::Strict);
        assert!(!config.write_csv);
    }
}
