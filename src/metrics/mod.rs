//! Caption quality metrics.
//!
//! A [`Scorer`] turns an [`AlignedBatch`] into a flat map of metric name to
//! score for the whole batch. Native scorers follow the COCO caption
//! evaluation conventions and metric names:
//!
//! - **BLEU** (`Bleu_1`..`Bleu_4`): n-gram precision with brevity penalty
//! - **ROUGE-L** (`ROUGE_L`): longest-common-subsequence F-measure
//! - **CIDEr** (`CIDEr`): tf-idf weighted n-gram consensus (CIDEr-D)
//!
//! SPICE and METEOR have no native implementation; use a
//! [`CommandScorer`] that wraps an external evaluator.
//!
//! ## Summary metrics
//!
//! | Metric | Key | Family |
//! |--------|-----|--------|
//! | BLEU | `Bleu_4` | n-gram |
//! | CIDEr | `CIDEr` | consensus |
//! | SPICE | `SPICE` | scene graph |
//! | METEOR | `METEOR` | alignment |

pub mod bleu;
pub mod cider;
pub mod external;
pub mod rouge;
pub mod tokenize;

use std::collections::BTreeMap;

use tracing::debug;

pub use bleu::BleuScorer;
pub use cider::CiderScorer;
pub use external::CommandScorer;
pub use rouge::RougeScorer;

use crate::error::Result;
use crate::eval::align::AlignedBatch;

/// Metric name to batch-level score.
pub type MetricScores = BTreeMap<String, f64>;

/// Computes named scores over an aligned batch.
///
/// Implementations must be deterministic for a given batch. The batch is
/// only borrowed, so a scorer can be shared between evaluations.
pub trait Scorer: Send + Sync {
    /// Scorer identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Score every aligned image as one batch.
    fn score(&self, batch: &AlignedBatch) -> Result<MetricScores>;
}

impl<S: Scorer + ?Sized> Scorer for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn score(&self, batch: &AlignedBatch) -> Result<MetricScores> {
        (**self).score(batch)
    }
}

/// Runs several scorers and merges their results.
///
/// Later scorers overwrite keys produced by earlier ones. A failure in any
/// scorer fails the whole batch.
#[derive(Default)]
pub struct CompositeScorer {
    scorers: Vec<Box<dyn Scorer>>,
}

impl CompositeScorer {
    /// Create an empty composite.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The native BLEU, ROUGE-L and CIDEr scorers.
    #[must_use]
    pub fn native() -> Self {
        Self::new()
            .with(BleuScorer::default())
            .with(RougeScorer::default())
            .with(CiderScorer::default())
    }

    /// Append a scorer.
    #[must_use]
    pub fn with(mut self, scorer: impl Scorer + 'static) -> Self {
        self.scorers.push(Box::new(scorer));
        self
    }

    /// Append a boxed scorer.
    pub fn push(&mut self, scorer: Box<dyn Scorer>) -> &mut Self {
        self.scorers.push(scorer);
        self
    }

    /// Number of scorers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scorers.len()
    }

    /// Whether no scorers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scorers.is_empty()
    }
}

impl Scorer for CompositeScorer {
    fn name(&self) -> &str {
        "composite"
    }

    fn score(&self, batch: &AlignedBatch) -> Result<MetricScores> {
        let mut merged = MetricScores::new();
        for scorer in &self.scorers {
            debug!(scorer = scorer.name(), model = %batch.model_name, "running scorer");
            merged.extend(scorer.score(batch)?);
        }
        Ok(merged)
    }
}

/// The four metrics shown in the summary table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SummaryMetric {
    /// BLEU-4, n-gram precision.
    Bleu,
    /// CIDEr, consensus-based.
    Cider,
    /// SPICE, scene-graph based.
    Spice,
    /// METEOR, alignment based.
    Meteor,
}

impl SummaryMetric {
    /// All summary metrics in table order.
    pub const ALL: [Self; 4] = [Self::Bleu, Self::Cider, Self::Spice, Self::Meteor];

    /// Key in a [`MetricScores`] map.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Bleu => "Bleu_4",
            Self::Cider => "CIDEr",
            Self::Spice => "SPICE",
            Self::Meteor => "METEOR",
        }
    }

    /// Column header.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Bleu => "BLEU",
            Self::Cider => "CIDEr",
            Self::Spice => "SPICE",
            Self::Meteor => "METEOR",
        }
    }

    /// One-line explanation for the legend.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Bleu => "Bilingual Evaluation Understudy (matches n-grams, scale 0-1)",
            Self::Cider => "Consensus-based Image Description Evaluation",
            Self::Spice => "Semantic Propositional Image Caption Evaluation",
            Self::Meteor => "Metric for Evaluation of Translation with Explicit ORdering",
        }
    }

    /// Value from a score map, zero when absent.
    #[must_use]
    pub fn value_or_zero(self, scores: &MetricScores) -> f64 {
        scores.get(self.key()).copied().unwrap_or(0.0)
    }
}
