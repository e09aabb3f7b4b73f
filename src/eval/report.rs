//! Report types for evaluation results.
//!
//! A [`Report`] holds one [`EvaluationResult`] per model, ordered by model
//! name. It is persisted as a JSON object keyed by model name.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::metrics::MetricScores;

/// Scores for one model over its aligned images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Model identifier.
    pub model_name: String,

    /// Number of images with both references and predictions.
    pub num_images: usize,

    /// Number of hypotheses scored (one per aligned image).
    pub num_captions: usize,

    /// Batch-level scores by metric name.
    pub metrics: MetricScores,
}

/// Results for all evaluated models, sorted by model name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    results: Vec<EvaluationResult>,
}

impl Report {
    /// Results in ascending model name order.
    #[must_use]
    pub fn results(&self) -> &[EvaluationResult] {
        &self.results
    }

    /// Result for one model.
    #[must_use]
    pub fn get(&self, model_name: &str) -> Option<&EvaluationResult> {
        self.results
            .binary_search_by(|r| r.model_name.as_str().cmp(model_name))
            .ok()
            .map(|idx| &self.results[idx])
    }

    /// Model names in report order.
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.results.iter().map(|r| r.model_name.as_str())
    }

    /// Number of models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether no model produced a result.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Every metric name present in any result, sorted.
    #[must_use]
    pub fn metric_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .results
            .iter()
            .flat_map(|r| r.metrics.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

impl Serialize for Report {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.results.len()))?;
        for result in &self.results {
            map.serialize_entry(&result.model_name, result)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Report {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ReportVisitor;

        impl<'de> Visitor<'de> for ReportVisitor {
            type Value = Report;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of model name to evaluation result")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Report, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut aggregator = ResultAggregator::new();
                while let Some((_key, result)) =
                    access.next_entry::<String, EvaluationResult>()?
                {
                    aggregator.record(result);
                }
                Ok(aggregator.finalize())
            }
        }

        deserializer.deserialize_map(ReportVisitor)
    }
}

/// Collects per-model results.
///
/// Keyed by model name: recording a name twice replaces the earlier result.
#[derive(Debug, Clone, Default)]
pub struct ResultAggregator {
    results: BTreeMap<String, EvaluationResult>,
}

impl ResultAggregator {
    /// Create an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result. Returns the result it replaced, if any.
    pub fn record(&mut self, result: EvaluationResult) -> Option<EvaluationResult> {
        let previous = self.results.insert(result.model_name.clone(), result);
        if let Some(prev) = &previous {
            warn!(model = %prev.model_name, "model evaluated twice; keeping the later result");
        }
        previous
    }

    /// Number of recorded models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Build the report, sorted by model name.
    #[must_use]
    pub fn finalize(self) -> Report {
        Report {
            results: self.results.into_values().collect(),
        }
    }
}
