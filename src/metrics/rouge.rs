//! ROUGE-L.
//!
//! Per image, precision and recall of the longest common subsequence are
//! maximised independently over the references and combined into an
//! F-measure weighted by `beta`. The batch score is the mean over images.

use crate::error::Result;
use crate::eval::align::AlignedBatch;
use crate::metrics::tokenize::tokenize;
use crate::metrics::{MetricScores, Scorer};

/// ROUGE-L scorer.
#[derive(Debug, Clone)]
pub struct RougeScorer {
    beta: f64,
}

impl Default for RougeScorer {
    fn default() -> Self {
        Self { beta: 1.2 }
    }
}

impl RougeScorer {
    /// ROUGE-L with a custom recall weight.
    #[must_use]
    pub fn with_beta(beta: f64) -> Self {
        Self { beta }
    }

    fn image_score(&self, hypothesis: &[String], references: &[Vec<String>]) -> f64 {
        if hypothesis.is_empty() {
            return 0.0;
        }
        let mut best_prec = 0.0f64;
        let mut best_rec = 0.0f64;
        for reference in references.iter().filter(|r| !r.is_empty()) {
            let lcs = lcs_len(reference, hypothesis) as f64;
            best_prec = best_prec.max(lcs / hypothesis.len() as f64);
            best_rec = best_rec.max(lcs / reference.len() as f64);
        }
        if best_prec == 0.0 || best_rec == 0.0 {
            return 0.0;
        }
        let beta2 = self.beta * self.beta;
        ((1.0 + beta2) * best_prec * best_rec) / (best_rec + beta2 * best_prec)
    }
}

impl Scorer for RougeScorer {
    fn name(&self) -> &str {
        "rouge"
    }

    fn score(&self, batch: &AlignedBatch) -> Result<MetricScores> {
        let total: f64 = batch
            .images
            .iter()
            .map(|img| {
                let hyp = tokenize(&img.hypothesis);
                let refs: Vec<Vec<String>> =
                    img.references.iter().map(|r| tokenize(r)).collect();
                self.image_score(&hyp, &refs)
            })
            .sum();
        let mean = if batch.is_empty() {
            0.0
        } else {
            total / batch.len() as f64
        };
        Ok(MetricScores::from([("ROUGE_L".to_string(), mean)]))
    }
}

/// Length of the longest common subsequence.
fn lcs_len(a: &[String], b: &[String]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for x in a {
        for (j, y) in b.iter().enumerate() {
            curr[j + 1] = if x == y {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
