//! Corpus-level BLEU.
//!
//! Clipped n-gram matches and totals are summed over the whole batch before
//! the precisions are combined, and the brevity penalty uses, per image, the
//! reference length closest to the hypothesis length (shorter wins ties).
//! Produces `Bleu_1` through `Bleu_<max_n>`.

use std::collections::HashMap;

use crate::error::Result;
use crate::eval::align::AlignedBatch;
use crate::metrics::tokenize::{ngram_counts, tokenize};
use crate::metrics::{MetricScores, Scorer};

/// Smoothing constants keeping empty precisions finite.
const TINY: f64 = 1e-15;
const SMALL: f64 = 1e-9;

/// BLEU scorer.
#[derive(Debug, Clone)]
pub struct BleuScorer {
    max_n: usize,
}

impl Default for BleuScorer {
    fn default() -> Self {
        Self { max_n: 4 }
    }
}

impl BleuScorer {
    /// BLEU up to order `max_n` (at least 1).
    #[must_use]
    pub fn new(max_n: usize) -> Self {
        Self { max_n: max_n.max(1) }
    }
}

impl Scorer for BleuScorer {
    fn name(&self) -> &str {
        "bleu"
    }

    fn score(&self, batch: &AlignedBatch) -> Result<MetricScores> {
        let n = self.max_n;
        let mut matched = vec![0usize; n];
        let mut total = vec![0usize; n];
        let mut hyp_len = 0usize;
        let mut ref_len = 0usize;

        for img in &batch.images {
            let hyp = tokenize(&img.hypothesis);
            let refs: Vec<Vec<String>> = img.references.iter().map(|r| tokenize(r)).collect();

            // Max count of each n-gram over any single reference
            let mut max_ref: HashMap<Vec<String>, usize> = HashMap::new();
            for r in &refs {
                for (gram, count) in ngram_counts(r, n) {
                    let slot = max_ref.entry(gram).or_default();
                    *slot = (*slot).max(count);
                }
            }

            for (gram, count) in ngram_counts(&hyp, n) {
                let order = gram.len() - 1;
                let clip = max_ref.get(&gram).copied().unwrap_or(0);
                matched[order] += count.min(clip);
            }
            for (order, slot) in total.iter_mut().enumerate() {
                *slot += hyp.len().saturating_sub(order);
            }

            hyp_len += hyp.len();
            ref_len += closest_ref_len(hyp.len(), &refs);
        }

        let brevity = if hyp_len == 0 {
            0.0
        } else if hyp_len < ref_len {
            (1.0 - ref_len as f64 / hyp_len as f64).exp()
        } else {
            1.0
        };

        let mut scores = MetricScores::new();
        let mut log_sum = 0.0;
        for (order, (&hits, &count)) in matched.iter().zip(&total).enumerate() {
            let precision = (hits as f64 + TINY) / (count as f64 + SMALL);
            log_sum += precision.ln();
            let bleu = (log_sum / (order + 1) as f64).exp() * brevity;
            scores.insert(format!("Bleu_{}", order + 1), bleu);
        }
        Ok(scores)
    }
}

fn closest_ref_len(hyp_len: usize, refs: &[Vec<String>]) -> usize {
    refs.iter()
        .map(Vec::len)
        .min_by_key(|&len| (len.abs_diff(hyp_len), len))
        .unwrap_or(0)
}
