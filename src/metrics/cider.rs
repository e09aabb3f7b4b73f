//! CIDEr-D.
//!
//! Every caption becomes one tf-idf vector per n-gram order, with document
//! frequencies taken from the batch references. The hypothesis is compared
//! to each reference by clipped cosine similarity, damped by a Gaussian
//! penalty on the length difference. Orders are averaged, references are
//! averaged, and the result is scaled by 10. The batch score is the mean
//! over images.
//!
//! Document frequencies depend on the whole batch, so a batch with a single
//! image always scores zero.

use std::collections::HashMap;

use crate::error::Result;
use crate::eval::align::AlignedBatch;
use crate::metrics::tokenize::{NgramCounts, ngram_counts, tokenize};
use crate::metrics::{MetricScores, Scorer};

/// CIDEr-D scorer.
#[derive(Debug, Clone)]
pub struct CiderScorer {
    max_n: usize,
    sigma: f64,
}

impl Default for CiderScorer {
    fn default() -> Self {
        Self {
            max_n: 4,
            sigma: 6.0,
        }
    }
}

/// tf-idf vectors of one caption.
struct TfIdf {
    vecs: Vec<HashMap<Vec<String>, f64>>,
    norms: Vec<f64>,
    length: f64,
}

impl CiderScorer {
    fn to_tfidf(
        &self,
        counts: &NgramCounts,
        df: &HashMap<Vec<String>, f64>,
        log_ref_len: f64,
    ) -> TfIdf {
        let mut vecs = vec![HashMap::new(); self.max_n];
        let mut norms = vec![0.0; self.max_n];
        let mut length = 0.0;

        for (gram, &tf) in counts {
            let order = gram.len() - 1;
            let doc_freq = df.get(gram).copied().unwrap_or(0.0).max(1.0).ln();
            let weight = tf as f64 * (log_ref_len - doc_freq);
            norms[order] += weight * weight;
            vecs[order].insert(gram.clone(), weight);
            // length is measured in bigrams
            if order == 1 {
                length += tf as f64;
            }
        }
        for norm in &mut norms {
            *norm = norm.sqrt();
        }
        TfIdf { vecs, norms, length }
    }

    fn similarity(&self, hyp: &TfIdf, reference: &TfIdf) -> Vec<f64> {
        let delta = hyp.length - reference.length;
        let penalty = (-(delta * delta) / (2.0 * self.sigma * self.sigma)).exp();

        (0..self.max_n)
            .map(|order| {
                let mut val: f64 = hyp.vecs[order]
                    .iter()
                    .map(|(gram, &h)| {
                        let r = reference.vecs[order].get(gram).copied().unwrap_or(0.0);
                        h.min(r) * r
                    })
                    .sum();
                if hyp.norms[order] != 0.0 && reference.norms[order] != 0.0 {
                    val /= hyp.norms[order] * reference.norms[order];
                }
                val * penalty
            })
            .collect()
    }
}

impl Scorer for CiderScorer {
    fn name(&self) -> &str {
        "cider"
    }

    fn score(&self, batch: &AlignedBatch) -> Result<MetricScores> {
        let n = self.max_n;
        let hyps: Vec<NgramCounts> = batch
            .images
            .iter()
            .map(|img| ngram_counts(&tokenize(&img.hypothesis), n))
            .collect();
        let refs: Vec<Vec<NgramCounts>> = batch
            .images
            .iter()
            .map(|img| {
                img.references
                    .iter()
                    .map(|r| ngram_counts(&tokenize(r), n))
                    .collect()
            })
            .collect();

        // Number of images whose references contain each n-gram
        let mut df: HashMap<Vec<String>, f64> = HashMap::new();
        for image_refs in &refs {
            let mut seen: Vec<&Vec<String>> = image_refs.iter().flat_map(|c| c.keys()).collect();
            seen.sort();
            seen.dedup();
            for gram in seen {
                *df.entry(gram.clone()).or_default() += 1.0;
            }
        }

        let log_ref_len = (batch.len().max(1) as f64).ln();
        let mut total = 0.0;
        for (hyp, image_refs) in hyps.iter().zip(&refs) {
            if image_refs.is_empty() {
                continue;
            }
            let hyp_vec = self.to_tfidf(hyp, &df, log_ref_len);
            let mut sum = vec![0.0; n];
            for r in image_refs {
                let ref_vec = self.to_tfidf(r, &df, log_ref_len);
                for (acc, s) in sum.iter_mut().zip(self.similarity(&hyp_vec, &ref_vec)) {
                    *acc += s;
                }
            }
            let mean_over_orders = sum.iter().sum::<f64>() / n as f64;
            total += mean_over_orders / image_refs.len() as f64 * 10.0;
        }

        let mean = if batch.is_empty() {
            0.0
        } else {
            total / batch.len() as f64
        };
        Ok(MetricScores::from([("CIDEr".to_string(), mean)]))
    }
}
