//! Alignment of reference and prediction captions.
//!
//! Only images present in both inputs are scored. Each aligned image gets
//! exactly one hypothesis: the first caption the model produced for it.
//! Further candidates are dropped; the number dropped per image is kept for
//! diagnostics.

use std::collections::{BTreeMap, BTreeSet};

use tracing::info;

use crate::ImageId;
use crate::corpus::ReferenceSet;
use crate::error::{Error, Result};
use crate::import::PredictionSet;

/// One image ready for scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedImage {
    /// Image identifier.
    pub image_id: ImageId,
    /// All reference captions, in source order.
    pub references: Vec<String>,
    /// The selected candidate caption.
    pub hypothesis: String,
}

/// Reference/hypothesis pairs for every image shared by both inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignedBatch {
    /// Model the hypotheses come from.
    pub model_name: String,
    /// Aligned images in ascending id order.
    pub images: Vec<AlignedImage>,
    /// Candidates discarded per image, only for images with more than one.
    pub dropped: BTreeMap<ImageId, usize>,
}

impl AlignedBatch {
    /// Ids of the aligned images.
    #[must_use]
    pub fn ids(&self) -> BTreeSet<ImageId> {
        self.images.iter().map(|img| img.image_id).collect()
    }

    /// Number of aligned images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Whether no images were aligned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Number of hypotheses handed to a scorer.
    #[must_use]
    pub fn hypothesis_count(&self) -> usize {
        self.images.len()
    }

    /// Total number of discarded candidate captions.
    #[must_use]
    pub fn dropped_total(&self) -> usize {
        self.dropped.values().sum()
    }

    /// Look up an aligned image.
    #[must_use]
    pub fn get(&self, image_id: ImageId) -> Option<&AlignedImage> {
        self.images
            .binary_search_by_key(&image_id, |img| img.image_id)
            .ok()
            .map(|idx| &self.images[idx])
    }
}

/// Intersect references with predictions.
///
/// Returns [`Error::NoOverlap`] when the inputs share no image ids. Ids in
/// `trace` are logged in full.
pub fn align(
    references: &ReferenceSet,
    predictions: &PredictionSet,
    trace: &BTreeSet<ImageId>,
) -> Result<AlignedBatch> {
    let mut batch = AlignedBatch {
        model_name: predictions.model_name.clone(),
        ..AlignedBatch::default()
    };

    for image_id in predictions.ids() {
        let Some(refs) = references.get(image_id) else {
            continue;
        };
        let Some((first, rest)) = predictions.get(image_id).and_then(<[String]>::split_first)
        else {
            continue;
        };

        if trace.contains(&image_id) {
            trace_image(&predictions.model_name, image_id, refs, first, rest);
        }

        if !rest.is_empty() {
            batch.dropped.insert(image_id, rest.len());
        }
        batch.images.push(AlignedImage {
            image_id,
            references: refs.to_vec(),
            hypothesis: first.clone(),
        });
    }

    if batch.is_empty() {
        return Err(Error::NoOverlap {
            model: predictions.model_name.clone(),
        });
    }
    Ok(batch)
}

fn trace_image(model: &str, image_id: ImageId, refs: &[String], first: &str, rest: &[String]) {
    info!(model, image_id, references = refs.len(), candidates = rest.len() + 1, "trace image");
    for (i, caption) in refs.iter().enumerate() {
        info!(model, image_id, index = i + 1, caption = %caption, "reference");
    }
    info!(model, image_id, caption = %first, "selected hypothesis");
    for (i, caption) in rest.iter().enumerate() {
        info!(model, image_id, index = i + 2, caption = %caption, "dropped candidate");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn references(pairs: &[(ImageId, &str)]) -> ReferenceSet {
        pairs.iter().map(|&(id, c)| (id, c.to_string())).collect()
    }

    fn predictions(model: &str, pairs: &[(ImageId, &str)]) -> PredictionSet {
        let mut set = PredictionSet::new(model);
        for &(id, c) in pairs {
            set.push(id, c);
        }
        set
    }

    #[test]
    fn test_intersection() {
        let refs = references(&[(1, "r1"), (2, "r2"), (3, "r3")]);
        let preds = predictions("m", &[(3, "h3"), (2, "h2"), (9, "h9")]);

        let batch = align(&refs, &preds, &BTreeSet::new()).unwrap();
        let expected: BTreeSet<ImageId> = refs
            .ids()
            .collect::<BTreeSet<_>>()
            .intersection(&preds.ids().collect())
            .copied()
            .collect();
        assert_eq!(batch.ids(), expected);
        assert_eq!(batch.images[0].image_id, 2);
        assert_eq!(batch.model_name, "m");
    }

    #[test]
    fn test_first_candidate_selected() {
        let refs = references(&[(7, "a dog playing"), (7, "a puppy")]);
        let preds = predictions("m", &[(7, "a dog"), (7, "a cat"), (7, "a fox")]);

        let batch = align(&refs, &preds, &BTreeSet::new()).unwrap();
        let img = batch.get(7).unwrap();
        assert_eq!(img.hypothesis, "a dog");
        assert_eq!(img.references, vec!["a dog playing", "a puppy"]);
        assert_eq!(batch.hypothesis_count(), 1);
        assert_eq!(batch.dropped.get(&7), Some(&2));
        assert_eq!(batch.dropped_total(), 2);
    }

    #[test]
    fn test_single_candidate_not_counted_as_dropped() {
        let refs = references(&[(1, "a dog runs"), (1, "a brown dog running")]);
        let preds = predictions("m1", &[(1, "a dog")]);

        let batch = align(&refs, &preds, &[1].into_iter().collect()).unwrap();
        assert!(batch.dropped.is_empty());
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_no_overlap() {
        let refs = references(&[(1, "a dog")]);
        let preds = predictions("m2", &[(2, "a cat")]);

        match align(&refs, &preds, &BTreeSet::new()) {
            Err(Error::NoOverlap { model }) => assert_eq!(model, "m2"),
            other => panic!("expected NoOverlap, got {other:?}"),
        }
    }
}
