//! Reference corpus management.
//!
//! The reference corpus is a COCO captions file mapping image ids to one or
//! more human-written captions. It is loaded once per run and shared
//! read-only by every model evaluation.
//!
//! ## Example
//!
//! ```rust,ignore
//! use caption_eval::corpus::{ReferenceSet, discover_prediction_sources};
//!
//! let references = ReferenceSet::load("coco/captions_val2017.json")?;
//! for source in discover_prediction_sources("csv")? {
//!     println!("{} -> {}", source.model_name, source.path.display());
//! }
//! ```

mod discovery;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::info;

pub use discovery::{PredictionSource, discover_prediction_sources, model_name_for};

use crate::ImageId;
use crate::coco::{CocoAnnotation, CocoCaptions};
use crate::error::{Error, Result};

/// Ground-truth captions keyed by image id.
///
/// Caption order per image follows the source file. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSet {
    captions: BTreeMap<ImageId, Vec<String>>,
}

impl ReferenceSet {
    /// Load references from a COCO captions JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::MissingSource {
                path: path.to_path_buf(),
                what: "Annotations file",
            });
        }

        info!(path = %path.display(), "loading ground truth captions");
        let doc: CocoCaptions = File::open(path)
            .map_err(serde_json::Error::io)
            .and_then(|file| serde_json::from_reader(BufReader::new(file)))
            .map_err(|source| Error::Reference {
                path: path.to_path_buf(),
                source,
            })?;
        let set = Self::from_annotations(doc.annotations);

        info!(images = set.len(), "loaded reference captions");
        Ok(set)
    }

    /// Group annotations by image id, keeping every caption in source order.
    pub fn from_annotations(annotations: impl IntoIterator<Item = CocoAnnotation>) -> Self {
        let mut captions: BTreeMap<ImageId, Vec<String>> = BTreeMap::new();
        for annotation in annotations {
            captions
                .entry(annotation.image_id)
                .or_default()
                .push(annotation.caption);
        }
        Self { captions }
    }

    /// Reference captions for one image.
    #[must_use]
    pub fn get(&self, image_id: ImageId) -> Option<&[String]> {
        self.captions.get(&image_id).map(Vec::as_slice)
    }

    /// Whether an image has references.
    #[must_use]
    pub fn contains(&self, image_id: ImageId) -> bool {
        self.captions.contains_key(&image_id)
    }

    /// Image ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = ImageId> + '_ {
        self.captions.keys().copied()
    }

    /// Number of images with references.
    #[must_use]
    pub fn len(&self) -> usize {
        self.captions.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.captions.is_empty()
    }

    /// Total number of reference captions.
    #[must_use]
    pub fn caption_count(&self) -> usize {
        self.captions.values().map(Vec::len).sum()
    }
}

impl FromIterator<(ImageId, String)> for ReferenceSet {
    fn from_iter<I: IntoIterator<Item = (ImageId, String)>>(iter: I) -> Self {
        Self::from_annotations(iter.into_iter().map(|(image_id, caption)| CocoAnnotation {
            id: None,
            image_id,
            caption,
        }))
    }
}
