//! COCO caption JSON interchange types.
//!
//! The reference corpus is read in this format, and batches handed to
//! external scorers are written in it:
//!
//! - ground truth: `{"images": [{"id": ..}], "annotations": [{"id", "image_id", "caption"}]}`
//! - results: `[{"image_id": .., "caption": ..}]`

use serde::{Deserialize, Serialize};

use crate::ImageId;

/// Image entry of a COCO caption file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CocoImage {
    /// Image identifier.
    pub id: ImageId,
}

/// One caption annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CocoAnnotation {
    /// Annotation identifier. Absent in some hand-made reference files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Image the caption describes.
    pub image_id: ImageId,
    /// Caption text.
    pub caption: String,
}

/// A COCO captions document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CocoCaptions {
    /// Image list; ignored when loading references.
    #[serde(default)]
    pub images: Vec<CocoImage>,
    /// Caption annotations.
    pub annotations: Vec<CocoAnnotation>,
}

/// One entry of a COCO results file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CocoResult {
    /// Image identifier.
    pub image_id: ImageId,
    /// Generated caption.
    pub caption: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation_without_id() {
        let doc: CocoCaptions = serde_json::from_str(
            r#"{"annotations": [{"image_id": 1, "caption": "a dog runs"}]}"#,
        )
        .unwrap();
        assert!(doc.images.is_empty());
        assert_eq!(doc.annotations[0].id, None);
        assert_eq!(doc.annotations[0].image_id, 1);
    }

    #[test]
    fn test_missing_annotations_rejected() {
        let doc = serde_json::from_str::<CocoCaptions>(r#"{"images": []}"#);
        assert!(doc.is_err());
    }
}
