//! CSV import for per-model caption predictions.
//!
//! Each prediction source is a CSV file with at least an image id column and
//! a caption column. Rows are grouped by image id in the order they appear;
//! the order matters because alignment keeps only the first caption per
//! image.
//!
//! ## Example
//!
//! ```rust,ignore
//! use caption_eval::import::{PredictionLoader, PredictionSchema, RowPolicy};
//!
//! let schema = PredictionSchema::builder()
//!     .image_column("img")
//!     .caption_column("text")
//!     .build();
//!
//! let predictions = PredictionLoader::new(schema)
//!     .row_policy(RowPolicy::SkipMalformed)
//!     .load("csv/blip.csv")?;
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ImageId;
use crate::corpus::model_name_for;
use crate::error::{Error, Result};

/// Default column name for the image identifier.
pub const DEFAULT_IMAGE_COLUMN: &str = "image_id";

/// Default column name for the caption text.
pub const DEFAULT_CAPTION_COLUMN: &str = "caption_text";

/// Candidate captions produced by one model, keyed by image id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredictionSet {
    /// Model that produced the captions.
    pub model_name: String,
    captions: BTreeMap<ImageId, Vec<String>>,
}

impl PredictionSet {
    /// Create an empty prediction set for a model.
    #[must_use]
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            captions: BTreeMap::new(),
        }
    }

    /// Append a candidate caption for an image.
    pub fn push(&mut self, image_id: ImageId, caption: impl Into<String>) {
        self.captions
            .entry(image_id)
            .or_default()
            .push(caption.into());
    }

    /// Candidate captions for one image, in source order.
    #[must_use]
    pub fn get(&self, image_id: ImageId) -> Option<&[String]> {
        self.captions.get(&image_id).map(Vec::as_slice)
    }

    /// Image ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = ImageId> + '_ {
        self.captions.keys().copied()
    }

    /// Number of distinct images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.captions.len()
    }

    /// Whether no captions were loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.captions.is_empty()
    }

    /// Total number of candidate captions.
    #[must_use]
    pub fn caption_count(&self) -> usize {
        self.captions.values().map(Vec::len).sum()
    }
}

/// How to treat malformed rows: an unparsable image id, a wrong field
/// count, or invalid UTF-8.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowPolicy {
    /// Fail the whole source on the first bad row.
    #[default]
    Strict,
    /// Log a warning and skip the row.
    SkipMalformed,
}

/// Column names of a prediction source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionSchema {
    /// Column name for image identifier.
    pub image_column: String,
    /// Column name for caption text.
    pub caption_column: String,
}

impl Default for PredictionSchema {
    fn default() -> Self {
        Self {
            image_column: DEFAULT_IMAGE_COLUMN.to_string(),
            caption_column: DEFAULT_CAPTION_COLUMN.to_string(),
        }
    }
}

impl PredictionSchema {
    /// Create a schema builder.
    #[must_use]
    pub fn builder() -> PredictionSchemaBuilder {
        PredictionSchemaBuilder::default()
    }
}

/// Builder for [`PredictionSchema`].
#[derive(Debug, Default)]
pub struct PredictionSchemaBuilder {
    schema: PredictionSchema,
}

impl PredictionSchemaBuilder {
    /// Set the image column name.
    #[must_use]
    pub fn image_column(mut self, name: impl Into<String>) -> Self {
        self.schema.image_column = name.into();
        self
    }

    /// Set the caption column name.
    #[must_use]
    pub fn caption_column(mut self, name: impl Into<String>) -> Self {
        self.schema.caption_column = name.into();
        self
    }

    /// Build the schema.
    #[must_use]
    pub fn build(self) -> PredictionSchema {
        self.schema
    }
}

/// CSV loader for prediction sources.
#[derive(Debug, Clone, Default)]
pub struct PredictionLoader {
    schema: PredictionSchema,
    row_policy: RowPolicy,
}

impl PredictionLoader {
    /// Create a loader with the given schema.
    #[must_use]
    pub fn new(schema: PredictionSchema) -> Self {
        Self {
            schema,
            row_policy: RowPolicy::default(),
        }
    }

    /// Set how malformed rows are handled.
    #[must_use]
    pub fn row_policy(mut self, policy: RowPolicy) -> Self {
        self.row_policy = policy;
        self
    }

    /// Load a prediction file. The model name is the file stem.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<PredictionSet> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)?;

        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        let header_refs: Vec<&str> = headers.iter().map(String::as_str).collect();

        let image_idx = find_header_index(&header_refs, &self.schema.image_column)
            .ok_or_else(|| Error::Schema {
                path: path.to_path_buf(),
                missing: self.schema.image_column.clone(),
            })?;
        let caption_idx = find_header_index(&header_refs, &self.schema.caption_column)
            .ok_or_else(|| Error::Schema {
                path: path.to_path_buf(),
                missing: self.schema.caption_column.clone(),
            })?;

        let mut set = PredictionSet::new(model_name_for(path));

        for record in reader.records() {
            let record = match record {
                Ok(record) => record,
                Err(err) if self.row_policy == RowPolicy::SkipMalformed && is_row_error(&err) => {
                    warn!(
                        path = %path.display(),
                        line = err.position().map(csv::Position::line),
                        error = %err,
                        "skipping malformed row"
                    );
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            let line = record.position().map_or(0, csv::Position::line);

            let raw_id = record.get(image_idx).unwrap_or("");
            let Some(image_id) = parse_image_id(raw_id) else {
                let err = Error::Parse {
                    path: path.to_path_buf(),
                    line,
                    value: raw_id.to_string(),
                };
                match self.row_policy {
                    RowPolicy::Strict => return Err(err),
                    RowPolicy::SkipMalformed => {
                        warn!(error = %err, "skipping malformed row");
                        continue;
                    }
                }
            };

            let caption = record.get(caption_idx).unwrap_or("").trim();
            set.push(image_id, caption);
        }

        debug!(
            model = %set.model_name,
            images = set.len(),
            captions = set.caption_count(),
            "loaded predictions"
        );
        Ok(set)
    }
}

/// Parse an image id cell. Integral float text such as `285.0` is accepted.
fn parse_image_id(raw: &str) -> Option<ImageId> {
    let raw = raw.trim();
    if let Ok(id) = raw.parse::<ImageId>() {
        return Some(id);
    }
    let value: f64 = raw.parse().ok()?;
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15 {
        Some(value as ImageId)
    } else {
        None
    }
}

/// Errors confined to a single record; the reader can continue past them.
fn is_row_error(err: &csv::Error) -> bool {
    matches!(
        err.kind(),
        csv::ErrorKind::UnequalLengths { .. } | csv::ErrorKind::Utf8 { .. }
    )
}

/// Find a header index by name (case-insensitive, surrounding whitespace ignored).
fn find_header_index(headers: &[&str], name: &str) -> Option<usize> {
    let name_lower = name.to_lowercase();
    headers
        .iter()
        .position(|h| h.trim().to_lowercase() == name_lower)
}
