//! Error types for caption-eval operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for caption-eval operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during caption evaluation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A required input (reference file or predictions directory) does not exist.
    #[error("{what} not found: {path}")]
    MissingSource {
        /// Path that was expected to exist.
        path: PathBuf,
        /// Human-readable description of the input.
        what: &'static str,
    },

    /// The reference file exists but cannot be read or parsed.
    #[error("Failed to read annotations file {path}: {source}")]
    Reference {
        /// Reference file path.
        path: PathBuf,
        /// Underlying read or parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The predictions directory holds no prediction sources.
    #[error("No prediction CSV files found in {dir}")]
    NoPredictionSources {
        /// Directory that was scanned.
        dir: PathBuf,
    },

    /// A prediction source lacks a required column.
    #[error("Schema error in {path}: missing required column '{missing}'")]
    Schema {
        /// Prediction source path.
        path: PathBuf,
        /// Name of the missing column.
        missing: String,
    },

    /// An image id in a prediction source is not an integer.
    #[error("Parse error in {path} at line {line}: image_id '{value}' is not an integer")]
    Parse {
        /// Prediction source path.
        path: PathBuf,
        /// 1-based physical line where the record starts (the header is line 1).
        line: u64,
        /// Offending cell content.
        value: String,
    },

    /// Reference and prediction ids do not intersect.
    #[error("No common images between ground truth and predictions for {model}")]
    NoOverlap {
        /// Model whose predictions were aligned.
        model: String,
    },

    /// A scorer failed to produce metrics.
    #[error("Scorer error ({scorer}): {message}")]
    Scorer {
        /// Scorer identifier.
        scorer: String,
        /// Error message from the scorer.
        message: String,
    },

    /// Error writing report files.
    #[error("Report error: {0}")]
    Report(String),

    /// I/O error wrapper.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error.
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Whether this error stops the whole run rather than a single model.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingSource { .. }
                | Self::Reference { .. }
                | Self::NoPredictionSources { .. }
        )
    }

    pub(crate) fn scorer(scorer: &str, message: impl Into<String>) -> Self {
        Self::Scorer {
            scorer: scorer.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let missing = Error::MissingSource {
            path: PathBuf::from("coco/captions_val2017.json"),
            what: "Annotations file",
        };
        assert!(missing.is_fatal());
        assert!(
            Error::NoPredictionSources {
                dir: PathBuf::from("csv")
            }
            .is_fatal()
        );

        let overlap = Error::NoOverlap {
            model: "m2".to_string(),
        };
        assert!(!overlap.is_fatal());

        let unreadable = Error::Reference {
            path: PathBuf::from("refs.json"),
            source: serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
        };
        assert!(unreadable.is_fatal());
        assert!(!Error::scorer("bleu", "boom").is_fatal());
    }

    #[test]
    fn test_messages() {
        let err = Error::Parse {
            path: PathBuf::from("m1.csv"),
            line: 3,
            value: "abc".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Parse error in m1.csv at line 3: image_id 'abc' is not an integer"
        );

        let err = Error::MissingSource {
            path: PathBuf::from("refs.json"),
            what: "Annotations file",
        };
        assert_eq!(err.to_string(), "Annotations file not found: refs.json");
    }

    #[test]
    fn test_csv_message_not_doubled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragged.csv");
        std::fs::write(&path, "a,b\n1\n").unwrap();
        let mut reader = csv::Reader::from_path(&path).unwrap();
        let csv_err = reader.records().next().unwrap().unwrap_err();
        let expected = csv_err.to_string();

        let err = Error::from(csv_err);
        assert_eq!(err.to_string(), expected);
        assert_eq!(err.to_string().matches("CSV error").count(), 1);
    }
}
