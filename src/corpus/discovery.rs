//! Prediction source discovery in directories.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Extension of prediction sources.
const PREDICTION_EXTENSION: &str = "csv";

/// A per-model prediction file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionSource {
    /// Model name, taken from the file stem.
    pub model_name: String,
    /// Path to the file.
    pub path: PathBuf,
}

impl PredictionSource {
    /// Build a source from a path, deriving the model name from the file stem.
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let model_name = model_name_for(&path);
        Self { model_name, path }
    }
}

/// Model name for a prediction file: its base name without extension.
#[must_use]
pub fn model_name_for(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| "model".to_string(), |s| s.to_string_lossy().into_owned())
}

/// Find prediction CSV files in a directory, sorted by file name.
///
/// Only the top level is scanned.
pub fn discover_prediction_sources(dir: impl AsRef<Path>) -> Result<Vec<PredictionSource>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(Error::MissingSource {
            path: dir.to_path_buf(),
            what: "Predictions directory",
        });
    }

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_prediction_extension(&path) {
            paths.push(path);
        }
    }

    if paths.is_empty() {
        return Err(Error::NoPredictionSources {
            dir: dir.to_path_buf(),
        });
    }

    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths.into_iter().map(PredictionSource::from_path).collect())
}

fn has_prediction_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case(PREDICTION_EXTENSION))
}
