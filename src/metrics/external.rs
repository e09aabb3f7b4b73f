//! Scoring through an external evaluator process.
//!
//! Metrics without a native implementation (SPICE, METEOR) come from an
//! external program. The batch is written as two COCO JSON files, a ground
//! truth file and a results file, whose paths are appended to the program's
//! arguments. The program must print a JSON object mapping metric names to
//! numbers on stdout.
//!
//! Scratch file names start with `_temp_gt_<model>` / `_temp_res_<model>` so
//! evaluations of different models never collide. The files are removed
//! when scoring returns, whether it succeeded or not.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::ImageId;
use crate::coco::{CocoAnnotation, CocoCaptions, CocoImage, CocoResult};
use crate::error::{Error, Result};
use crate::eval::align::AlignedBatch;
use crate::metrics::{MetricScores, Scorer};

/// Convert a batch to COCO ground truth and results documents.
///
/// Annotation ids are assigned sequentially in image id order.
#[must_use]
pub fn to_coco(batch: &AlignedBatch) -> (CocoCaptions, Vec<CocoResult>) {
    let mut gt = CocoCaptions::default();
    let mut results = Vec::with_capacity(batch.len());
    let mut ann_id = 0u64;

    for img in &batch.images {
        gt.images.push(CocoImage { id: img.image_id });
        for caption in &img.references {
            gt.annotations.push(CocoAnnotation {
                id: Some(ann_id),
                image_id: img.image_id,
                caption: caption.clone(),
            });
            ann_id += 1;
        }
        results.push(CocoResult {
            image_id: img.image_id,
            caption: img.hypothesis.clone(),
        });
    }
    (gt, results)
}

/// Runs an external evaluator on COCO files.
#[derive(Debug, Clone)]
pub struct CommandScorer {
    program: PathBuf,
    args: Vec<String>,
    scratch_dir: PathBuf,
    trace_ids: BTreeSet<ImageId>,
}

impl CommandScorer {
    /// Create a scorer for `program`. Scratch files go to the system temp dir.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            scratch_dir: std::env::temp_dir(),
            trace_ids: BTreeSet::new(),
        }
    }

    /// Arguments placed before the two file paths.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Directory for the scratch files.
    #[must_use]
    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    /// Image ids whose marshaled entries are logged.
    #[must_use]
    pub fn trace_ids(mut self, ids: BTreeSet<ImageId>) -> Self {
        self.trace_ids = ids;
        self
    }

    fn write_scratch<T>(&self, prefix: &str, value: &T) -> Result<NamedTempFile>
    where
        T: serde::Serialize + ?Sized,
    {
        let mut file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(".json")
            .tempfile_in(&self.scratch_dir)?;
        serde_json::to_writer(&mut file, value)?;
        file.flush()?;
        Ok(file)
    }

    fn trace(
        &self,
        gt: &CocoCaptions,
        results: &[CocoResult],
        gt_path: &Path,
        res_path: &Path,
    ) {
        for &image_id in &self.trace_ids {
            let anns: Vec<_> = gt
                .annotations
                .iter()
                .filter(|a| a.image_id == image_id)
                .collect();
            let res: Vec<_> = results.iter().filter(|r| r.image_id == image_id).collect();
            if anns.is_empty() && res.is_empty() {
                continue;
            }
            info!(
                image_id,
                annotations = anns.len(),
                results = res.len(),
                gt_file = %gt_path.display(),
                res_file = %res_path.display(),
                "trace marshaled image"
            );
            for ann in anns {
                info!(image_id, annotation = ?ann, "ground truth annotation");
            }
            for r in res {
                info!(image_id, result = ?r, "result entry");
            }
        }
    }
}

impl Scorer for CommandScorer {
    fn name(&self) -> &str {
        "command"
    }

    fn score(&self, batch: &AlignedBatch) -> Result<MetricScores> {
        let (gt, results) = to_coco(batch);
        let model = sanitize(&batch.model_name);

        // Dropped at the end of this call on every path, removing the files
        let gt_file = self.write_scratch(&format!("_temp_gt_{model}_"), &gt)?;
        let res_file = self.write_scratch(&format!("_temp_res_{model}_"), &results)?;

        self.trace(&gt, &results, gt_file.path(), res_file.path());

        debug!(
            program = %self.program.display(),
            model = %batch.model_name,
            "running external scorer"
        );
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(gt_file.path())
            .arg(res_file.path())
            .output()
            .map_err(|e| {
                Error::scorer(
                    self.name(),
                    format!("failed to run {}: {e}", self.program.display()),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::scorer(
                self.name(),
                format!(
                    "{} exited with {}: {}",
                    self.program.display(),
                    output.status,
                    stderr.trim()
                ),
            ));
        }

        serde_json::from_slice::<MetricScores>(&output.stdout).map_err(|e| {
            Error::scorer(self.name(), format!("unparsable evaluator output: {e}"))
        })
    }
}

/// Keep model names usable inside file names.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::test_support::batch;

    #[test]
    fn test_to_coco() {
        let b = batch(
            "m1",
            &[
                (1, &["a dog runs", "a brown dog running"], "a dog"),
                (4, &["a cat"], "a kitten"),
            ],
        );
        let (gt, results) = to_coco(&b);

        assert_eq!(gt.images, vec![CocoImage { id: 1 }, CocoImage { id: 4 }]);
        let ids: Vec<_> = gt.annotations.iter().map(|a| (a.id, a.image_id)).collect();
        assert_eq!(ids, vec![(Some(0), 1), (Some(1), 1), (Some(2), 4)]);
        assert_eq!(
            results,
            vec![
                CocoResult { image_id: 1, caption: "a dog".to_string() },
                CocoResult { image_id: 4, caption: "a kitten".to_string() },
            ]
        );
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("blip/base v2"), "blip_base_v2");
        assert_eq!(sanitize("florence-2.large"), "florence-2.large");
    }

    #[cfg(unix)]
    fn shell_scorer(script: &str, scratch: &Path) -> CommandScorer {
        CommandScorer::new("sh")
            .args(["-c", script, "sh"])
            .scratch_dir(scratch)
    }

    #[cfg(unix)]
    #[test]
    fn test_success_parses_output_and_cleans_up() {
        let scratch = tempfile::tempdir().unwrap();
        let scorer = shell_scorer(
            r#"case "$1" in *_temp_gt_m1_*) ;; *) exit 9 ;; esac
               grep -q '"caption":"a dog"' "$2" || exit 8
               printf '{"SPICE": 0.21, "METEOR": 0.25}'"#,
            scratch.path(),
        );

        let scores = scorer
            .score(&batch("m1", &[(1, &["a dog runs"], "a dog")]))
            .unwrap();
        assert_eq!(scores["SPICE"], 0.21);
        assert_eq!(scores["METEOR"], 0.25);
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_cleans_up() {
        let scratch = tempfile::tempdir().unwrap();
        let scorer = shell_scorer("echo boom >&2; exit 3", scratch.path());

        let err = scorer
            .score(&batch("m1", &[(1, &["a dog runs"], "a dog")]))
            .unwrap_err();
        assert!(matches!(err, Error::Scorer { .. }));
        assert!(err.to_string().contains("boom"));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_bad_output() {
        let scratch = tempfile::tempdir().unwrap();
        let scorer = shell_scorer("echo not-json", scratch.path());
        let err = scorer
            .score(&batch("m1", &[(1, &["a dog runs"], "a dog")]))
            .unwrap_err();
        assert!(err.to_string().contains("unparsable"));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_program() {
        let scratch = tempfile::tempdir().unwrap();
        let scorer = CommandScorer::new("/nonexistent/evaluator").scratch_dir(scratch.path());
        let err = scorer
            .score(&batch("m1", &[(1, &["a dog runs"], "a dog")]))
            .unwrap_err();
        assert!(matches!(err, Error::Scorer { .. }));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }
}
