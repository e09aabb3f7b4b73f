//! Report rendering.
//!
//! The persisted form is pretty-printed JSON with every metric kept at full
//! precision. The console form is a fixed-width table showing the four
//! summary metrics at 4 decimals, followed by a legend. A summary metric a
//! model did not produce is shown as `0.0000`.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::{Error, Result};
use crate::eval::report::Report;
use crate::metrics::SummaryMetric;

/// Width of the model name column.
pub const MODEL_COLUMN_WIDTH: usize = 40;

/// Width of the image count column.
const IMAGES_COLUMN_WIDTH: usize = 8;

/// Width of each metric column.
const METRIC_COLUMN_WIDTH: usize = 10;

/// Width of the horizontal rules.
const RULE_WIDTH: usize = 88;

/// Both renderings of a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    /// JSON document to persist.
    pub json: String,
    /// Console table with legend.
    pub table: String,
}

/// Renders reports for persistence and display.
pub struct ReportFormatter;

impl ReportFormatter {
    /// Render both forms.
    pub fn render(report: &Report) -> Result<RenderedReport> {
        Ok(RenderedReport {
            json: Self::to_json(report)?,
            table: format!("{}{}", Self::table(report), Self::legend()),
        })
    }

    /// Pretty JSON object keyed by model name.
    pub fn to_json(report: &Report) -> Result<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }

    /// Parse a persisted report.
    pub fn from_json(json: &str) -> Result<Report> {
        Ok(serde_json::from_str(json)?)
    }

    /// Summary table, one row per model in report order.
    #[must_use]
    pub fn table(report: &Report) -> String {
        let mut out = String::new();

        let _ = write!(
            out,
            "{:<name_w$} {:<img_w$}",
            "Model",
            "Images",
            name_w = MODEL_COLUMN_WIDTH,
            img_w = IMAGES_COLUMN_WIDTH
        );
        for metric in SummaryMetric::ALL {
            let _ = write!(out, " {:<w$}", metric.label(), w = METRIC_COLUMN_WIDTH);
        }
        out.push('\n');
        let _ = writeln!(out, "{:-<RULE_WIDTH$}", "");

        for result in report.results() {
            let _ = write!(
                out,
                "{:<name_w$} {:<img_w$}",
                fit_name(&result.model_name),
                result.num_images,
                name_w = MODEL_COLUMN_WIDTH,
                img_w = IMAGES_COLUMN_WIDTH
            );
            for metric in SummaryMetric::ALL {
                let value = metric.value_or_zero(&result.metrics);
                let _ = write!(out, " {:>w$.4}", value, w = METRIC_COLUMN_WIDTH - 1);
            }
            out.push('\n');
        }

        let _ = writeln!(out, "{:=<RULE_WIDTH$}", "");
        out
    }

    /// Static explanation of the summary metrics.
    #[must_use]
    pub fn legend() -> String {
        let mut out = String::from("\nMetric Explanation:\n");
        for metric in SummaryMetric::ALL {
            let _ = writeln!(out, "  {:<6} - {}", metric.label(), metric.description());
        }
        let _ = writeln!(out, "{:=<RULE_WIDTH$}", "");
        out
    }

    /// Write a CSV with one row per model and one column per metric.
    ///
    /// Metrics a model did not produce are left empty.
    pub fn write_csv_summary(report: &Report, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;
        let metric_names = report.metric_names();

        let mut header = vec![
            "model".to_string(),
            "num_images".to_string(),
            "num_captions".to_string(),
        ];
        header.extend(metric_names.iter().cloned());
        wtr.write_record(&header)?;

        for result in report.results() {
            let mut row = vec![
                result.model_name.clone(),
                result.num_images.to_string(),
                result.num_captions.to_string(),
            ];
            row.extend(
                metric_names
                    .iter()
                    .map(|m| result.metrics.get(m).map_or(String::new(), |v| v.to_string())),
            );
            wtr.write_record(&row)?;
        }

        wtr.flush()
            .map_err(|e| Error::Report(format!("failed to write {}: {e}", path.display())))
    }
}

/// Pad or truncate a model name to the name column.
fn fit_name(name: &str) -> String {
    if name.chars().count() <= MODEL_COLUMN_WIDTH {
        return name.to_string();
    }
    let kept: String = name.chars().take(MODEL_COLUMN_WIDTH - 3).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::report::{EvaluationResult, ResultAggregator};

    fn report(entries: &[(&str, usize, &[(&str, f64)])]) -> Report {
        let mut agg = ResultAggregator::new();
        for (model, images, metrics) in entries {
            agg.record(EvaluationResult {
                model_name: (*model).to_string(),
                num_images: *images,
                num_captions: *images,
                metrics: metrics.iter().map(|(k, v)| ((*k).to_string(), *v)).collect(),
            });
        }
        agg.finalize()
    }

    #[test]
    fn test_table_rows_sorted_with_zero_defaults() {
        let r = report(&[
            ("beta", 12, &[("Bleu_4", 0.31234), ("CIDEr", 1.05)]),
            ("alpha", 7, &[("SPICE", 0.2), ("METEOR", 0.25)]),
        ]);
        let table = ReportFormatter::table(&r);
        let lines: Vec<&str> = table.lines().collect();

        assert!(lines[0].starts_with("Model"));
        assert!(lines[0].contains("BLEU") && lines[0].contains("METEOR"));
        assert!(lines[2].starts_with("alpha"));
        assert!(lines[3].starts_with("beta"));

        let alpha: Vec<&str> = lines[2].split_whitespace().collect();
        assert_eq!(alpha, vec!["alpha", "7", "0.0000", "0.0000", "0.2000", "0.2500"]);
        let beta: Vec<&str> = lines[3].split_whitespace().collect();
        assert_eq!(beta, vec!["beta", "12", "0.3123", "1.0500", "0.0000", "0.0000"]);
    }

    #[test]
    fn test_row_layout() {
        let r = report(&[("m1", 1, &[("Bleu_4", 0.5)])]);
        let table = ReportFormatter::table(&r);
        let row = table.lines().nth(2).unwrap();
        assert_eq!(&row[..MODEL_COLUMN_WIDTH], format!("{:<40}", "m1"));
        assert_eq!(&row[MODEL_COLUMN_WIDTH + 1..MODEL_COLUMN_WIDTH + 10], "1        ");
        assert!(row.ends_with("   0.0000"));
    }

    #[test]
    fn test_long_names_truncated() {
        let name = "x".repeat(60);
        let fitted = fit_name(&name);
        assert_eq!(fitted.chars().count(), MODEL_COLUMN_WIDTH);
        assert!(fitted.ends_with("..."));
        assert_eq!(fit_name("short"), "short");
    }

    #[test]
    fn test_legend_lists_all_metrics() {
        let legend = ReportFormatter::legend();
        for metric in SummaryMetric::ALL {
            assert!(legend.contains(metric.label()));
        }
        assert!(legend.contains("Consensus-based Image Description Evaluation"));
    }

    #[test]
    fn test_render_json_round_trip_keeps_precision() {
        let r = report(&[("m", 3, &[("CIDEr", 0.987654321012)])]);
        let rendered = ReportFormatter::render(&r).unwrap();
        assert!(rendered.json.contains("0.987654321012"));
        assert!(rendered.table.contains("0.9877"));
        assert!(rendered.table.contains("Metric Explanation"));
        assert_eq!(ReportFormatter::from_json(&rendered.json).unwrap(), r);
    }

    #[test]
    fn test_csv_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        let r = report(&[
            ("a", 2, &[("CIDEr", 1.5)]),
            ("b", 3, &[("Bleu_4", 0.25)]),
        ]);
        ReportFormatter::write_csv_summary(&r, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "model,num_images,num_captions,Bleu_4,CIDEr");
        assert_eq!(lines[1], "a,2,2,,1.5");
        assert_eq!(lines[2], "b,3,3,0.25,");
    }
}
