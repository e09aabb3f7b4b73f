//! Alignment diagnostics for a single prediction file.

use std::path::Path;

use anyhow::{Context, Result};
use caption_eval::{Error, ReferenceSet, align};

use crate::InputArgs;

/// How many dropped-candidate images to list.
const MAX_LISTED: usize = 20;

pub fn run(input: &InputArgs, file: &Path) -> Result<()> {
    let references = ReferenceSet::load(&input.reference)
        .with_context(|| format!("Failed to load references from {}", input.reference.display()))?;
    let predictions = input
        .loader()
        .load(file)
        .with_context(|| format!("Failed to load predictions from {}", file.display()))?;

    let missing = predictions
        .ids()
        .filter(|id| !references.contains(*id))
        .count();

    println!("Model: {}", predictions.model_name);
    println!(
        "References: {} images, {} captions",
        references.len(),
        references.caption_count()
    );
    println!(
        "Predictions: {} images, {} captions",
        predictions.len(),
        predictions.caption_count()
    );
    println!("Predicted images without references: {}", missing);

    let batch = match align(&references, &predictions, &input.trace_set()) {
        Ok(batch) => batch,
        Err(Error::NoOverlap { .. }) => {
            println!("Aligned images: 0 (no common images, this model would be skipped)");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    println!("Aligned images: {}", batch.len());
    println!(
        "Dropped candidates: {} across {} images",
        batch.dropped_total(),
        batch.dropped.len()
    );

    if !batch.dropped.is_empty() {
        println!("{:-<60}", "");
        println!("{:<15} {:>10}  {}", "Image", "Dropped", "Selected hypothesis");
        for (image_id, dropped) in batch.dropped.iter().take(MAX_LISTED) {
            let selected = batch.get(*image_id).map_or("", |img| img.hypothesis.as_str());
            println!("{:<15} {:>10}  {}", image_id, dropped, selected);
        }
        if batch.dropped.len() > MAX_LISTED {
            println!("... and {} more images", batch.dropped.len() - MAX_LISTED);
        }
    }

    Ok(())
}
