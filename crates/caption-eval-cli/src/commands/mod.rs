//! Subcommand implementations.

pub mod align;
pub mod evaluate;
pub mod show;

use std::collections::BTreeSet;

use caption_eval::{PredictionLoader, PredictionSchema, RowPolicy};

use crate::InputArgs;

impl InputArgs {
    fn schema(&self) -> PredictionSchema {
        PredictionSchema::builder()
            .image_column(&self.image_col)
            .caption_column(&self.caption_col)
            .build()
    }

    fn row_policy(&self) -> RowPolicy {
        if self.skip_malformed {
            RowPolicy::SkipMalformed
        } else {
            RowPolicy::Strict
        }
    }

    fn loader(&self) -> PredictionLoader {
        PredictionLoader::new(self.schema()).row_policy(self.row_policy())
    }

    fn trace_set(&self) -> BTreeSet<i64> {
        self.trace_ids.iter().copied().collect()
    }
}
