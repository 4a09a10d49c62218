//! Save the model whenever the evaluation loss improves

use std::path::PathBuf;

use crate::io::save_state;
use crate::Result;

use super::cached_loss::EpochLossLookup;
use super::traits::{Callback, CallbackContext};

/// Writes the full model state to `path` each time the cached evaluation
/// loss is strictly lower than the best seen so far.
///
/// A NaN loss (an empty evaluation set, a diverged model) is skipped: it is
/// never saved and never becomes the best.
#[derive(Clone, Debug)]
pub struct SaveBestStateCallback {
    path: PathBuf,
    best_cost: Option<f32>,
    lookup: EpochLossLookup,
}

impl SaveBestStateCallback {
    /// Save best states to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), best_cost: None, lookup: EpochLossLookup::new("loss") }
    }

    /// Best evaluation cost saved so far.
    pub fn best_cost(&self) -> Option<f32> {
        self.best_cost
    }
}

impl Callback for SaveBestStateCallback {
    fn on_epoch_end(&mut self, ctx: &mut CallbackContext<'_>, epoch: usize) -> Result<()> {
        let Some(loss) = self.lookup.get(ctx, epoch).filter(|l| !l.cost.is_nan()) else {
            return Ok(());
        };
        let improved = match self.best_cost {
            Some(best) => loss.cost < best,
            None => true,
        };
        if improved {
            save_state(&ctx.model.serialize(true)?, &self.path)?;
            self.best_cost = Some(loss.cost);
        }
        Ok(())
    }

    fn reads(&self) -> Vec<String> {
        vec![self.lookup.cost_key()]
    }

    fn name(&self) -> &'static str {
        "SaveBestStateCallback"
    }
}
