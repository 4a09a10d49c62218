//! Text logging of training progress

use crate::frequency::Frequency;
use crate::store::{keys, SeriesHandle};
use crate::Result;

use super::cached_loss::EpochLossLookup;
use super::traits::{Callback, CallbackContext};

/// Logs the model summary at train begin, the smoothed train cost on
/// minibatch boundaries and the epoch cost (plus evaluation cost when
/// recorded) on epoch boundaries.
///
/// Defaults to every epoch and no minibatches.
#[derive(Clone, Debug)]
pub struct TrainLoggerCallback {
    epoch_freq: Frequency,
    minibatch_freq: Frequency,
    train_cost: Option<SeriesHandle>,
    lookup: EpochLossLookup,
}

impl TrainLoggerCallback {
    /// Create a logger with the default frequencies.
    pub fn new() -> Self {
        Self {
            epoch_freq: Frequency::Every(1),
            minibatch_freq: Frequency::Never,
            train_cost: None,
            lookup: EpochLossLookup::new("loss"),
        }
    }

    /// Set how often epoch lines are logged.
    pub fn with_epoch_freq(mut self, freq: impl Into<Frequency>) -> Self {
        self.epoch_freq = freq.into();
        self
    }

    /// Set how often minibatch lines are logged.
    pub fn with_minibatch_freq(mut self, freq: impl Into<Frequency>) -> Self {
        self.minibatch_freq = freq.into();
        self
    }
}

impl Default for TrainLoggerCallback {
    fn default() -> Self {
        Self::new()
    }
}

impl Callback for TrainLoggerCallback {
    fn epoch_freq(&self) -> &Frequency {
        &self.epoch_freq
    }

    fn minibatch_freq(&self) -> &Frequency {
        &self.minibatch_freq
    }

    fn on_train_begin(&mut self, ctx: &mut CallbackContext<'_>, _epochs: usize) -> Result<()> {
        let summary = ctx.model.summary();
        ctx.info(&format!("Model:\n{summary}"));
        Ok(())
    }

    fn on_minibatch_end(
        &mut self,
        ctx: &mut CallbackContext<'_>,
        epoch: usize,
        minibatch: usize,
    ) -> Result<()> {
        if self.train_cost.is_none() {
            self.train_cost = ctx.store.series(keys::TRAIN_COST);
        }
        let Some(series) = self.train_cost else {
            return Ok(());
        };
        let tick = ctx.global_tick(epoch, minibatch)?;
        if let Some(cost) = ctx.store.read(series, tick)? {
            ctx.info(&format!("Epoch {epoch} Minibatch {minibatch} complete. Train cost: {cost:.6}"));
        }
        Ok(())
    }

    fn on_epoch_end(&mut self, ctx: &mut CallbackContext<'_>, epoch: usize) -> Result<()> {
        let mut line =
            format!("Epoch {epoch} complete.  Train Cost {:.6}.", ctx.model.total_cost());
        if let Some(loss) = self.lookup.get(ctx, epoch) {
            line.push_str(&format!("  Eval Cost {:.6}", loss.cost));
        }
        ctx.info(&line);
        Ok(())
    }

    fn reads(&self) -> Vec<String> {
        vec![keys::TRAIN_COST.to_string(), self.lookup.cost_key()]
    }

    fn name(&self) -> &'static str {
        "TrainLoggerCallback"
    }
}
