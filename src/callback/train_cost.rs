//! Running average of the training cost

use std::collections::VecDeque;

use crate::store::{keys, SeriesHandle, TimeBase};
use crate::Result;

use super::traits::{Callback, CallbackContext};

/// Writes a sliding-window mean of the per-minibatch training cost to
/// `cost/train`, one slot per global minibatch tick.
#[derive(Clone, Debug)]
pub struct TrainCostCallback {
    /// Configured window size
    window: usize,
    /// Recent minibatch costs, oldest first
    history: VecDeque<f32>,
    series: Option<SeriesHandle>,
}

impl TrainCostCallback {
    /// Average over the last `window` minibatches.
    pub fn new(window: usize) -> Self {
        Self { window: window.max(1), history: VecDeque::new(), series: None }
    }

    /// Effective window size (capped at the run's minibatch count once started).
    pub fn window(&self) -> usize {
        self.window
    }

    fn push(&mut self, cost: f32) -> f32 {
        if self.history.len() == self.window {
            self.history.pop_front();
        }
        self.history.push_back(cost);
        self.history.iter().sum::<f32>() / self.history.len() as f32
    }
}

impl Default for TrainCostCallback {
    fn default() -> Self {
        Self::new(10)
    }
}

impl Callback for TrainCostCallback {
    fn on_train_begin(&mut self, ctx: &mut CallbackContext<'_>, _epochs: usize) -> Result<()> {
        let points = ctx.run.total_minibatches;
        self.series =
            Some(ctx.store.create_series(keys::TRAIN_COST, points, Some(TimeBase::Minibatch))?);
        self.window = self.window.min(points).max(1);
        self.history = VecDeque::with_capacity(self.window);
        Ok(())
    }

    fn on_minibatch_end(
        &mut self,
        ctx: &mut CallbackContext<'_>,
        epoch: usize,
        minibatch: usize,
    ) -> Result<()> {
        let Some(series) = self.series else {
            return Ok(());
        };
        let mean = self.push(ctx.model.cost());
        let tick = ctx.global_tick(epoch, minibatch)?;
        ctx.store.write(series, tick, mean)?;
        Ok(())
    }

    fn writes(&self) -> Vec<String> {
        vec![keys::TRAIN_COST.to_string()]
    }

    fn name(&self) -> &'static str {
        "TrainCostCallback"
    }
}
