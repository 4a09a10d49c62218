//! Periodic evaluation loss

use std::time::Instant;

use ndarray::s;

use crate::model::Dataset;
use crate::store::{keys, SeriesHandle, TimeBase};
use crate::Result;

use super::traits::{Callback, CallbackContext};
use crate::frequency::Frequency;

/// Computes the mean loss over an evaluation set every `epoch_freq` epochs
/// and writes it, with the wall time of the pass, to `cost/loss` and
/// `time/loss` at slot `epoch / epoch_freq`.
///
/// Register it ahead of any callback that reports the evaluation loss so the
/// value is in the store when they read it.
pub struct LossCallback {
    eval_set: Box<dyn Dataset>,
    epoch_freq: usize,
    frequency: Frequency,
    label: String,
    series: Option<(SeriesHandle, SeriesHandle)>,
}

impl LossCallback {
    /// Evaluate `eval_set` every `epoch_freq` epochs (minimum 1).
    pub fn new(eval_set: Box<dyn Dataset>, epoch_freq: usize) -> Self {
        let epoch_freq = epoch_freq.max(1);
        Self {
            eval_set,
            epoch_freq,
            frequency: Frequency::Every(epoch_freq),
            label: "loss".to_string(),
            series: None,
        }
    }

    /// Number of slots allocated for a run of `epochs` epochs.
    pub fn slots(&self, epochs: usize) -> usize {
        epochs.div_ceil(self.epoch_freq)
    }

    /// Mean cost over one full pass of the evaluation set.
    fn evaluate(&mut self, ctx: &mut CallbackContext<'_>) -> Result<f32> {
        let ndata = self.eval_set.ndata();
        let batch_size = self.eval_set.batch_size().max(1);
        let mut loss = 0.0f32;
        let mut nprocessed = 0usize;

        self.eval_set.reset();
        while let Some(batch) = self.eval_set.next_batch() {
            let outputs = ctx.model.fprop(&batch.inputs, true)?;
            let bsz = ndata.saturating_sub(nprocessed).min(batch_size);
            let costs = ctx.model.cost_buffer(&outputs, &batch.targets)?;
            // recurrent outputs stack several time steps of the batch along columns
            let nsteps = (outputs.ncols() / batch_size).max(1);
            let cols = (bsz * nsteps).min(costs.ncols());
            loss += costs.slice(s![.., ..cols]).sum() / nsteps as f32;
            nprocessed += bsz;
        }

        if nprocessed == 0 {
            ctx.warn("Evaluation set produced no examples; recording NaN loss");
            return Ok(f32::NAN);
        }
        Ok(loss / nprocessed as f32)
    }
}

impl Callback for LossCallback {
    fn epoch_freq(&self) -> &Frequency {
        &self.frequency
    }

    fn on_train_begin(&mut self, ctx: &mut CallbackContext<'_>, epochs: usize) -> Result<()> {
        let slots = self.slots(epochs);
        let cost = ctx.store.create_series(
            &keys::cost(&self.label),
            slots,
            Some(TimeBase::EpochFreq),
        )?;
        let time = ctx.store.create_series(
            &keys::time(&self.label),
            slots,
            Some(TimeBase::EpochFreq),
        )?;
        ctx.store.set_series_attr(cost, keys::EPOCH_FREQ, self.epoch_freq)?;
        self.series = Some((cost, time));
        Ok(())
    }

    fn on_epoch_end(&mut self, ctx: &mut CallbackContext<'_>, epoch: usize) -> Result<()> {
        let Some((cost, time)) = self.series else {
            return Ok(());
        };
        let start = Instant::now();
        let mean_cost = self.evaluate(ctx)?;
        let elapsed = start.elapsed().as_secs_f32();

        let slot = epoch / self.epoch_freq;
        ctx.store.write(time, slot, elapsed)?;
        ctx.store.write(cost, slot, mean_cost)?;
        Ok(())
    }

    fn writes(&self) -> Vec<String> {
        vec![keys::cost(&self.label), keys::time(&self.label)]
    }

    fn name(&self) -> &'static str {
        "LossCallback"
    }
}
