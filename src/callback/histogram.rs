//! Weight histograms per layer

use crate::model::Histogrammer;
use crate::store::{keys, TimeBase};
use crate::Result;

use super::traits::{Callback, CallbackContext};

/// Collects a histogram of every weighted layer's weights, once per
/// minibatch or once per epoch.
///
/// Histograms go to `hist/<layer>_<index>_W`, a `(bins, time_steps)` matrix
/// with one column per tick. The `hist` group records `bins`, `offset`,
/// `time_markers` and `time_steps`.
pub struct HistCallback {
    per_minibatch: bool,
    histogrammer: Box<dyn Histogrammer>,
    time_steps: usize,
}

impl HistCallback {
    /// Collect per minibatch when `per_minibatch`, otherwise per epoch.
    pub fn new(per_minibatch: bool, histogrammer: Box<dyn Histogrammer>) -> Self {
        Self { per_minibatch, histogrammer, time_steps: 0 }
    }

    fn save_hist_data(&self, ctx: &mut CallbackContext<'_>, tick: usize) -> Result<()> {
        let hists: Vec<(String, Vec<f32>)> = ctx
            .model
            .layers()
            .into_iter()
            .enumerate()
            .filter_map(|(i, layer)| {
                let weights = layer.weights?;
                Some((format!("{}_{}_W", layer.name, i), self.histogrammer.histogram(weights)))
            })
            .collect();

        let shape = (self.histogrammer.bins(), self.time_steps);
        for (name, hist) in hists {
            let matrix = ctx.store.require_matrix(&format!("{}/{name}", keys::HIST), shape)?;
            ctx.store.write_column(matrix, tick, &hist)?;
        }
        Ok(())
    }
}

impl Callback for HistCallback {
    fn on_train_begin(&mut self, ctx: &mut CallbackContext<'_>, epochs: usize) -> Result<()> {
        let (time_base, steps) = if self.per_minibatch {
            (TimeBase::Minibatch, ctx.run.total_minibatches)
        } else {
            (TimeBase::Epoch, epochs)
        };
        self.time_steps = steps;

        ctx.store.create_group(keys::HIST)?;
        ctx.store.set_attr(keys::HIST, "bins", self.histogrammer.bins())?;
        ctx.store.set_attr(keys::HIST, "offset", self.histogrammer.offset())?;
        ctx.store.set_attr(keys::HIST, keys::TIME_MARKERS_ATTR, time_base)?;
        ctx.store.set_attr(keys::HIST, "time_steps", steps)?;
        Ok(())
    }

    fn on_minibatch_end(
        &mut self,
        ctx: &mut CallbackContext<'_>,
        epoch: usize,
        minibatch: usize,
    ) -> Result<()> {
        if self.per_minibatch {
            let tick = ctx.global_tick(epoch, minibatch)?;
            self.save_hist_data(ctx, tick)?;
        }
        Ok(())
    }

    fn on_epoch_end(&mut self, ctx: &mut CallbackContext<'_>, epoch: usize) -> Result<()> {
        if !self.per_minibatch {
            self.save_hist_data(ctx, epoch)?;
        }
        Ok(())
    }

    fn writes(&self) -> Vec<String> {
        vec![keys::HIST.to_string()]
    }

    fn name(&self) -> &'static str {
        "HistCallback"
    }
}
