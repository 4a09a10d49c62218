//! Lookup of evaluation losses already written to the store
//!
//! Progress, logging, best-state and early-stop callbacks all report the
//! evaluation loss of the epoch that just ended. None of them evaluate the
//! model; they read the slot [`LossCallback`](super::LossCallback) wrote,
//! which is only present on epochs where that callback fired.

use crate::store::{keys, AttrValue, SeriesHandle};

use super::traits::CallbackContext;

/// Evaluation loss of one epoch, as recorded in the store.
#[derive(Clone, Debug, PartialEq)]
pub struct EpochLoss {
    /// Mean evaluation cost
    pub cost: f32,
    /// Seconds spent evaluating
    pub time: f32,
    /// Display name of the cost, e.g. "CrossEntropy Loss"
    pub cost_name: String,
}

#[derive(Clone, Copy, Debug)]
struct LossSeries {
    cost: SeriesHandle,
    time: SeriesHandle,
    epoch_freq: usize,
}

/// Reads cached epoch losses for one label, resolving the series handles and
/// the cost display name once.
#[derive(Clone, Debug)]
pub struct EpochLossLookup {
    label: String,
    series: Option<LossSeries>,
    cost_name: Option<String>,
}

impl EpochLossLookup {
    /// Lookup for the series written under `label` (usually `"loss"`).
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), series: None, cost_name: None }
    }

    /// Store path of the cost series this lookup reads.
    pub fn cost_key(&self) -> String {
        keys::cost(&self.label)
    }

    fn resolve(&mut self, ctx: &CallbackContext<'_>) -> Option<LossSeries> {
        if self.series.is_none() {
            let cost = ctx.store.series(&keys::cost(&self.label))?;
            let time = ctx.store.series(&keys::time(&self.label))?;
            let epoch_freq = ctx
                .store
                .series_attr(cost, keys::EPOCH_FREQ)
                .and_then(AttrValue::as_usize)
                .filter(|&f| f > 0)?;
            self.series = Some(LossSeries { cost, time, epoch_freq });
        }
        self.series
    }

    fn cost_name(&mut self, ctx: &CallbackContext<'_>) -> String {
        self.cost_name
            .get_or_insert_with(|| match ctx.model.cost_name() {
                Some(name) => format!("{name} Loss"),
                None => "Loss".to_string(),
            })
            .clone()
    }

    /// Loss recorded for `epoch`, or `None` when no loss series exists or
    /// `epoch` is not one of its evaluation epochs.
    pub fn get(&mut self, ctx: &CallbackContext<'_>, epoch: usize) -> Option<EpochLoss> {
        let series = self.resolve(ctx)?;
        if (epoch + 1) % series.epoch_freq != 0 {
            return None;
        }
        let slot = epoch / series.epoch_freq;
        let cost = ctx.store.read(series.cost, slot).ok().flatten()?;
        let time = ctx.store.read(series.time, slot).ok().flatten().unwrap_or(0.0);
        Some(EpochLoss { cost, time, cost_name: self.cost_name(ctx) })
    }
}
