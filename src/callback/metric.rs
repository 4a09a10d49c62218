//! Periodic evaluation of a user metric

use crate::frequency::Frequency;
use crate::model::{Dataset, Metric};
use crate::Result;

use super::traits::{Callback, CallbackContext};

/// Evaluates `metric` on an evaluation set every `epoch_freq` epochs and logs
/// the values. Nothing is written to the store.
pub struct MetricCallback {
    eval_set: Box<dyn Dataset>,
    metric: Box<dyn Metric>,
    frequency: Frequency,
    description: String,
    last: Option<Vec<f32>>,
}

impl MetricCallback {
    /// Evaluate `metric` on `eval_set` every `epoch_freq` epochs (minimum 1).
    pub fn new(eval_set: Box<dyn Dataset>, metric: Box<dyn Metric>, epoch_freq: usize) -> Self {
        let description = metric.names().join(", ");
        Self {
            eval_set,
            metric,
            frequency: Frequency::Every(epoch_freq.max(1)),
            description,
            last: None,
        }
    }

    /// Values from the most recent evaluation.
    pub fn last(&self) -> Option<&[f32]> {
        self.last.as_deref()
    }
}

impl Callback for MetricCallback {
    fn epoch_freq(&self) -> &Frequency {
        &self.frequency
    }

    fn on_epoch_end(&mut self, ctx: &mut CallbackContext<'_>, _epoch: usize) -> Result<()> {
        self.eval_set.reset();
        let stats = ctx.model.eval(self.eval_set.as_mut(), self.metric.as_mut())?;
        let values: Vec<String> = stats.iter().map(|v| v.to_string()).collect();
        ctx.info(&format!("{}: {}", self.description, values.join(", ")));
        self.last = Some(stats);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "MetricCallback"
    }
}
