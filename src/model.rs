//! Collaborator interfaces: model, dataset, metric, histogram backend
//!
//! The callbacks never see the numeric backend directly. Everything they
//! need from the model under training and from the evaluation data goes
//! through these traits.

use ndarray::{Array2, ArrayViewD};

use crate::Result;

/// One `(inputs, targets)` minibatch, examples laid out along columns.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub inputs: Array2<f32>,
    pub targets: Array2<f32>,
}

impl Batch {
    /// Create a new batch.
    pub fn new(inputs: Array2<f32>, targets: Array2<f32>) -> Self {
        Self { inputs, targets }
    }
}

/// Iterable dataset consumed batch by batch.
pub trait Dataset {
    /// Total number of examples.
    fn ndata(&self) -> usize;

    /// Examples per batch.
    fn batch_size(&self) -> usize;

    /// Batches in one pass.
    fn nbatches(&self) -> usize {
        let bsz = self.batch_size();
        if bsz == 0 {
            0
        } else {
            self.ndata().div_ceil(bsz)
        }
    }

    /// Rewind to the first batch.
    fn reset(&mut self);

    /// Next batch of the current pass, `None` when the pass is over.
    fn next_batch(&mut self) -> Option<Batch>;
}

/// Evaluation metric producing one or more named values.
pub trait Metric {
    /// Names of the values returned by [`compute`](Metric::compute).
    fn names(&self) -> Vec<String>;

    /// Metric values for one batch.
    fn compute(&mut self, outputs: &Array2<f32>, targets: &Array2<f32>) -> Vec<f32>;
}

/// A model layer as seen by the histogram collector.
#[derive(Debug)]
pub struct Layer<'a> {
    pub name: String,
    /// Weight tensor, `None` for layers without weights.
    pub weights: Option<ArrayViewD<'a, f32>>,
}

/// The model under training.
pub trait Model {
    /// Serialized model state; `keep_states` includes optimizer/training state.
    fn serialize(&self, keep_states: bool) -> Result<serde_json::Value>;

    /// Restore weights from a previously serialized state.
    fn load_weights(&mut self, state: &serde_json::Value) -> Result<()>;

    /// Forward pass.
    fn fprop(&mut self, inputs: &Array2<f32>, inference: bool) -> Result<Array2<f32>>;

    /// Per-column cost buffer for `outputs` against `targets`.
    fn cost_buffer(&mut self, outputs: &Array2<f32>, targets: &Array2<f32>) -> Result<Array2<f32>>;

    /// Cost of the most recent training minibatch.
    fn cost(&self) -> f32;

    /// Accumulated training cost of the current epoch.
    fn total_cost(&self) -> f32;

    /// Name of the cost function, if known.
    fn cost_name(&self) -> Option<String> {
        None
    }

    /// Whether training has been asked to stop.
    fn finished(&self) -> bool;

    /// Set the terminal flag.
    fn set_finished(&mut self, finished: bool);

    /// Layers in forward order.
    fn layers(&self) -> Vec<Layer<'_>> {
        Vec::new()
    }

    /// Human-readable structural summary.
    fn summary(&self) -> String;

    /// Run `metric` over a full pass of `dataset` and average per batch.
    fn eval(&mut self, dataset: &mut dyn Dataset, metric: &mut dyn Metric) -> Result<Vec<f32>> {
        let mut totals = vec![0.0f32; metric.names().len()];
        let mut batches = 0usize;
        while let Some(batch) = dataset.next_batch() {
            let outputs = self.fprop(&batch.inputs, true)?;
            for (total, value) in totals.iter_mut().zip(metric.compute(&outputs, &batch.targets)) {
                *total += value;
            }
            batches += 1;
        }
        if batches > 0 {
            for total in &mut totals {
                *total /= batches as f32;
            }
        }
        Ok(totals)
    }
}

/// Numeric backend that bins a weight tensor into a histogram.
pub trait Histogrammer {
    /// Number of bins per histogram.
    fn bins(&self) -> usize;

    /// Exponent of the lowest bin.
    fn offset(&self) -> i32;

    /// Histogram of `weights`, `bins()` entries long.
    fn histogram(&self, weights: ArrayViewD<'_, f32>) -> Vec<f32>;
}

/// Base-2 magnitude histogram: bin `i` counts values with
/// `floor(log2(|w|)) == i + offset`, clamped to the bin range.
/// Exact zeros land in bin 0.
#[derive(Clone, Copy, Debug)]
pub struct Log2Histogrammer {
    bins: usize,
    offset: i32,
}

impl Log2Histogrammer {
    /// Create a histogrammer with `bins` bins starting at exponent `offset`.
    pub fn new(bins: usize, offset: i32) -> Self {
        Self { bins: bins.max(1), offset }
    }
}

impl Default for Log2Histogrammer {
    fn default() -> Self {
        Self::new(64, -48)
    }
}

impl Histogrammer for Log2Histogrammer {
    fn bins(&self) -> usize {
        self.bins
    }

    fn offset(&self) -> i32 {
        self.offset
    }

    fn histogram(&self, weights: ArrayViewD<'_, f32>) -> Vec<f32> {
        let mut hist = vec![0.0f32; self.bins];
        let last = self.bins as i64 - 1;
        for &w in weights.iter() {
            let bin = if w == 0.0 || !w.is_finite() {
                0
            } else {
                (i64::from(w.abs().log2().floor() as i32) - i64::from(self.offset)).clamp(0, last)
            };
            hist[bin as usize] += 1.0;
        }
        hist
    }
}
