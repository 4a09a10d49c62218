//! Test doubles shared by the callback unit tests

use ndarray::{Array2, ArrayViewD};
use serde_json::json;

use crate::model::{Batch, Dataset, Layer, Model};
use crate::sink::MemorySink;
use crate::store::{keys, MetricsStore, TimeBase};
use crate::{Error, Result};

use super::traits::{CallbackContext, RunInfo, TrainSetInfo};

/// Model whose minibatch cost is set by the test.
#[derive(Debug, Clone)]
pub(crate) struct MockModel {
    pub cost: f32,
    pub total_cost: f32,
    pub finished: bool,
    pub weights: Array2<f32>,
    pub loaded: Option<serde_json::Value>,
}

impl MockModel {
    pub fn new() -> Self {
        Self {
            cost: 0.0,
            total_cost: 0.0,
            finished: false,
            weights: Array2::from_shape_vec((2, 2), vec![0.5, -1.0, 2.0, 0.0]).unwrap(),
            loaded: None,
        }
    }
}

impl Model for MockModel {
    fn serialize(&self, keep_states: bool) -> Result<serde_json::Value> {
        Ok(json!({
            "weights": self.weights.iter().copied().collect::<Vec<f32>>(),
            "keep_states": keep_states,
            "cost": self.cost,
        }))
    }

    fn load_weights(&mut self, state: &serde_json::Value) -> Result<()> {
        if state.get("weights").is_none() {
            return Err(Error::Model("state has no weights".to_string()));
        }
        self.loaded = Some(state.clone());
        Ok(())
    }

    fn fprop(&mut self, inputs: &Array2<f32>, _inference: bool) -> Result<Array2<f32>> {
        Ok(inputs.clone())
    }

    fn cost_buffer(&mut self, outputs: &Array2<f32>, targets: &Array2<f32>) -> Result<Array2<f32>> {
        let diff = outputs - targets;
        let per_column = diff.mapv(|d| d * d).sum_axis(ndarray::Axis(0));
        Ok(per_column.insert_axis(ndarray::Axis(0)))
    }

    fn cost(&self) -> f32 {
        self.cost
    }

    fn total_cost(&self) -> f32 {
        self.total_cost
    }

    fn cost_name(&self) -> Option<String> {
        Some("SumSquared".to_string())
    }

    fn finished(&self) -> bool {
        self.finished
    }

    fn set_finished(&mut self, finished: bool) {
        self.finished = finished;
    }

    fn layers(&self) -> Vec<Layer<'_>> {
        let weights: ArrayViewD<'_, f32> = self.weights.view().into_dyn();
        vec![
            Layer { name: "Linear".to_string(), weights: Some(weights) },
            Layer { name: "Activation".to_string(), weights: None },
        ]
    }

    fn summary(&self) -> String {
        "MockModel(Linear 2x2, Activation)".to_string()
    }
}

/// In-memory dataset of precomputed batches.
#[derive(Debug, Clone)]
pub(crate) struct VecDataset {
    batches: Vec<Batch>,
    batch_size: usize,
    ndata: usize,
    cursor: usize,
}

impl VecDataset {
    /// `ndata` single-row examples in batches of `batch_size`; example `i`
    /// has input `i` and target `i + offset`.
    pub fn ramp(ndata: usize, batch_size: usize, offset: f32) -> Self {
        let mut batches = Vec::new();
        let mut start = 0;
        while start < ndata {
            let end = (start + batch_size).min(ndata);
            let inputs: Vec<f32> = (start..end).map(|i| i as f32).collect();
            let targets: Vec<f32> = inputs.iter().map(|x| x + offset).collect();
            let cols = inputs.len();
            batches.push(Batch::new(
                Array2::from_shape_vec((1, cols), inputs).unwrap(),
                Array2::from_shape_vec((1, cols), targets).unwrap(),
            ));
            start = end;
        }
        Self { batches, batch_size, ndata, cursor: 0 }
    }
}

impl Dataset for VecDataset {
    fn ndata(&self) -> usize {
        self.ndata
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }

    fn next_batch(&mut self) -> Option<Batch> {
        let batch = self.batches.get(self.cursor).cloned();
        self.cursor += 1;
        batch
    }
}

/// Everything a hook needs, owned in one place.
pub(crate) struct Harness {
    pub store: MetricsStore,
    pub model: MockModel,
    pub sink: MemorySink,
    pub train_set: TrainSetInfo,
    pub run: RunInfo,
    pub epoch_markers: Vec<Option<usize>>,
}

impl Harness {
    pub fn new(ndata: usize, batch_size: usize, epochs: usize) -> Self {
        let mut store = MetricsStore::in_memory();
        let train_set = TrainSetInfo {
            ndata,
            batch_size,
            nbatches: ndata.div_ceil(batch_size),
        };
        let markers = store
            .create_series(keys::MINIBATCH_MARKERS, epochs, Some(TimeBase::Epoch))
            .unwrap();
        let run = RunInfo {
            total_epochs: epochs,
            total_minibatches: train_set.total_minibatches(epochs),
            markers,
        };
        Self {
            store,
            model: MockModel::new(),
            sink: MemorySink::new(),
            train_set,
            run,
            epoch_markers: vec![None; epochs],
        }
    }

    pub fn ctx(&mut self) -> CallbackContext<'_> {
        CallbackContext {
            store: &mut self.store,
            model: &mut self.model,
            log: &mut self.sink,
            train_set: &self.train_set,
            run: &self.run,
            epoch_markers: &self.epoch_markers,
        }
    }

    /// Record the cumulative minibatch count at the end of `epoch`.
    pub fn mark_epoch(&mut self, epoch: usize, cumulative: usize) {
        self.store.write(self.run.markers, epoch, cumulative as f32).unwrap();
        self.epoch_markers[epoch] = Some(cumulative);
    }
}

/// Cloneable in-memory writer; clones share the same bytes.
#[derive(Clone, Debug, Default)]
pub(crate) struct SharedBuffer(std::rc::Rc<std::cell::RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl std::io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
