//! Callback manager for dispatching events to multiple callbacks

use std::path::PathBuf;

use crate::config::CallbackConfig;
use crate::io::load_state;
use crate::model::{Dataset, Histogrammer, Metric, Model};
use crate::sink::{Level, LogSink};
use crate::store::{keys, MetricsStore, TimeBase};
use crate::{Error, Result};

use super::best_state::SaveBestStateCallback;
use super::checkpoint::SerializeModelCallback;
use super::early_stopping::EarlyStopCallback;
use super::histogram::HistCallback;
use super::logger::TrainLoggerCallback;
use super::loss::LossCallback;
use super::metric::MetricCallback;
use super::progress::ProgressBarCallback;
use super::train_cost::TrainCostCallback;
use super::traits::{Callback, CallbackContext, RunInfo, TrainSetInfo};

/// Owns the callbacks and the metrics store of one training run and
/// dispatches lifecycle events to them in registration order.
///
/// The training loop drives it:
///
/// ```text
/// on_train_begin
///   repeat { on_epoch_begin
///            repeat { on_minibatch_begin, on_minibatch_end }
///            on_epoch_end }
/// on_train_end
/// ```
///
/// Epoch hooks fire when the callback's [`epoch_freq`](Callback::epoch_freq)
/// matches the epoch index, minibatch hooks when its
/// [`minibatch_freq`](Callback::minibatch_freq) matches the minibatch index.
/// The first error returned by a hook aborts the event.
pub struct CallbackManager {
    callbacks: Vec<Box<dyn Callback>>,
    store: MetricsStore,
    log: Box<dyn LogSink>,
    train_set: TrainSetInfo,
    run: Option<RunInfo>,
    epoch_marker: usize,
    epoch_markers: Vec<Option<usize>>,
    epoch_minibatches: usize,
}

impl CallbackManager {
    /// Create an empty manager around `store`.
    pub fn new(store: MetricsStore, train_set: TrainSetInfo, log: Box<dyn LogSink>) -> Self {
        Self {
            callbacks: Vec::new(),
            store,
            log,
            train_set,
            run: None,
            epoch_marker: 0,
            epoch_markers: Vec::new(),
            epoch_minibatches: 0,
        }
    }

    /// Create a manager with the default callbacks for `config`.
    ///
    /// Registration order: evaluation loss (when `eval_freq` is set without a
    /// metric), train cost, progress bar, metric (when given), checkpoint
    /// writer, train logger.
    ///
    /// # Errors
    ///
    /// [`Error::ConfigError`] when `eval_freq` is set without an evaluation
    /// set, or when the checkpoint schedule for `epochs` and `serialize` is
    /// empty. IO and model errors from creating the store or loading
    /// `model_file` are propagated.
    pub fn with_defaults(
        config: &CallbackConfig,
        model: &mut dyn Model,
        train_set: &dyn Dataset,
        eval_set: Option<Box<dyn Dataset>>,
        metric: Option<Box<dyn Metric>>,
        mut log: Box<dyn LogSink>,
    ) -> Result<Self> {
        config.validate()?;

        let store = match &config.output_file {
            Some(path) => {
                if path.is_file() {
                    log.log(Level::WARN, &format!("Overwriting output file {}", path.display()));
                    std::fs::remove_file(path).map_err(|e| {
                        Error::io(format!("removing old output file {}", path.display()), e)
                    })?;
                }
                MetricsStore::create(path)?
            }
            None => MetricsStore::in_memory(),
        };

        if let Some(model_file) = &config.model_file {
            let state = load_state(model_file)?;
            model.load_weights(&state)?;
        }

        let mut manager = Self::new(store, TrainSetInfo::from_dataset(train_set), log);
        manager.add(TrainCostCallback::new(config.cost_window));

        if config.progress_bar {
            manager.add(ProgressBarCallback::new(config.progress_update_secs as f32));
        }

        if let Some(eval_freq) = config.eval_freq {
            let Some(eval_set) = eval_set else {
                return Err(Error::ConfigError(
                    "Evaluation frequency specified but no eval set provided".to_string(),
                ));
            };
            match metric {
                Some(metric) => manager.add(MetricCallback::new(eval_set, metric, eval_freq)),
                // loss goes first so later callbacks see it in the same epoch end
                None => manager.add_at(LossCallback::new(eval_set, eval_freq), 0),
            }
        }

        if let Some(save_path) = &config.save_path {
            match config.epochs {
                Some(epochs) => {
                    let interval = config.serialize_interval();
                    let schedule = SerializeModelCallback::schedule(epochs, interval);
                    if schedule.is_never() {
                        return Err(Error::ConfigError(format!(
                            "For {epochs} epochs and schedule {}, model will not be serialized",
                            config.serialize
                        )));
                    }
                    manager.add(SerializeModelCallback::new(save_path, schedule, config.history));
                }
                None => manager.log.log(
                    Level::WARN,
                    &format!(
                        "No epoch count given; not checkpointing to {}",
                        save_path.display()
                    ),
                ),
            }
        }

        manager.add(TrainLoggerCallback::new());
        Ok(manager)
    }

    /// Append a callback.
    pub fn add<C: Callback + 'static>(&mut self, callback: C) {
        self.callbacks.push(Box::new(callback));
    }

    /// Insert a callback at `position` (clamped to the current length).
    ///
    /// Callbacks run in order and share the store, so a callback that reads
    /// a value must come after the one that writes it.
    pub fn add_at<C: Callback + 'static>(&mut self, callback: C, position: usize) {
        let position = position.min(self.callbacks.len());
        self.callbacks.insert(position, Box::new(callback));
    }

    /// Append a callback saving the model whenever the evaluation loss improves.
    pub fn add_save_best_state_callback(&mut self, path: impl Into<PathBuf>) {
        self.add(SaveBestStateCallback::new(path));
    }

    /// Append an early stopping callback driven by `stop_fn`.
    pub fn add_early_stop_callback<S, F>(&mut self, stop_fn: F)
    where
        S: 'static,
        F: FnMut(Option<S>, f32) -> (S, bool) + 'static,
    {
        self.add(EarlyStopCallback::new(stop_fn));
    }

    /// Append a weight histogram callback.
    pub fn add_hist_callback(&mut self, per_minibatch: bool, histogrammer: Box<dyn Histogrammer>) {
        self.add(HistCallback::new(per_minibatch, histogrammer));
    }

    /// Check if no callbacks are registered
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Get number of callbacks
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Names of the registered callbacks, in dispatch order.
    pub fn callback_names(&self) -> Vec<&'static str> {
        self.callbacks.iter().map(|cb| cb.name()).collect()
    }

    /// The metrics store.
    pub fn store(&self) -> &MetricsStore {
        &self.store
    }

    /// Run-wide sizes, available after `on_train_begin`.
    pub fn run_info(&self) -> Option<RunInfo> {
        self.run
    }

    /// Reject registrations where a callback reads a store key that is only
    /// written by a callback registered after it.
    fn check_order(&self) -> Result<()> {
        let writes: Vec<Vec<String>> = self.callbacks.iter().map(|cb| cb.writes()).collect();
        for (i, reader) in self.callbacks.iter().enumerate() {
            for key in reader.reads() {
                let first_writer = writes.iter().position(|w| w.contains(&key));
                if let Some(j) = first_writer.filter(|&j| j > i) {
                    return Err(Error::ConfigError(format!(
                        "{} reads '{key}' but is registered before its writer {}",
                        reader.name(),
                        self.callbacks[j].name()
                    )));
                }
            }
        }
        Ok(())
    }

    fn dispatch<F>(&mut self, model: &mut dyn Model, mut fire: F) -> Result<()>
    where
        F: FnMut(&mut dyn Callback, &mut CallbackContext<'_>) -> Result<()>,
    {
        let run = self.run.ok_or(Error::NotStarted)?;
        let mut ctx = CallbackContext {
            store: &mut self.store,
            model,
            log: self.log.as_mut(),
            train_set: &self.train_set,
            run: &run,
            epoch_markers: &self.epoch_markers,
        };
        for cb in &mut self.callbacks {
            fire(cb.as_mut(), &mut ctx)?;
        }
        Ok(())
    }

    /// Fire train begin event
    ///
    /// Records the run sizes under `config`, allocates the per-epoch
    /// minibatch markers and calls every callback.
    pub fn on_train_begin(&mut self, model: &mut dyn Model, epochs: usize) -> Result<()> {
        self.check_order()?;

        let total_minibatches = self.train_set.total_minibatches(epochs);
        self.store.set_attr(keys::CONFIG, keys::TOTAL_MINIBATCHES, total_minibatches)?;
        self.store.set_attr(keys::CONFIG, keys::TOTAL_EPOCHS, epochs)?;
        self.store.create_group(keys::TIME_MARKERS)?;
        let markers =
            self.store.create_series(keys::MINIBATCH_MARKERS, epochs, Some(TimeBase::Epoch))?;

        self.run = Some(RunInfo { total_epochs: epochs, total_minibatches, markers });
        self.epoch_marker = 0;
        self.epoch_markers = vec![None; epochs];
        self.epoch_minibatches = 0;

        self.dispatch(model, |cb, ctx| cb.on_train_begin(ctx, epochs))
    }

    /// Fire train end event, then close the store.
    pub fn on_train_end(&mut self, model: &mut dyn Model) -> Result<()> {
        self.dispatch(model, |cb, ctx| cb.on_train_end(ctx))?;
        self.store.close()?;
        Ok(())
    }

    /// Fire epoch begin event
    pub fn on_epoch_begin(&mut self, model: &mut dyn Model, epoch: usize) -> Result<()> {
        self.epoch_minibatches = 0;
        self.dispatch(model, |cb, ctx| {
            if cb.epoch_freq().should_fire(epoch) {
                cb.on_epoch_begin(ctx, epoch)?;
            }
            Ok(())
        })
    }

    /// Fire epoch end event
    ///
    /// After the callbacks run, records the cumulative minibatch count for
    /// `epoch` and flushes the store.
    pub fn on_epoch_end(&mut self, model: &mut dyn Model, epoch: usize) -> Result<()> {
        self.dispatch(model, |cb, ctx| {
            if cb.epoch_freq().should_fire(epoch) {
                cb.on_epoch_end(ctx, epoch)?;
            }
            Ok(())
        })?;

        let run = self.run.ok_or(Error::NotStarted)?;
        self.epoch_marker += self.epoch_minibatches;
        // The f32 series is the persisted view; offsets come from the exact counts.
        self.store.write(run.markers, epoch, self.epoch_marker as f32)?;
        if let Some(slot) = self.epoch_markers.get_mut(epoch) {
            *slot = Some(self.epoch_marker);
        }
        self.store.set_attr(keys::TIME_MARKERS, keys::EPOCHS_COMPLETE, epoch + 1)?;
        self.store.set_attr(keys::TIME_MARKERS, keys::MINIBATCHES_COMPLETE, self.epoch_marker)?;
        self.store.flush()?;
        Ok(())
    }

    /// Fire minibatch begin event
    pub fn on_minibatch_begin(
        &mut self,
        model: &mut dyn Model,
        epoch: usize,
        minibatch: usize,
    ) -> Result<()> {
        self.dispatch(model, |cb, ctx| {
            if cb.minibatch_freq().should_fire(minibatch) {
                cb.on_minibatch_begin(ctx, epoch, minibatch)?;
            }
            Ok(())
        })
    }

    /// Fire minibatch end event
    pub fn on_minibatch_end(
        &mut self,
        model: &mut dyn Model,
        epoch: usize,
        minibatch: usize,
    ) -> Result<()> {
        self.dispatch(model, |cb, ctx| {
            if cb.minibatch_freq().should_fire(minibatch) {
                cb.on_minibatch_end(ctx, epoch, minibatch)?;
            }
            Ok(())
        })?;
        // minibatches per epoch vary; the last one seen closes the epoch
        self.epoch_minibatches = minibatch + 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::stop_fn;
    use crate::callback::testing::{MockModel, VecDataset};
    use crate::frequency::Frequency;
    use crate::sink::MemorySink;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records every hook it receives.
    struct Recorder {
        tag: &'static str,
        events: Rc<RefCell<Vec<String>>>,
        epoch_freq: Frequency,
        minibatch_freq: Frequency,
        reads: Vec<String>,
        writes: Vec<String>,
    }

    impl Recorder {
        fn new(tag: &'static str, events: &Rc<RefCell<Vec<String>>>) -> Self {
            Self {
                tag,
                events: Rc::clone(events),
                epoch_freq: Frequency::Every(1),
                minibatch_freq: Frequency::Every(1),
                reads: Vec::new(),
                writes: Vec::new(),
            }
        }

        fn push(&self, event: String) {
            self.events.borrow_mut().push(format!("{}:{event}", self.tag));
        }
    }

    impl Callback for Recorder {
        fn epoch_freq(&self) -> &Frequency {
            &self.epoch_freq
        }
        fn minibatch_freq(&self) -> &Frequency {
            &self.minibatch_freq
        }
        fn on_train_begin(&mut self, _: &mut CallbackContext<'_>, epochs: usize) -> Result<()> {
            self.push(format!("train_begin({epochs})"));
            Ok(())
        }
        fn on_train_end(&mut self, _: &mut CallbackContext<'_>) -> Result<()> {
            self.push("train_end".to_string());
            Ok(())
        }
        fn on_epoch_begin(&mut self, _: &mut CallbackContext<'_>, epoch: usize) -> Result<()> {
            self.push(format!("epoch_begin({epoch})"));
            Ok(())
        }
        fn on_epoch_end(&mut self, _: &mut CallbackContext<'_>, epoch: usize) -> Result<()> {
            self.push(format!("epoch_end({epoch})"));
            Ok(())
        }
        fn on_minibatch_end(
            &mut self,
            ctx: &mut CallbackContext<'_>,
            epoch: usize,
            minibatch: usize,
        ) -> Result<()> {
            let tick = ctx.global_tick(epoch, minibatch)?;
            self.push(format!("mb_end({epoch},{minibatch})@{tick}"));
            Ok(())
        }
        fn reads(&self) -> Vec<String> {
            self.reads.clone()
        }
        fn writes(&self) -> Vec<String> {
            self.writes.clone()
        }
        fn name(&self) -> &'static str {
            self.tag
        }
    }

    fn info(ndata: usize, batch_size: usize) -> TrainSetInfo {
        TrainSetInfo { ndata, batch_size, nbatches: ndata.div_ceil(batch_size) }
    }

    fn quiet_config() -> CallbackConfig {
        CallbackConfig::new().with_progress_bar(false)
    }

    #[test]
    fn test_callback_manager_len_and_empty() {
        let mut manager =
            CallbackManager::new(MetricsStore::in_memory(), info(4, 2), Box::new(MemorySink::new()));
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);

        manager.add(TrainLoggerCallback::new());
        assert!(!manager.is_empty());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut manager =
            CallbackManager::new(MetricsStore::in_memory(), info(4, 2), Box::new(MemorySink::new()));
        manager.add(Recorder::new("a", &events));
        manager.add(Recorder::new("b", &events));
        manager.add_at(Recorder::new("first", &events), 0);
        let mut model = MockModel::new();

        manager.on_train_begin(&mut model, 1).unwrap();
        assert_eq!(
            *events.borrow(),
            vec!["first:train_begin(1)", "a:train_begin(1)", "b:train_begin(1)"]
        );
        assert_eq!(manager.callback_names(), vec!["first", "a", "b"]);
    }

    #[test]
    fn test_add_at_clamps_position() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut manager =
            CallbackManager::new(MetricsStore::in_memory(), info(4, 2), Box::new(MemorySink::new()));
        manager.add(Recorder::new("a", &events));
        manager.add_at(Recorder::new("last", &events), 10);
        assert_eq!(manager.callback_names(), vec!["a", "last"]);
    }

    #[test]
    fn test_events_before_train_begin_fail() {
        let mut manager =
            CallbackManager::new(MetricsStore::in_memory(), info(4, 2), Box::new(MemorySink::new()));
        let mut model = MockModel::new();
        assert!(matches!(manager.on_epoch_begin(&mut model, 0), Err(Error::NotStarted)));
    }

    #[test]
    fn test_frequencies_gate_hooks() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut manager =
            CallbackManager::new(MetricsStore::in_memory(), info(4, 1), Box::new(MemorySink::new()));
        let mut rec = Recorder::new("r", &events);
        rec.epoch_freq = Frequency::at([1]);
        rec.minibatch_freq = Frequency::Every(2);
        manager.add(rec);
        let mut model = MockModel::new();

        manager.on_train_begin(&mut model, 2).unwrap();
        for epoch in 0..2 {
            manager.on_epoch_begin(&mut model, epoch).unwrap();
            for mb in 0..4 {
                manager.on_minibatch_begin(&mut model, epoch, mb).unwrap();
                manager.on_minibatch_end(&mut model, epoch, mb).unwrap();
            }
            manager.on_epoch_end(&mut model, epoch).unwrap();
        }

        assert_eq!(
            *events.borrow(),
            vec![
                "r:train_begin(2)",
                "r:mb_end(0,1)@1",
                "r:mb_end(0,3)@3",
                "r:epoch_begin(1)",
                "r:mb_end(1,1)@5",
                "r:mb_end(1,3)@7",
                "r:epoch_end(1)",
            ]
        );
    }

    #[test]
    fn test_train_begin_bookkeeping() {
        let mut manager =
            CallbackManager::new(MetricsStore::in_memory(), info(10, 4), Box::new(MemorySink::new()));
        let mut model = MockModel::new();
        manager.on_train_begin(&mut model, 3).unwrap();

        let store = manager.store();
        assert_eq!(store.attr("config", "total_minibatches").and_then(|a| a.as_usize()), Some(8));
        assert_eq!(store.attr("config", "total_epochs").and_then(|a| a.as_usize()), Some(3));
        let markers = store.series("time_markers/minibatch").unwrap();
        assert_eq!(store.series_len(markers), 3);
        assert_eq!(manager.run_info().map(|r| r.total_minibatches), Some(8));
    }

    #[test]
    fn test_epoch_end_records_markers() {
        let mut manager =
            CallbackManager::new(MetricsStore::in_memory(), info(5, 2), Box::new(MemorySink::new()));
        let mut model = MockModel::new();
        manager.on_train_begin(&mut model, 2).unwrap();

        // epoch 0 has 3 minibatches, epoch 1 has 2
        for (epoch, nb) in [(0, 3), (1, 2)] {
            manager.on_epoch_begin(&mut model, epoch).unwrap();
            for mb in 0..nb {
                manager.on_minibatch_end(&mut model, epoch, mb).unwrap();
            }
            manager.on_epoch_end(&mut model, epoch).unwrap();
        }

        let store = manager.store();
        let markers = store.series("time_markers/minibatch").unwrap();
        assert_eq!(store.values(markers).to_vec(), vec![Some(3.0), Some(5.0)]);
        assert_eq!(store.attr("time_markers", "epochs_complete").and_then(|a| a.as_usize()), Some(2));
        assert_eq!(
            store.attr("time_markers", "minibatches_complete").and_then(|a| a.as_usize()),
            Some(5)
        );
    }

    #[test]
    fn test_offsets_stay_exact_past_f32_precision() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut manager =
            CallbackManager::new(MetricsStore::in_memory(), info(4, 1), Box::new(MemorySink::new()));
        manager.add(Recorder::new("r", &events));
        let mut model = MockModel::new();
        manager.on_train_begin(&mut model, 2).unwrap();

        // 2^24 + 1 is the first count an f32 cannot hold.
        manager.on_epoch_begin(&mut model, 0).unwrap();
        manager.epoch_minibatches = 16_777_217;
        manager.on_epoch_end(&mut model, 0).unwrap();
        manager.on_epoch_begin(&mut model, 1).unwrap();
        manager.on_minibatch_end(&mut model, 1, 0).unwrap();

        assert_eq!(events.borrow().last().map(String::as_str), Some("r:mb_end(1,0)@16777217"));
        assert_eq!(
            manager.store().attr("time_markers", "minibatches_complete").and_then(|a| a.as_usize()),
            Some(16_777_217)
        );
    }

    #[test]
    fn test_train_end_closes_store() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut manager =
            CallbackManager::new(MetricsStore::in_memory(), info(4, 2), Box::new(MemorySink::new()));
        manager.add(Recorder::new("r", &events));
        let mut model = MockModel::new();
        manager.on_train_begin(&mut model, 1).unwrap();
        manager.on_train_end(&mut model).unwrap();

        assert!(manager.store().is_closed());
        assert_eq!(events.borrow().last().map(String::as_str), Some("r:train_end"));
    }

    #[test]
    fn test_hook_error_aborts_event() {
        struct Failing;
        impl Callback for Failing {
            fn on_epoch_end(&mut self, _: &mut CallbackContext<'_>, _: usize) -> Result<()> {
                Err(Error::Model("boom".to_string()))
            }
        }

        let events = Rc::new(RefCell::new(Vec::new()));
        let mut manager =
            CallbackManager::new(MetricsStore::in_memory(), info(4, 2), Box::new(MemorySink::new()));
        manager.add(Failing);
        manager.add(Recorder::new("after", &events));
        let mut model = MockModel::new();
        manager.on_train_begin(&mut model, 1).unwrap();
        events.borrow_mut().clear();

        assert!(matches!(manager.on_epoch_end(&mut model, 0), Err(Error::Model(_))));
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn test_reader_before_writer_rejected() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut manager =
            CallbackManager::new(MetricsStore::in_memory(), info(4, 2), Box::new(MemorySink::new()));
        let mut reader = Recorder::new("reader", &events);
        reader.reads = vec!["cost/loss".to_string()];
        let mut writer = Recorder::new("writer", &events);
        writer.writes = vec!["cost/loss".to_string()];
        manager.add(reader);
        manager.add(writer);
        let mut model = MockModel::new();

        let err = manager.on_train_begin(&mut model, 1).unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("reader reads 'cost/loss'"));
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn test_reader_without_writer_allowed() {
        let mut manager =
            CallbackManager::new(MetricsStore::in_memory(), info(4, 2), Box::new(MemorySink::new()));
        manager.add_save_best_state_callback("best.json");
        manager.add_early_stop_callback(stop_fn::threshold(0.1));
        let mut model = MockModel::new();
        assert!(manager.on_train_begin(&mut model, 1).is_ok());
    }

    #[test]
    fn test_defaults_order_with_loss() {
        let dir = tempfile::tempdir().unwrap();
        let config = CallbackConfig::new()
            .with_eval_freq(1)
            .with_epochs(2)
            .with_save_path(dir.path().join("model.json"));
        let mut model = MockModel::new();
        let manager = CallbackManager::with_defaults(
            &config,
            &mut model,
            &VecDataset::ramp(4, 2, 0.0),
            Some(Box::new(VecDataset::ramp(2, 2, 1.0))),
            None,
            Box::new(MemorySink::new()),
        )
        .unwrap();

        assert_eq!(
            manager.callback_names(),
            vec![
                "LossCallback",
                "TrainCostCallback",
                "ProgressBarCallback",
                "SerializeModelCallback",
                "TrainLoggerCallback",
            ]
        );
    }

    #[test]
    fn test_defaults_metric_is_appended() {
        struct Zero;
        impl Metric for Zero {
            fn names(&self) -> Vec<String> {
                vec!["zero".to_string()]
            }
            fn compute(
                &mut self,
                _: &ndarray::Array2<f32>,
                _: &ndarray::Array2<f32>,
            ) -> Vec<f32> {
                vec![0.0]
            }
        }

        let config = quiet_config().with_eval_freq(2);
        let mut model = MockModel::new();
        let manager = CallbackManager::with_defaults(
            &config,
            &mut model,
            &VecDataset::ramp(4, 2, 0.0),
            Some(Box::new(VecDataset::ramp(2, 2, 1.0))),
            Some(Box::new(Zero)),
            Box::new(MemorySink::new()),
        )
        .unwrap();

        assert_eq!(
            manager.callback_names(),
            vec!["TrainCostCallback", "MetricCallback", "TrainLoggerCallback"]
        );
    }

    #[test]
    fn test_defaults_eval_freq_without_eval_set() {
        let config = quiet_config().with_eval_freq(1);
        let mut model = MockModel::new();
        let err = CallbackManager::with_defaults(
            &config,
            &mut model,
            &VecDataset::ramp(4, 2, 0.0),
            None,
            None,
            Box::new(MemorySink::new()),
        )
        .err()
        .unwrap();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_defaults_empty_checkpoint_schedule() {
        let config = quiet_config().with_epochs(0).with_save_path("model.json").with_serialize(3);
        let mut model = MockModel::new();
        let err = CallbackManager::with_defaults(
            &config,
            &mut model,
            &VecDataset::ramp(4, 2, 0.0),
            None,
            None,
            Box::new(MemorySink::new()),
        )
        .err()
        .unwrap();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("For 0 epochs and schedule 3"));
    }

    #[test]
    fn test_defaults_without_epochs_skip_checkpoints() {
        let sink = MemorySink::new();
        let config = quiet_config().with_save_path("model.json");
        let mut model = MockModel::new();
        let manager = CallbackManager::with_defaults(
            &config,
            &mut model,
            &VecDataset::ramp(4, 2, 0.0),
            None,
            None,
            Box::new(sink.clone()),
        )
        .unwrap();

        assert_eq!(manager.callback_names(), vec!["TrainCostCallback", "TrainLoggerCallback"]);
        assert!(sink.contains("not checkpointing"));
    }

    #[test]
    fn test_defaults_overwrite_output_file_and_load_model() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("run.json");
        std::fs::write(&output, "stale").unwrap();
        let model_file = dir.path().join("init.json");
        crate::io::save_state(&serde_json::json!({"weights": [1.0]}), &model_file).unwrap();

        let sink = MemorySink::new();
        let config = quiet_config().with_output_file(&output).with_model_file(&model_file);
        let mut model = MockModel::new();
        let manager = CallbackManager::with_defaults(
            &config,
            &mut model,
            &VecDataset::ramp(4, 2, 0.0),
            None,
            None,
            Box::new(sink.clone()),
        )
        .unwrap();

        assert!(sink.messages_at(Level::WARN)[0].starts_with("Overwriting output file"));
        assert!(manager.store().is_persistent());
        assert!(MetricsStore::load(&output).is_ok());
        assert_eq!(model.loaded, Some(serde_json::json!({"weights": [1.0]})));
    }
}
