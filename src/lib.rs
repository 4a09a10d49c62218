//! Callback orchestration for epoch/minibatch training loops
//!
//! A [`CallbackManager`] owns an ordered list of callbacks and a shared
//! [`MetricsStore`]. The training loop calls the manager at six lifecycle
//! points; the manager decides per callback whether its hook fires and
//! keeps the epoch-boundary bookkeeping (cumulative minibatch markers) that
//! callbacks use to address per-minibatch series.
//!
//! Built-in callbacks cover running train cost, periodic evaluation loss
//! and metrics, checkpoint rotation, best-state saving, early stopping, a
//! console progress bar, a text logger and weight histograms.
//!
//! # Example
//!
//! ```no_run
//! use entrenar_callbacks::{CallbackConfig, CallbackManager, Dataset, Model, TracingSink};
//!
//! fn train(model: &mut dyn Model, train_set: &mut dyn Dataset) -> entrenar_callbacks::Result<()> {
//!     let config = CallbackConfig::new().with_epochs(10).with_save_path("model.json");
//!     let mut callbacks =
//!         CallbackManager::with_defaults(&config, model, train_set, None, None, Box::new(TracingSink))?;
//!
//!     callbacks.on_train_begin(model, 10)?;
//!     for epoch in 0..10 {
//!         callbacks.on_epoch_begin(model, epoch)?;
//!         train_set.reset();
//!         let mut minibatch = 0;
//!         while let Some(_batch) = train_set.next_batch() {
//!             callbacks.on_minibatch_begin(model, epoch, minibatch)?;
//!             // forward, backward, update
//!             callbacks.on_minibatch_end(model, epoch, minibatch)?;
//!             minibatch += 1;
//!         }
//!         callbacks.on_epoch_end(model, epoch)?;
//!         if model.finished() {
//!             break;
//!         }
//!     }
//!     callbacks.on_train_end(model)
//! }
//! ```

pub mod callback;
pub mod config;
pub mod error;
pub mod frequency;
pub mod io;
pub mod model;
pub mod sink;
pub mod store;

pub use callback::{Callback, CallbackContext, CallbackManager};
pub use config::CallbackConfig;
pub use error::{Error, Result};
pub use frequency::Frequency;
pub use model::{Batch, Dataset, Histogrammer, Layer, Log2Histogrammer, Metric, Model};
pub use sink::{LogSink, MemorySink, TracingSink};
pub use store::{AttrValue, MatrixHandle, MetricsStore, SeriesHandle, StoreError, TimeBase};
