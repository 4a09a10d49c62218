//! Callback system for training events
//!
//! Provides extensible hooks for training loop events:
//! - `on_train_begin` / `on_train_end`
//! - `on_epoch_begin` / `on_epoch_end`
//! - `on_minibatch_begin` / `on_minibatch_end`
//!
//! Callbacks share one [`MetricsStore`](crate::MetricsStore) through the
//! [`CallbackContext`]. Writers must be registered before readers of the
//! same key; [`CallbackManager`] checks the declared `reads`/`writes` at
//! train begin.
//!
//! # Example
//!
//! ```rust
//! use entrenar_callbacks::callback::{Callback, CallbackContext};
//! use entrenar_callbacks::Result;
//!
//! struct PrintCallback;
//!
//! impl Callback for PrintCallback {
//!     fn on_epoch_end(&mut self, ctx: &mut CallbackContext<'_>, epoch: usize) -> Result<()> {
//!         let cost = ctx.model.total_cost();
//!         ctx.info(&format!("Epoch {epoch} finished with cost {cost:.4}"));
//!         Ok(())
//!     }
//! }
//! ```

mod best_state;
mod cached_loss;
mod checkpoint;
mod early_stopping;
mod histogram;
mod logger;
mod loss;
mod manager;
mod metric;
mod progress;
mod train_cost;
mod traits;

#[cfg(test)]
mod testing;

// Re-export all public types
pub use best_state::SaveBestStateCallback;
pub use cached_loss::{EpochLoss, EpochLossLookup};
pub use checkpoint::{CheckpointRotator, SerializeModelCallback};
pub use early_stopping::{stop_fn, EarlyStopCallback, StopState};
pub use histogram::HistCallback;
pub use logger::TrainLoggerCallback;
pub use loss::LossCallback;
pub use manager::CallbackManager;
pub use metric::MetricCallback;
pub use progress::{progress_string, ProgressBarCallback};
pub use train_cost::TrainCostCallback;
pub use traits::{Callback, CallbackContext, RunInfo, TrainSetInfo};
