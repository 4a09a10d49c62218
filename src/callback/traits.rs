//! Core traits and types for the callback system
//!
//! This module provides the foundational types for training callbacks:
//! - `CallbackContext` - Shared state handed to every hook
//! - `RunInfo` / `TrainSetInfo` - Run-wide sizes computed at train begin
//! - `Callback` - The trait all callbacks implement

use crate::frequency::{Frequency, EVERY_TICK};
use crate::model::{Dataset, Model};
use crate::sink::{Level, LogSink};
use crate::store::{MetricsStore, SeriesHandle, StoreError};
use crate::Result;

/// Sizes of the training set, captured when the manager is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrainSetInfo {
    /// Total number of examples
    pub ndata: usize,
    /// Examples per minibatch
    pub batch_size: usize,
    /// Minibatches per epoch
    pub nbatches: usize,
}

impl TrainSetInfo {
    /// Capture sizes from a dataset.
    pub fn from_dataset(dataset: &dyn Dataset) -> Self {
        Self {
            ndata: dataset.ndata(),
            batch_size: dataset.batch_size(),
            nbatches: dataset.nbatches(),
        }
    }

    /// Minibatches across `epochs` epochs, rounded up.
    ///
    /// Assumes the dataset wraps around to fill a partial final batch
    /// rather than emitting a short one every epoch.
    pub fn total_minibatches(&self, epochs: usize) -> usize {
        if self.batch_size == 0 {
            return 0;
        }
        (self.ndata * epochs).div_ceil(self.batch_size)
    }
}

/// Run-wide values fixed at train begin.
#[derive(Clone, Copy, Debug)]
pub struct RunInfo {
    /// Planned epochs
    pub total_epochs: usize,
    /// Planned minibatches across all epochs
    pub total_minibatches: usize,
    /// Cumulative minibatch count per completed epoch
    pub markers: SeriesHandle,
}

/// Context passed to every hook.
///
/// Callbacks run one after another on the training thread; the store is
/// shared mutable state and a callback sees every write made by callbacks
/// registered before it in the same event.
pub struct CallbackContext<'a> {
    /// Shared metrics store
    pub store: &'a mut MetricsStore,
    /// Model under training
    pub model: &'a mut dyn Model,
    /// Run log
    pub log: &'a mut dyn LogSink,
    /// Training set sizes
    pub train_set: &'a TrainSetInfo,
    /// Run-wide sizes
    pub run: &'a RunInfo,
    /// Exact cumulative minibatch count per completed epoch, indexed by epoch
    pub epoch_markers: &'a [Option<usize>],
}

impl CallbackContext<'_> {
    /// Minibatches completed before `epoch` started.
    pub fn minibatch_offset(&self, epoch: usize) -> std::result::Result<usize, StoreError> {
        if epoch == 0 {
            return Ok(0);
        }
        match self.epoch_markers.get(epoch - 1).copied().flatten() {
            Some(marker) => Ok(marker),
            None => Err(StoreError::Unwritten {
                name: self.store.series_name(self.run.markers).to_string(),
                tick: epoch - 1,
            }),
        }
    }

    /// Global minibatch tick for `minibatch` of `epoch`.
    pub fn global_tick(&self, epoch: usize, minibatch: usize) -> Result<usize> {
        Ok(self.minibatch_offset(epoch)? + minibatch)
    }

    /// Log at INFO.
    pub fn info(&mut self, message: &str) {
        self.log.log(Level::INFO, message);
    }

    /// Log at WARN.
    pub fn warn(&mut self, message: &str) {
        self.log.log(Level::WARN, message);
    }
}

/// Trait for training callbacks
///
/// Implement this trait to hook into training events. All hooks have
/// default no-op implementations, so you only need to implement the
/// events you care about. A hook only runs when the callback's frequency
/// fires for the current epoch (epoch hooks) or minibatch (minibatch hooks).
pub trait Callback {
    /// When epoch-level hooks fire, checked against the epoch index
    fn epoch_freq(&self) -> &Frequency {
        &EVERY_TICK
    }

    /// When minibatch-level hooks fire, checked against the minibatch index
    fn minibatch_freq(&self) -> &Frequency {
        &EVERY_TICK
    }

    /// Called before training starts
    fn on_train_begin(&mut self, _ctx: &mut CallbackContext<'_>, _epochs: usize) -> Result<()> {
        Ok(())
    }

    /// Called after training ends
    fn on_train_end(&mut self, _ctx: &mut CallbackContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Called before each epoch
    fn on_epoch_begin(&mut self, _ctx: &mut CallbackContext<'_>, _epoch: usize) -> Result<()> {
        Ok(())
    }

    /// Called after each epoch
    fn on_epoch_end(&mut self, _ctx: &mut CallbackContext<'_>, _epoch: usize) -> Result<()> {
        Ok(())
    }

    /// Called before each minibatch
    fn on_minibatch_begin(
        &mut self,
        _ctx: &mut CallbackContext<'_>,
        _epoch: usize,
        _minibatch: usize,
    ) -> Result<()> {
        Ok(())
    }

    /// Called after each minibatch
    fn on_minibatch_end(
        &mut self,
        _ctx: &mut CallbackContext<'_>,
        _epoch: usize,
        _minibatch: usize,
    ) -> Result<()> {
        Ok(())
    }

    /// Store paths this callback writes
    fn writes(&self) -> Vec<String> {
        Vec::new()
    }

    /// Store paths this callback reads and expects written earlier in the same event
    fn reads(&self) -> Vec<String> {
        Vec::new()
    }

    /// Get callback name for logging
    fn name(&self) -> &'static str {
        "Callback"
    }
}
