//! Early stopping driven by a user fold over evaluation losses

use crate::Result;

use super::cached_loss::EpochLossLookup;
use super::traits::{Callback, CallbackContext};

/// Whether the decider has fired.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StopState {
    /// Training continues
    Running,
    /// Stop was signalled at `epoch` with evaluation cost `cost`
    Stopped { epoch: usize, cost: f32 },
}

/// Early stopping callback
///
/// On every epoch with a cached evaluation loss, calls
/// `stop_fn(state, cost) -> (state', stop)` and keeps `state'` for the next
/// call. The first `stop == true` sets the model's finished flag and the
/// callback becomes inert. The surrounding loop is expected to check
/// [`Model::finished`](crate::Model::finished) between epochs.
///
/// # Example
///
/// ```rust
/// use entrenar_callbacks::callback::{stop_fn, EarlyStopCallback};
///
/// // Stop if the loss has not improved by 0.001 for 5 evaluations
/// let early_stop = EarlyStopCallback::new(stop_fn::no_improvement(5, 0.001));
/// ```
pub struct EarlyStopCallback<S, F> {
    stop_fn: F,
    fold: Option<S>,
    state: StopState,
    lookup: EpochLossLookup,
}

impl<S, F> EarlyStopCallback<S, F>
where
    F: FnMut(Option<S>, f32) -> (S, bool),
{
    /// Create from a stop function.
    pub fn new(stop_fn: F) -> Self {
        Self { stop_fn, fold: None, state: StopState::Running, lookup: EpochLossLookup::new("loss") }
    }

    /// Current decider state.
    pub fn state(&self) -> StopState {
        self.state
    }

    /// Fold state threaded through the stop function.
    pub fn fold_state(&self) -> Option<&S> {
        self.fold.as_ref()
    }
}

impl<S, F> Callback for EarlyStopCallback<S, F>
where
    F: FnMut(Option<S>, f32) -> (S, bool),
{
    fn on_epoch_end(&mut self, ctx: &mut CallbackContext<'_>, epoch: usize) -> Result<()> {
        if matches!(self.state, StopState::Stopped { .. }) {
            return Ok(());
        }
        let Some(loss) = self.lookup.get(ctx, epoch) else {
            return Ok(());
        };

        let (next, stop) = (self.stop_fn)(self.fold.take(), loss.cost);
        self.fold = Some(next);
        if stop {
            ctx.model.set_finished(true);
            self.state = StopState::Stopped { epoch, cost: loss.cost };
            ctx.warn(&format!("Early stopping function triggered: mean_cost {}.", loss.cost));
        }
        Ok(())
    }

    fn reads(&self) -> Vec<String> {
        vec![self.lookup.cost_key()]
    }

    fn name(&self) -> &'static str {
        "EarlyStopCallback"
    }
}

/// Stock stop functions for [`EarlyStopCallback`].
pub mod stop_fn {
    /// Fold state of [`no_improvement`].
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub struct Patience {
        /// Best loss seen so far
        pub best_loss: f32,
        /// Evaluations without improvement
        pub epochs_without_improvement: usize,
    }

    /// Stop after `patience` evaluations that fail to beat the best loss by
    /// more than `min_delta`.
    pub fn no_improvement(
        patience: usize,
        min_delta: f32,
    ) -> impl FnMut(Option<Patience>, f32) -> (Patience, bool) {
        move |state, loss| {
            let mut state =
                state.unwrap_or(Patience { best_loss: f32::INFINITY, epochs_without_improvement: 0 });
            if loss < state.best_loss - min_delta {
                state.best_loss = loss;
                state.epochs_without_improvement = 0;
            } else {
                state.epochs_without_improvement += 1;
            }
            let stop = state.epochs_without_improvement >= patience;
            (state, stop)
        }
    }

    /// Stop once the loss drops to `target` or below.
    pub fn threshold(target: f32) -> impl FnMut(Option<()>, f32) -> ((), bool) {
        move |_, loss| ((), loss <= target)
    }
}
