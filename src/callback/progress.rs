//! Live console progress bar

use std::io::Write;
use std::time::{Duration, Instant};

use crate::store::{keys, SeriesHandle};
use crate::{Error, Result};

use super::cached_loss::EpochLossLookup;
use super::traits::{Callback, CallbackContext};

const MAX_BAR_WIDTH: usize = 20;
const BLOCK_CHAR: char = '\u{2588}';

/// Render one progress line.
///
/// The bar is `MAX_BAR_WIDTH` cells wide and filled in proportion to
/// `minibatch / nbatches`.
pub fn progress_string(
    tag: &str,
    epoch: usize,
    minibatch: usize,
    nbatches: usize,
    cost: f32,
    time: f32,
) -> String {
    let filled = if nbatches == 0 {
        0
    } else {
        (minibatch * MAX_BAR_WIDTH / nbatches).min(MAX_BAR_WIDTH)
    };
    let bar = BLOCK_CHAR.to_string().repeat(filled);
    format!(
        "Epoch {epoch:<3} [{tag} |{bar:<width$}| {minibatch:4}/{nbatches:<4} batches, {cost:.2} cost, {time:.2}s]",
        width = MAX_BAR_WIDTH
    )
}

/// Live-updating console progress bar.
///
/// Redraws a single line in place (carriage return) at most once per
/// `update_thresh`, always on the last minibatch of an epoch, and finishes
/// the line at epoch end with the evaluation loss when one was recorded.
pub struct ProgressBarCallback {
    writer: Box<dyn Write>,
    update_thresh: Duration,
    epoch_start: Instant,
    last_update: Instant,
    nbatches: usize,
    last_strlen: usize,
    train_cost: Option<SeriesHandle>,
    lookup: EpochLossLookup,
}

impl ProgressBarCallback {
    /// Write to stdout, redrawing at most every `update_secs` seconds.
    pub fn new(update_secs: f32) -> Self {
        Self::with_writer(Box::new(std::io::stdout()), update_secs)
    }

    /// Write to `writer` instead of stdout.
    pub fn with_writer(writer: Box<dyn Write>, update_secs: f32) -> Self {
        let now = Instant::now();
        Self {
            writer,
            update_thresh: Duration::try_from_secs_f32(update_secs.max(0.0))
                .unwrap_or(Duration::MAX),
            epoch_start: now,
            last_update: now,
            nbatches: 0,
            last_strlen: 0,
            train_cost: None,
            lookup: EpochLossLookup::new("loss"),
        }
    }

    fn emit(&mut self, text: &str) -> Result<()> {
        self.writer
            .write_all(text.as_bytes())
            .and_then(|()| self.writer.flush())
            .map_err(|e| Error::io("writing progress bar", e))
    }
}

impl Default for ProgressBarCallback {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl Callback for ProgressBarCallback {
    fn on_epoch_begin(&mut self, ctx: &mut CallbackContext<'_>, _epoch: usize) -> Result<()> {
        let now = Instant::now();
        self.epoch_start = now;
        self.last_update = now;
        self.nbatches = ctx.train_set.nbatches;
        Ok(())
    }

    fn on_minibatch_end(
        &mut self,
        ctx: &mut CallbackContext<'_>,
        epoch: usize,
        minibatch: usize,
    ) -> Result<()> {
        let now = Instant::now();
        let mb_complete = minibatch + 1;
        if now.duration_since(self.last_update) <= self.update_thresh && mb_complete != self.nbatches {
            return Ok(());
        }
        self.last_update = now;

        if self.train_cost.is_none() {
            self.train_cost = ctx.store.series(keys::TRAIN_COST);
        }
        let tick = ctx.global_tick(epoch, minibatch)?;
        let cost = match self.train_cost {
            Some(series) => ctx.store.read(series, tick)?.unwrap_or(f32::NAN),
            None => f32::NAN,
        };

        let line = progress_string(
            "Train",
            epoch,
            mb_complete,
            self.nbatches,
            cost,
            now.duration_since(self.epoch_start).as_secs_f32(),
        );
        let clear = format!("\r{}\r", " ".repeat(self.last_strlen));
        self.emit(&clear)?;
        self.emit(&line)?;
        self.last_strlen = line.chars().count();
        Ok(())
    }

    fn on_epoch_end(&mut self, ctx: &mut CallbackContext<'_>, epoch: usize) -> Result<()> {
        if let Some(loss) = self.lookup.get(ctx, epoch) {
            self.emit(&format!(" [{} {:.2}, {:.2}s]", loss.cost_name, loss.cost, loss.time))?;
        }
        self.emit("\n")
    }

    fn reads(&self) -> Vec<String> {
        vec![keys::TRAIN_COST.to_string(), self.lookup.cost_key()]
    }

    fn name(&self) -> &'static str {
        "ProgressBarCallback"
    }
}
