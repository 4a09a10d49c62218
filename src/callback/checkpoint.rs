//! Checkpoint callback for saving model state periodically

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::frequency::Frequency;
use crate::io::save_state;
use crate::Result;

use super::traits::{Callback, CallbackContext};

/// Bounded set of checkpoint files, oldest evicted first.
///
/// With `retention == 1` every checkpoint overwrites `base`. Otherwise each
/// checkpoint goes to `<stem>_<epoch><ext>` next to `base` and at most
/// `retention` of them are kept.
#[derive(Clone, Debug)]
pub struct CheckpointRotator {
    base: PathBuf,
    retention: usize,
    files: VecDeque<PathBuf>,
}

impl CheckpointRotator {
    /// Rotate checkpoints derived from `base`, keeping `retention` (minimum 1).
    pub fn new(base: impl Into<PathBuf>, retention: usize) -> Self {
        Self { base: base.into(), retention: retention.max(1), files: VecDeque::new() }
    }

    /// Configured retention count.
    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Files currently retained, oldest first.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(PathBuf::as_path)
    }

    /// Destination for the checkpoint of `epoch`.
    pub fn path_for(&self, epoch: usize) -> PathBuf {
        if self.retention == 1 {
            return self.base.clone();
        }
        let stem = self.base.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let name = match self.base.extension() {
            Some(ext) => format!("{stem}_{epoch}.{}", ext.to_string_lossy()),
            None => format!("{stem}_{epoch}"),
        };
        self.base.with_file_name(name)
    }

    /// Register the checkpoint for `epoch`.
    ///
    /// Returns the path to write and the files that fell out of retention and
    /// should be deleted.
    pub fn rotate(&mut self, epoch: usize) -> (PathBuf, Vec<PathBuf>) {
        let path = self.path_for(epoch);
        if self.retention == 1 {
            return (path, Vec::new());
        }
        let mut evicted = Vec::new();
        while self.files.len() >= self.retention {
            if let Some(old) = self.files.pop_front() {
                evicted.push(old);
            }
        }
        self.files.push_back(path.clone());
        (path, evicted)
    }
}

/// Checkpoint callback to save model state on a schedule of epochs.
///
/// Each checkpoint includes optimizer/training state. Failure to delete a
/// checkpoint that fell out of retention is logged and otherwise ignored.
#[derive(Clone, Debug)]
pub struct SerializeModelCallback {
    rotator: CheckpointRotator,
    schedule: Frequency,
    last_saved_epoch: Option<usize>,
}

impl SerializeModelCallback {
    /// Save to `save_path` on the epochs `schedule` fires, keeping `history` files.
    pub fn new(save_path: impl Into<PathBuf>, schedule: Frequency, history: usize) -> Self {
        Self {
            rotator: CheckpointRotator::new(save_path, history),
            schedule,
            last_saved_epoch: None,
        }
    }

    /// Schedule `0, interval, 2 * interval, ...` below `epochs`.
    pub fn schedule(epochs: usize, interval: usize) -> Frequency {
        Frequency::at((0..epochs).step_by(interval.max(1)))
    }

    /// The underlying rotator.
    pub fn rotator(&self) -> &CheckpointRotator {
        &self.rotator
    }

    /// Epoch of the most recent checkpoint.
    pub fn last_saved_epoch(&self) -> Option<usize> {
        self.last_saved_epoch
    }
}

impl Callback for SerializeModelCallback {
    fn epoch_freq(&self) -> &Frequency {
        &self.schedule
    }

    fn on_epoch_end(&mut self, ctx: &mut CallbackContext<'_>, epoch: usize) -> Result<()> {
        let (path, evicted) = self.rotator.rotate(epoch);
        for old in evicted {
            match std::fs::remove_file(&old) {
                Ok(()) => ctx.info(&format!("Removed old checkpoint {}", old.display())),
                Err(e) => ctx.warn(&format!(
                    "Could not delete old checkpoint file {}: {e}",
                    old.display()
                )),
            }
        }

        let state = ctx.model.serialize(true)?;
        save_state(&state, &path)?;
        self.last_saved_epoch = Some(epoch);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "SerializeModelCallback"
    }
}
