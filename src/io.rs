//! Model state persistence
//!
//! Checkpoints and best-state snapshots are the JSON value returned by
//! [`Model::serialize`](crate::Model::serialize), written as-is.

use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Write a serialized model state to `path`, replacing any existing file.
///
/// The state goes to a sibling `.tmp` file first and is renamed into place,
/// so a crash mid-write never leaves a truncated checkpoint at `path`.
pub fn save_state(state: &serde_json::Value, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let data = serde_json::to_vec(state)
        .map_err(|e| Error::Serialization(format!("JSON serialization failed: {e}")))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file =
        File::create(&tmp).map_err(|e| Error::io(format!("creating {}", tmp.display()), e))?;
    file.write_all(&data)
        .map_err(|e| Error::io(format!("writing {}", tmp.display()), e))?;
    file.sync_all()
        .map_err(|e| Error::io(format!("syncing {}", tmp.display()), e))?;
    drop(file);

    fs::rename(&tmp, path)
        .map_err(|e| Error::io(format!("renaming {} to {}", tmp.display(), path.display()), e))
}

/// Read a serialized model state back from `path`.
pub fn load_state(path: impl AsRef<Path>) -> Result<serde_json::Value> {
    let path = path.as_ref();
    let file =
        File::open(path).map_err(|e| Error::io(format!("opening {}", path.display()), e))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| Error::Serialization(format!("{}: {e}", path.display())))
}
