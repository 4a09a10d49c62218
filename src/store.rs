//! Shared metrics store
//!
//! A hierarchical namespace of fixed-length series and key/value attributes
//! shared by every callback in a run. Series are allocated once (usually in
//! `on_train_begin`) with their final length and then written by point
//! updates at a computed tick; they are never resized or appended to.
//!
//! Callbacks keep the [`SeriesHandle`]/[`MatrixHandle`] they get back from
//! allocation and address the data through it, instead of re-resolving the
//! path on every write. Readers of another callback's series look the handle
//! up once by name.
//!
//! A store is either in-memory or backed by a JSON document on disk that is
//! rewritten on every [`MetricsStore::flush`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};


/// Well-known store paths shared between callbacks.
pub mod keys {
    /// Group holding run-wide configuration attributes.
    pub const CONFIG: &str = "config";
    /// Attribute: total minibatches in the run.
    pub const TOTAL_MINIBATCHES: &str = "total_minibatches";
    /// Attribute: total epochs in the run.
    pub const TOTAL_EPOCHS: &str = "total_epochs";
    /// Group holding epoch boundary bookkeeping.
    pub const TIME_MARKERS: &str = "time_markers";
    /// Series: cumulative minibatch count at the end of each epoch.
    pub const MINIBATCH_MARKERS: &str = "time_markers/minibatch";
    /// Attribute on [`TIME_MARKERS`]: epochs completed so far.
    pub const EPOCHS_COMPLETE: &str = "epochs_complete";
    /// Attribute on [`TIME_MARKERS`]: minibatches completed so far.
    pub const MINIBATCHES_COMPLETE: &str = "minibatches_complete";
    /// Series: smoothed training cost per minibatch.
    pub const TRAIN_COST: &str = "cost/train";
    /// Series attribute naming the time base of a series.
    pub const TIME_MARKERS_ATTR: &str = "time_markers";
    /// Series attribute: epoch frequency of an epoch-frequency series.
    pub const EPOCH_FREQ: &str = "epoch_freq";
    /// Group holding weight histograms.
    pub const HIST: &str = "hist";

    /// Cost series for an evaluation label, e.g. `cost/loss`.
    pub fn cost(label: &str) -> String {
        format!("cost/{label}")
    }

    /// Timing series for an evaluation label, e.g. `time/loss`.
    pub fn time(label: &str) -> String {
        format!("time/{label}")
    }
}

/// Metrics store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Series already exists: {0}")]
    AlreadyExists(String),

    #[error("Tick {tick} out of range for series '{name}' (length {len})")]
    TickOutOfRange { name: String, tick: usize, len: usize },

    #[error("Series '{name}' has no value at tick {tick}")]
    Unwritten { name: String, tick: usize },

    #[error("Shape mismatch for '{name}': expected {expected:?}, got {actual:?}")]
    ShapeMismatch { name: String, expected: (usize, usize), actual: (usize, usize) },

    #[error("Metrics store is closed")]
    Closed,

    #[error("Store IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Store serialization error: {0}")]
    Serialization(String),
}

/// Which time axis a series is indexed by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBase {
    /// Global minibatch tick, cumulative across epochs.
    Minibatch,
    /// One slot per epoch.
    Epoch,
    /// One slot per `epoch_freq` epochs.
    EpochFreq,
}

impl TimeBase {
    /// Name stored in the `time_markers` attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minibatch => "minibatch",
            Self::Epoch => "epoch",
            Self::EpochFreq => "epoch_freq",
        }
    }
}

/// Attribute value attached to a group or series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl AttrValue {
    /// Integer view (non-negative integers only).
    pub fn as_usize(&self) -> Option<usize> {
        match self {
            Self::Int(v) => usize::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Numeric view.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Str(_) => None,
        }
    }

    /// String view.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<usize> for AttrValue {
    fn from(v: usize) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<TimeBase> for AttrValue {
    fn from(v: TimeBase) -> Self {
        Self::Str(v.as_str().to_string())
    }
}

type Attrs = BTreeMap<String, AttrValue>;

/// Handle to a one-dimensional series.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SeriesHandle(usize);

/// Handle to a two-dimensional `(rows, ticks)` series.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MatrixHandle(usize);

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Series {
    name: String,
    #[serde(with = "tick_values")]
    values: Vec<Option<f32>>,
    attrs: Attrs,
}

/// On-disk form of series values.
///
/// JSON has no literal for non-finite numbers and `serde_json` writes them as
/// `null`, which already means "unwritten". Non-finite values are spelled
/// `"NaN"`, `"inf"` and `"-inf"` instead.
mod tick_values {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Stored {
        Number(f32),
        Special(String),
    }

    fn encode(v: f32) -> Stored {
        if v.is_nan() {
            Stored::Special("NaN".to_string())
        } else if v == f32::INFINITY {
            Stored::Special("inf".to_string())
        } else if v == f32::NEG_INFINITY {
            Stored::Special("-inf".to_string())
        } else {
            Stored::Number(v)
        }
    }

    fn decode(stored: Stored) -> Result<f32, String> {
        match stored {
            Stored::Number(v) => Ok(v),
            Stored::Special(s) => match s.as_str() {
                "NaN" => Ok(f32::NAN),
                "inf" => Ok(f32::INFINITY),
                "-inf" => Ok(f32::NEG_INFINITY),
                other => Err(format!("invalid series value {other:?}")),
            },
        }
    }

    pub fn serialize<S: Serializer>(
        values: &[Option<f32>],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let stored: Vec<Option<Stored>> = values.iter().map(|v| v.map(encode)).collect();
        stored.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Option<f32>>, D::Error> {
        Vec::<Option<Stored>>::deserialize(deserializer)?
            .into_iter()
            .map(|v| v.map(decode).transpose().map_err(D::Error::custom))
            .collect()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Matrix {
    name: String,
    data: Array2<f32>,
    attrs: Attrs,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct StoreData {
    groups: BTreeMap<String, Attrs>,
    series: Vec<Series>,
    matrices: Vec<Matrix>,
}

/// Hierarchical, fixed-shape metrics store shared by all callbacks.
#[derive(Debug)]
pub struct MetricsStore {
    data: StoreData,
    series_index: BTreeMap<String, usize>,
    matrix_index: BTreeMap<String, usize>,
    backing: Option<PathBuf>,
    closed: bool,
}

impl MetricsStore {
    /// Create a store that lives only in memory and is never persisted.
    pub fn in_memory() -> Self {
        let mut store = Self {
            data: StoreData::default(),
            series_index: BTreeMap::new(),
            matrix_index: BTreeMap::new(),
            backing: None,
            closed: false,
        };
        store.data.groups.entry(String::new()).or_default().insert(
            "created_at".to_string(),
            AttrValue::Str(chrono::Utc::now().to_rfc3339()),
        );
        store
    }

    /// Create a store persisted to `path`, truncating any previous content.
    ///
    /// The file is written immediately so an unwritable destination fails
    /// here rather than at the first epoch boundary.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let mut store = Self::in_memory();
        store.backing = Some(path.into());
        store.flush()?;
        Ok(store)
    }

    /// Load a previously persisted store. The result is an in-memory copy.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|source| StoreError::Io { path: path.to_path_buf(), source })?;
        let data: StoreData = serde_json::from_str(&text)
            .map_err(|e| StoreError::Serialization(format!("{}: {e}", path.display())))?;
        let series_index =
            data.series.iter().enumerate().map(|(i, s)| (s.name.clone(), i)).collect();
        let matrix_index =
            data.matrices.iter().enumerate().map(|(i, m)| (m.name.clone(), i)).collect();
        Ok(Self { data, series_index, matrix_index, backing: None, closed: false })
    }

    /// Backing file, if persisted.
    pub fn path(&self) -> Option<&Path> {
        self.backing.as_deref()
    }

    /// Whether the store writes to durable storage.
    pub fn is_persistent(&self) -> bool {
        self.backing.is_some()
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether a group, series or matrix exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.data.groups.contains_key(path)
            || self.series_index.contains_key(path)
            || self.matrix_index.contains_key(path)
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    /// Register every ancestor group of `path`.
    fn ensure_parents(&mut self, path: &str) {
        let mut prefix = String::new();
        let parts: Vec<&str> = path.split('/').collect();
        for part in &parts[..parts.len().saturating_sub(1)] {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(part);
            self.data.groups.entry(prefix.clone()).or_default();
        }
    }

    /// Create a group (and its parents). Existing groups are left untouched.
    pub fn create_group(&mut self, path: &str) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.ensure_parents(path);
        self.data.groups.entry(path.to_string()).or_default();
        Ok(())
    }

    /// Set an attribute on a group, creating the group if needed.
    pub fn set_attr(
        &mut self,
        group: &str,
        key: &str,
        value: impl Into<AttrValue>,
    ) -> Result<(), StoreError> {
        self.create_group(group)?;
        self.data
            .groups
            .entry(group.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
        Ok(())
    }

    /// Read a group attribute.
    pub fn attr(&self, group: &str, key: &str) -> Option<&AttrValue> {
        self.data.groups.get(group).and_then(|attrs| attrs.get(key))
    }

    // ---- one-dimensional series ----

    /// Allocate a fixed-length series. Every slot starts unwritten.
    pub fn create_series(
        &mut self,
        name: &str,
        len: usize,
        time_base: Option<TimeBase>,
    ) -> Result<SeriesHandle, StoreError> {
        self.ensure_open()?;
        if self.contains(name) {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }
        self.ensure_parents(name);
        let mut attrs = Attrs::new();
        if let Some(base) = time_base {
            attrs.insert(keys::TIME_MARKERS_ATTR.to_string(), base.into());
        }
        self.data.series.push(Series { name: name.to_string(), values: vec![None; len], attrs });
        let idx = self.data.series.len() - 1;
        self.series_index.insert(name.to_string(), idx);
        Ok(SeriesHandle(idx))
    }

    /// Look up a series by name.
    pub fn series(&self, name: &str) -> Option<SeriesHandle> {
        self.series_index.get(name).copied().map(SeriesHandle)
    }

    /// Name of a series.
    pub fn series_name(&self, handle: SeriesHandle) -> &str {
        &self.data.series[handle.0].name
    }

    /// Allocated length of a series.
    pub fn series_len(&self, handle: SeriesHandle) -> usize {
        self.data.series[handle.0].values.len()
    }

    /// Time base declared at allocation.
    pub fn time_base(&self, handle: SeriesHandle) -> Option<TimeBase> {
        match self.series_attr(handle, keys::TIME_MARKERS_ATTR).and_then(AttrValue::as_str) {
            Some("minibatch") => Some(TimeBase::Minibatch),
            Some("epoch") => Some(TimeBase::Epoch),
            Some("epoch_freq") => Some(TimeBase::EpochFreq),
            _ => None,
        }
    }

    /// Point write at `tick`.
    pub fn write(&mut self, handle: SeriesHandle, tick: usize, value: f32) -> Result<(), StoreError> {
        self.ensure_open()?;
        let series = &mut self.data.series[handle.0];
        let len = series.values.len();
        let slot = series.values.get_mut(tick).ok_or_else(|| StoreError::TickOutOfRange {
            name: series.name.clone(),
            tick,
            len,
        })?;
        *slot = Some(value);
        Ok(())
    }

    /// Read the value at `tick`, `None` if it was never written.
    pub fn read(&self, handle: SeriesHandle, tick: usize) -> Result<Option<f32>, StoreError> {
        let series = &self.data.series[handle.0];
        series.values.get(tick).copied().ok_or_else(|| StoreError::TickOutOfRange {
            name: series.name.clone(),
            tick,
            len: series.values.len(),
        })
    }

    /// All slots of a series.
    pub fn values(&self, handle: SeriesHandle) -> &[Option<f32>] {
        &self.data.series[handle.0].values
    }

    /// Set an attribute on a series.
    pub fn set_series_attr(
        &mut self,
        handle: SeriesHandle,
        key: &str,
        value: impl Into<AttrValue>,
    ) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.data.series[handle.0].attrs.insert(key.to_string(), value.into());
        Ok(())
    }

    /// Read a series attribute.
    pub fn series_attr(&self, handle: SeriesHandle, key: &str) -> Option<&AttrValue> {
        self.data.series[handle.0].attrs.get(key)
    }

    // ---- two-dimensional series ----

    /// Return the matrix at `name`, allocating it with `shape` on first use.
    pub fn require_matrix(
        &mut self,
        name: &str,
        shape: (usize, usize),
    ) -> Result<MatrixHandle, StoreError> {
        self.ensure_open()?;
        if let Some(&idx) = self.matrix_index.get(name) {
            let actual = self.data.matrices[idx].data.dim();
            if actual != shape {
                return Err(StoreError::ShapeMismatch {
                    name: name.to_string(),
                    expected: shape,
                    actual,
                });
            }
            return Ok(MatrixHandle(idx));
        }
        if self.contains(name) {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }
        self.ensure_parents(name);
        self.data.matrices.push(Matrix {
            name: name.to_string(),
            data: Array2::zeros(shape),
            attrs: Attrs::new(),
        });
        let idx = self.data.matrices.len() - 1;
        self.matrix_index.insert(name.to_string(), idx);
        Ok(MatrixHandle(idx))
    }

    /// Look up a matrix by name.
    pub fn matrix(&self, name: &str) -> Option<MatrixHandle> {
        self.matrix_index.get(name).copied().map(MatrixHandle)
    }

    /// Names of all matrices under a group prefix.
    pub fn matrices_in(&self, group: &str) -> Vec<&str> {
        let prefix = format!("{group}/");
        self.matrix_index.keys().filter(|k| k.starts_with(&prefix)).map(String::as_str).collect()
    }

    /// Overwrite column `tick` of a matrix.
    pub fn write_column(
        &mut self,
        handle: MatrixHandle,
        tick: usize,
        column: &[f32],
    ) -> Result<(), StoreError> {
        self.ensure_open()?;
        let matrix = &mut self.data.matrices[handle.0];
        let (rows, cols) = matrix.data.dim();
        if tick >= cols {
            return Err(StoreError::TickOutOfRange { name: matrix.name.clone(), tick, len: cols });
        }
        if column.len() != rows {
            return Err(StoreError::ShapeMismatch {
                name: matrix.name.clone(),
                expected: (rows, 1),
                actual: (column.len(), 1),
            });
        }
        for (dst, &src) in matrix.data.column_mut(tick).iter_mut().zip(column) {
            *dst = src;
        }
        Ok(())
    }

    /// View of a matrix.
    pub fn matrix_data(&self, handle: MatrixHandle) -> ArrayView2<'_, f32> {
        self.data.matrices[handle.0].data.view()
    }

    // ---- lifecycle ----

    /// Write the whole store to its backing file. No-op for in-memory stores.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        let Some(path) = &self.backing else {
            return Ok(());
        };
        let text = serde_json::to_string(&self.data)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, text).map_err(|source| StoreError::Io { path: tmp.clone(), source })?;
        fs::rename(&tmp, path).map_err(|source| StoreError::Io { path: path.clone(), source })
    }

    /// Flush and close. Later writes fail with [`StoreError::Closed`]; reads
    /// keep working.
    pub fn close(&mut self) -> Result<(), StoreError> {
        if self.closed {
            return Ok(());
        }
        self.flush()?;
        self.closed = true;
        Ok(())
    }
}
