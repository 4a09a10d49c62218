//! Configuration for the default callback set

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Options for [`CallbackManager::with_defaults`](crate::CallbackManager::with_defaults).
///
/// # Example
///
/// ```
/// use entrenar_callbacks::CallbackConfig;
///
/// let config = CallbackConfig::new()
///     .with_epochs(10)
///     .with_eval_freq(2)
///     .with_save_path("model.json")
///     .with_history(3);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackConfig {
    /// Persist the metrics store here; in-memory when unset
    pub output_file: Option<PathBuf>,
    /// Evaluate every N epochs
    pub eval_freq: Option<usize>,
    /// Render a console progress bar
    pub progress_bar: bool,
    /// Planned number of epochs
    pub epochs: Option<usize>,
    /// Checkpoint destination
    pub save_path: Option<PathBuf>,
    /// Checkpoint every N epochs (values below 2 mean every epoch)
    pub serialize: usize,
    /// Number of checkpoint files to keep
    pub history: usize,
    /// Load weights from this serialized state before training
    pub model_file: Option<PathBuf>,
    /// Window of the running train cost average
    pub cost_window: usize,
    /// Minimum seconds between progress redraws
    pub progress_update_secs: f64,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            output_file: None,
            eval_freq: None,
            progress_bar: true,
            epochs: None,
            save_path: None,
            serialize: 0,
            history: 1,
            model_file: None,
            cost_window: 10,
            progress_update_secs: 0.1,
        }
    }
}

impl CallbackConfig {
    /// Create config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::ConfigError(format!("Failed to parse callback config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Persist the metrics store to `path`
    pub fn with_output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_file = Some(path.into());
        self
    }

    /// Evaluate every `freq` epochs
    pub fn with_eval_freq(mut self, freq: usize) -> Self {
        self.eval_freq = Some(freq);
        self
    }

    /// Enable or disable the progress bar
    pub fn with_progress_bar(mut self, enabled: bool) -> Self {
        self.progress_bar = enabled;
        self
    }

    /// Set planned epochs
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = Some(epochs);
        self
    }

    /// Set checkpoint path
    pub fn with_save_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_path = Some(path.into());
        self
    }

    /// Checkpoint every `epochs` epochs
    pub fn with_serialize(mut self, epochs: usize) -> Self {
        self.serialize = epochs;
        self
    }

    /// Keep `count` checkpoint files
    pub fn with_history(mut self, count: usize) -> Self {
        self.history = count;
        self
    }

    /// Load initial weights from `path`
    pub fn with_model_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_file = Some(path.into());
        self
    }

    /// Set the running cost window
    pub fn with_cost_window(mut self, window: usize) -> Self {
        self.cost_window = window;
        self
    }

    /// Set the progress redraw threshold
    pub fn with_progress_update_secs(mut self, secs: f64) -> Self {
        self.progress_update_secs = secs;
        self
    }

    /// Effective checkpoint interval
    pub fn serialize_interval(&self) -> usize {
        self.serialize.max(1)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.eval_freq == Some(0) {
            return Err(Error::ConfigError("eval_freq must be > 0".to_string()));
        }
        if self.history == 0 {
            return Err(Error::ConfigError("history must be >= 1".to_string()));
        }
        if self.cost_window == 0 {
            return Err(Error::ConfigError("cost_window must be >= 1".to_string()));
        }
        if self.progress_update_secs.is_nan() || self.progress_update_secs < 0.0 {
            return Err(Error::ConfigError(format!(
                "progress_update_secs must be >= 0, got {}",
                self.progress_update_secs
            )));
        }
        Ok(())
    }
}
