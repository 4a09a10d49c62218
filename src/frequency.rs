//! Firing frequency for callbacks
//!
//! A callback declares one [`Frequency`] for epoch-level hooks and one for
//! minibatch-level hooks. The manager evaluates it against the epoch index or
//! the minibatch index (within the epoch) before invoking a hook.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// When a callback fires, in units of the tick it is checked against.
///
/// Serialized untagged: an interval is a bare integer (`2`), a tick set is a
/// list (`[0, 3]`) and `Never` is `null`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Frequency {
    /// Fire when `(tick + 1) % n == 0`. `Every(0)` never fires.
    Every(usize),
    /// Fire when the tick is a member of the set.
    At(BTreeSet<usize>),
    /// Never fire.
    Never,
}

/// Shared `Every(1)` returned by the default trait methods.
pub(crate) static EVERY_TICK: Frequency = Frequency::Every(1);

impl Frequency {
    /// Build an explicit tick set.
    pub fn at(ticks: impl IntoIterator<Item = usize>) -> Self {
        Self::At(ticks.into_iter().collect())
    }

    /// Whether a hook fires at `tick`.
    pub fn should_fire(&self, tick: usize) -> bool {
        match self {
            Self::Every(0) | Self::Never => false,
            Self::Every(n) => (tick + 1) % n == 0,
            Self::At(ticks) => ticks.contains(&tick),
        }
    }

    /// Whether this frequency can ever fire.
    pub fn is_never(&self) -> bool {
        match self {
            Self::Never | Self::Every(0) => true,
            Self::At(ticks) => ticks.is_empty(),
            Self::Every(_) => false,
        }
    }
}

impl Default for Frequency {
    fn default() -> Self {
        Self::Every(1)
    }
}

impl From<usize> for Frequency {
    fn from(n: usize) -> Self {
        Self::Every(n)
    }
}

impl From<Option<usize>> for Frequency {
    fn from(n: Option<usize>) -> Self {
        n.map_or(Self::Never, Self::Every)
    }
}
