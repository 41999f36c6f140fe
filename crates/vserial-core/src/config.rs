//! Configuration types for the multiplexer and its channels.
//!
//! Plain `Default`-deriving structs in the style of
//! `turnkey_hardware::manager::PeripheralConfig`: a caller can build one by
//! hand, or deserialize overrides from JSON via `serde_json` and fall back to
//! [`Default`] for anything unset.

use std::time::Duration;

use serde::Deserialize;

/// Per-channel queue configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ChannelConfig {
    /// Queue capacity in bytes. `0` means unbounded (no backpressure signal).
    pub capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self { capacity: 0 }
    }
}

impl ChannelConfig {
    /// A bounded channel with the given capacity.
    pub fn bounded(capacity: usize) -> Self {
        Self { capacity }
    }

    /// An unbounded channel.
    pub fn unbounded() -> Self {
        Self::default()
    }
}

/// Multiplexer-wide configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MultiplexerConfig {
    /// Default capacity used by `add_channel` when the caller doesn't override it.
    pub default_channel_capacity: usize,

    /// How long a single channel-queue `get` blocks before reporting a timeout.
    #[serde(with = "duration_millis")]
    pub read_timeout: Duration,
}

impl Default for MultiplexerConfig {
    fn default() -> Self {
        Self {
            default_channel_capacity: 0,
            read_timeout: Duration::from_millis(500),
        }
    }
}

mod duration_millis {
    use super::Duration;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
