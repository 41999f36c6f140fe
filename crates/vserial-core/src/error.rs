//! Error types shared by the framing and multiplexing crates.
//!
//! The Receiver and Framer never raise on malformed wire data — bad frames are
//! reflected only in `Statistics` counters. This enum exists for the structural,
//! API-facing failures the multiplexer can still hit: an unregistered channel, a
//! duplicate registration, a dead transport, or a multiplexer that has already
//! torn down.

use thiserror::Error;

/// Result type alias used throughout `vserial-*`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the channel/multiplexer API surface.
#[derive(Debug, Error)]
pub enum Error {
    /// `channel_read`/`channel_write` named a channel with no registered queue.
    #[error("channel {channel} is not registered")]
    ChannelNotRegistered {
        /// The channel number the caller asked for.
        channel: u8,
    },

    /// `add_channel` was called twice for the same channel number.
    #[error("channel {channel} is already registered")]
    ChannelAlreadyRegistered {
        /// The channel number that was already present.
        channel: u8,
    },

    /// The multiplexer's background reader has exited; no further I/O is possible.
    #[error("multiplexer has shut down")]
    MultiplexerShutdown,

    /// The transport failed in a way that cannot be retried.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a [`Error::ChannelNotRegistered`].
    pub fn channel_not_registered(channel: u8) -> Self {
        Self::ChannelNotRegistered { channel }
    }

    /// Build a [`Error::ChannelAlreadyRegistered`].
    pub fn channel_already_registered(channel: u8) -> Self {
        Self::ChannelAlreadyRegistered { channel }
    }
}
