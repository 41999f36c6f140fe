//! Shared constants, error types, configuration, and transport abstraction for
//! the `vserial` HDLC framing engine and multiplexer.

pub mod config;
pub mod constants;
pub mod error;
pub mod transport;

pub use config::{ChannelConfig, MultiplexerConfig};
pub use constants::{ESC, ESC_MOD, FLAG, GOOD_FINAL, IDLE, MIN_FRAME_LEN, MIN_ROUTABLE_FRAME_LEN};
pub use error::{Error, Result};
pub use transport::{LoopbackTransport, SerialTransport, Transport};

/// Version info.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
