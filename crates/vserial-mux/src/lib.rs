//! Multi-channel virtual-serial multiplexer built on top of the HDLC
//! framing engine in `vserial-protocol`.

pub mod channel;
pub mod multiplexer;

pub use channel::ChannelQueue;
pub use multiplexer::{Channel, Multiplexer, MuxStatistics};
