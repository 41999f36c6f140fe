//! HDLC framing: FCS-32, the send-side Framer, and the receive-side state
//! machine.

pub mod fcs32;
pub mod framer;
pub mod receiver;

pub use framer::Framer;
pub use receiver::{Receiver, Statistics};
