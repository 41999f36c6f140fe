//! Send path: escape, append FCS-32, and flag-delimit a payload for the wire.

use std::sync::Mutex;

use tracing::trace;
use vserial_core::{ESC, ESC_MOD, FLAG, Result, Transport};

use crate::fcs32;

/// Encodes and writes frames to a transport, serializing concurrent senders
/// behind a single lock so no two frames interleave on the wire.
pub struct Framer<T: Transport> {
    transport: Mutex<T>,
}

impl<T: Transport> Framer<T> {
    /// Wrap the write half of a transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport: Mutex::new(transport),
        }
    }

    /// Frame `channel || control || payload`, appending FCS-32 and escaping
    /// any `FLAG`/`ESC` bytes, then write the result atomically.
    pub fn send(&self, channel: u8, control: u8, payload: &[u8]) -> Result<()> {
        let encoded = encode(channel, control, payload);
        let mut transport = self.transport.lock().unwrap();
        transport.write_all(&encoded)?;
        trace!(channel, control, len = payload.len(), "frame sent");
        Ok(())
    }
}

/// Build the on-wire bytes for a frame, without touching a transport.
/// Exposed separately so tests can check the escaped byte stream directly.
pub fn encode(channel: u8, control: u8, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(2 + payload.len() + 4);
    body.push(channel);
    body.push(control);
    body.extend_from_slice(payload);
    fcs32::append(&mut body);

    let mut out = Vec::with_capacity(body.len() * 2 + 2);
    out.push(FLAG);
    for &b in &body {
        if b == FLAG || b == ESC {
            out.push(ESC);
            out.push(b ^ ESC_MOD);
        } else {
            out.push(b);
        }
    }
    out.push(FLAG);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vserial_core::LoopbackTransport;

    #[test]
    fn encode_starts_and_ends_with_flag() {
        let bytes = encode(1, 0, b"hi");
        assert_eq!(*bytes.first().unwrap(), FLAG);
        assert_eq!(*bytes.last().unwrap(), FLAG);
    }

    #[test]
    fn encode_escapes_flag_and_esc_in_body() {
        let bytes = encode(FLAG, ESC, &[]);
        // channel byte (FLAG) must be escaped: ESC, FLAG ^ ESC_MOD
        assert_eq!(bytes[1], ESC);
        assert_eq!(bytes[2], FLAG ^ ESC_MOD);
        assert_eq!(bytes[3], ESC);
        assert_eq!(bytes[4], ESC ^ ESC_MOD);
    }

    #[test]
    fn send_writes_a_single_framed_message() {
        let (a, mut b) = LoopbackTransport::pair(Duration::from_millis(100));
        let framer = Framer::new(a);
        framer.send(3, 0, b"abc").unwrap();

        let mut received = Vec::new();
        while let Some(byte) = b.read_byte().unwrap() {
            received.push(byte);
        }
        assert_eq!(received, encode(3, 0, b"abc"));
    }
}
