//! The byte-oriented transport capability the Receiver and Framer are bound to.
//!
//! Opening, configuring (baud rate, parity, timeout) and owning the underlying
//! device is explicitly out of scope for this crate — callers hand in an
//! already-configured [`Transport`]. Two implementations ship here: a thin
//! wrapper around a real [`serialport::SerialPort`], and an in-process loopback
//! used by tests and the CLI's demo mode.

use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// A byte-oriented duplex the framing engine reads from and writes to.
///
/// `read_byte` collapses the "timeout" and "end-of-stream" cases the spec
/// describes into a single `Ok(None)` — the Receiver loops identically either
/// way and relies on the multiplexer's teardown signal for termination.
pub trait Transport: Send {
    /// Read a single byte, blocking up to the transport's configured timeout.
    ///
    /// Returns `Ok(None)` if no byte arrived in time. Returns `Err` only for a
    /// fatal, non-retryable transport failure.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;

    /// Write every byte of `buf`, blocking as needed. Must not interleave
    /// partial writes from concurrent callers — serialize at a higher layer
    /// (the Framer holds a lock around this call).
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
}

/// Wraps a real serial port opened by the caller (e.g. via
/// `serialport::new(path, baud).open()`), with its own read timeout already
/// configured on the port.
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialTransport {
    /// Wrap an already-opened, already-configured serial port.
    pub fn new(port: Box<dyn serialport::SerialPort>) -> Self {
        Self { port }
    }
}

impl Transport for SerialTransport {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match io::Read::read(&mut self.port, &mut byte) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(byte[0])),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        io::Write::write_all(&mut self.port, buf)
    }
}

/// An in-process duplex transport backed by `std::sync::mpsc`, used for tests
/// and the CLI's hardware-free demo mode.
pub struct LoopbackTransport {
    rx: Receiver<u8>,
    tx: Sender<u8>,
    timeout: Duration,
}

impl LoopbackTransport {
    /// Build a connected pair: bytes written to one side's `tx` are read from
    /// the other side's `rx`, and vice versa.
    pub fn pair(timeout: Duration) -> (Self, Self) {
        let (tx_a, rx_b) = mpsc::channel();
        let (tx_b, rx_a) = mpsc::channel();
        (
            Self {
                rx: rx_a,
                tx: tx_a,
                timeout,
            },
            Self {
                rx: rx_b,
                tx: tx_b,
                timeout,
            },
        )
    }
}

impl Transport for LoopbackTransport {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        match self.rx.recv_timeout(self.timeout) {
            Ok(byte) => Ok(Some(byte)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        for &byte in buf {
            self.tx
                .send(byte)
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "loopback peer dropped"))?;
        }
        Ok(())
    }
}
