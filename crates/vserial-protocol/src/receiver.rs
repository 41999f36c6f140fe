//! The HDLC receive side: a four-state automaton that turns a raw byte
//! stream into verified, unescaped payloads.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::{trace, warn};
use vserial_core::{ESC, ESC_MOD, FLAG, IDLE, MIN_FRAME_LEN, Result, Transport};

use crate::fcs32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    OutOfSync,
    Idle,
    GetFrame,
    GetEsc,
}

/// Nonnegative, monotonically increasing counters describing everything the
/// Receiver has seen. Never reset; callers snapshot by cloning.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Statistics {
    /// Total bytes consumed from the transport.
    pub bytes: u64,
    /// Bytes received in `Idle` that were neither `FLAG` nor `IDLE`.
    pub unframed: u64,
    /// Closing `FLAG` seen with an empty accumulator.
    pub empty: u64,
    /// `FLAG` seen while in `GetEsc` (protocol violation).
    pub escaped_flag: u64,
    /// `ESC` seen while in `GetEsc` (protocol violation, resyncs to `OutOfSync`).
    pub double_escape: u64,
    /// Pump got no byte from the transport before its timeout.
    pub timeout: u64,
    /// Frame too short to contain an FCS, or an escape-table violation.
    pub invalid: u64,
    /// Frame length sufficient but the FCS-32 check failed.
    pub fcs: u64,
}

/// HDLC receive-side state machine, bound to one transport for its lifetime.
pub struct Receiver<T: Transport> {
    transport: T,
    state: State,
    frame: Vec<u8>,
    completed: VecDeque<Vec<u8>>,
    statistics: Statistics,
}

impl<T: Transport> Receiver<T> {
    /// Build a receiver bound to `transport`, starting in `Idle`.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: State::Idle,
            frame: Vec::new(),
            completed: VecDeque::new(),
            statistics: Statistics::default(),
        }
    }

    /// A snapshot of the current counters.
    pub fn statistics(&self) -> Statistics {
        self.statistics
    }

    /// Read bytes from the transport until a payload completes or the
    /// transport reports no byte available. The sole consumer of the
    /// transport's read side; reads are length-1 by construction.
    pub fn get(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            let byte = match self.transport.read_byte()? {
                Some(b) => b,
                None => {
                    self.statistics.timeout += 1;
                    return Ok(None);
                }
            };
            self.statistics.bytes += 1;
            self.process_byte(byte);
            if let Some(frame) = self.completed.pop_front() {
                return Ok(Some(frame));
            }
        }
    }

    fn set_state(&mut self, next: State) {
        if next == State::GetFrame && self.state != State::GetEsc {
            self.frame.clear();
        }
        self.state = next;
    }

    fn process_byte(&mut self, c: u8) {
        match self.state {
            State::OutOfSync => self.process_out_of_sync(c),
            State::Idle => self.process_idle(c),
            State::GetFrame => self.process_get_frame(c),
            State::GetEsc => self.process_get_esc(c),
        }
    }

    fn process_out_of_sync(&mut self, c: u8) {
        if c == FLAG {
            self.set_state(State::GetFrame);
        }
    }

    fn process_idle(&mut self, c: u8) {
        match c {
            IDLE => {}
            FLAG => self.set_state(State::GetFrame),
            _ => {
                self.statistics.unframed += 1;
            }
        }
    }

    fn process_get_frame(&mut self, c: u8) {
        match c {
            FLAG => self.close_frame(),
            ESC => self.set_state(State::GetEsc),
            _ => self.frame.push(c),
        }
    }

    fn close_frame(&mut self) {
        if self.frame.is_empty() {
            self.statistics.empty += 1;
            self.set_state(State::GetFrame);
            return;
        }

        if self.frame.len() < MIN_FRAME_LEN {
            self.statistics.invalid += 1;
            warn!(len = self.frame.len(), "frame shorter than FCS, dropped");
        } else if fcs32::verify(&self.frame) {
            let payload_len = self.frame.len() - 4;
            trace!(payload_len, "frame verified");
            self.completed.push_back(self.frame[..payload_len].to_vec());
        } else {
            self.statistics.fcs += 1;
            warn!("frame FCS mismatch, dropped");
        }

        self.set_state(State::GetFrame);
    }

    fn process_get_esc(&mut self, c: u8) {
        match c {
            FLAG => {
                self.statistics.escaped_flag += 1;
                self.statistics.invalid += 1;
                warn!("escaped flag byte, frame aborted");
                self.frame.clear();
                self.set_state(State::GetFrame);
            }
            ESC => {
                self.statistics.double_escape += 1;
                self.statistics.invalid += 1;
                warn!("double escape, out of sync");
                self.set_state(State::OutOfSync);
            }
            _ => {
                self.frame.push(c ^ ESC_MOD);
                self.set_state(State::GetFrame);
            }
        }
    }
}
