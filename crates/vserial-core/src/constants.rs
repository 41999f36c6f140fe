//! Wire-level byte constants for the HDLC-style framing format.
//!
//! These match RFC 1662's byte-stuffing conventions and the values used by the
//! protocol this crate formalizes.

/// Frame delimiter. Opens and closes every frame on the wire.
pub const FLAG: u8 = 0x7E;

/// Escape prefix. A following byte has been XORed with [`ESC_MOD`].
pub const ESC: u8 = 0x7D;

/// Inter-frame fill byte, silently consumed while the receiver is `Idle`.
pub const IDLE: u8 = 0xFF;

/// XOR mask applied to an escaped byte.
pub const ESC_MOD: u8 = 0x20;

/// FCS-32 value a complete frame (body + appended FCS) reduces to when intact.
pub const GOOD_FINAL: u32 = 0xDEBB20E3;

/// Minimum unescaped frame length: the four FCS bytes alone, zero payload.
pub const MIN_FRAME_LEN: usize = 4;

/// Minimum unescaped frame length the multiplexer needs to route a frame:
/// channel byte, control byte, and the four FCS bytes.
pub const MIN_ROUTABLE_FRAME_LEN: usize = 6;
