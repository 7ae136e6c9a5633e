//! Wire Types - Level 1 Foundation Types (zero workspace dependencies)
//!
//! This crate contains the pure data structures and byte-exact wire format
//! shared by the span engine and its SS7-boost transport. It follows the
//! same rule as any Level 1 foundation crate: **no business logic**, only
//! data structures, constants, and (de)serialization.
//!
//! ## Architecture Level: LEVEL 1 (Foundation)
//!
//! All other crates in the workspace depend on this one; this crate depends
//! on nothing else in the workspace. Adding a workspace dependency here
//! would create circular dependency hell.
//!
//! ## Contents
//!
//! - Shared identifiers (span/channel ids, call instance ids)
//! - Switch variant and signalling role enums
//! - Caller data carried on `Dial`
//! - The byte-exact `Ss7bcEvent` wire struct and its manual codec

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// IDENTIFIERS & LIMITS
// ============================================================================

/// Maximum local/peer call instance id. Instance ids live in `[1, MAX_INSTID]`;
/// `0` on the peer side means "not yet assigned".
pub const MAX_INSTID: u32 = 0xFFFF;

/// Maximum B-channels carried by a single span (E1 PRI: 30B + D on 16).
pub const MAX_CHANNELS_PER_SPAN: usize = 32;

/// Maximum spans that may share one NFAS D-channel group.
pub const MAX_SPANS_PER_NFAS_LINK: usize = 16;

/// Maximum `local_numbers` entries carried in a `SpanConfig`.
pub const MAX_LOCAL_NUMBERS: usize = 8;

/// `(span_id, channel_id)` — logical identity of one B-channel.
pub type SpanId = u16;
pub type ChannelId = u16;

/// Physical `(span, chan)` pair, stable across re-signaling of the same slot.
pub type PhysSpan = u16;
pub type PhysChan = u16;

/// Connection endpoint selector for multipoint BRI (0-127); 0 on point-to-point.
pub type Ces = u8;

// ============================================================================
// SIGNALLING VARIANT & ROLE
// ============================================================================

/// ISDN signaling switch variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwitchVariant {
    Ni2,
    FiveEss,
    FourEss,
    Dms100,
    Etsi,
    Qsig,
    Insnet,
}

/// Which side of the link this span plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignallingRole {
    /// Customer premises equipment: originates from the subscriber side.
    Cpe,
    /// Network side: the switch.
    Net,
}

// ============================================================================
// CALLER DATA
// ============================================================================

/// Caller data supplied by the application on a dial request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerData {
    pub cid_num: String,
    pub ani: String,
    pub dnis: String,
    pub bearer_cap: u8,
    pub user_layer1: u8,
    pub screening: u8,
    pub presentation: u8,
}

// ============================================================================
// SS7-BOOST WIRE FORMAT
// ============================================================================

/// Maximum digits carried in a called/calling number field of a boost event.
pub const SS7BC_MAX_DIGITS: usize = 25;

/// Errors raised while decoding a wire event. Never contains business logic -
/// only "the bytes don't describe a well-formed `Ss7bcEvent`".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("short read: need at least {need} bytes, have {have}")]
    ShortRead { need: usize, have: usize },

    #[error("digit field length {0} exceeds SS7BC_MAX_DIGITS ({SS7BC_MAX_DIGITS})")]
    DigitsTooLong(usize),

    #[error("unknown event id {0}")]
    UnknownEventId(u8),
}

/// Event ids carried in `Ss7bcEvent::event_id`. Numeric values are stable -
/// they cross the wire to a gateway that was never Rust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum BoostEventId {
    CallStart = 1,
    CallStartAck = 2,
    CallStartNack = 3,
    CallStartNackAck = 4,
    CallStopped = 5,
    CallStoppedAck = 6,
    CallAnswered = 7,
    Heartbeat = 8,
    SystemRestart = 9,
    SystemRestartAck = 10,
    InsertCheckLoop = 11,
    RemoveCheckLoop = 12,
    AutoCallGapAbate = 13,
}

impl BoostEventId {
    pub fn from_u8(v: u8) -> Result<Self, WireError> {
        use BoostEventId::*;
        Ok(match v {
            1 => CallStart,
            2 => CallStartAck,
            3 => CallStartNack,
            4 => CallStartNackAck,
            5 => CallStopped,
            6 => CallStoppedAck,
            7 => CallAnswered,
            8 => Heartbeat,
            9 => SystemRestart,
            10 => SystemRestartAck,
            11 => InsertCheckLoop,
            12 => RemoveCheckLoop,
            13 => AutoCallGapAbate,
            other => return Err(WireError::UnknownEventId(other)),
        })
    }
}

/// A length-prefixed digit string, fixed capacity, matching the gateway's
/// on-wire layout for `called_number_digits` / `calling_number_digits`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DigitField {
    digits: String,
}

impl DigitField {
    pub fn new(digits: impl Into<String>) -> Result<Self, WireError> {
        let digits = digits.into();
        if digits.len() > SS7BC_MAX_DIGITS {
            return Err(WireError::DigitsTooLong(digits.len()));
        }
        Ok(Self { digits })
    }

    pub fn as_str(&self) -> &str {
        &self.digits
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.digits.len() as u8);
        out.extend_from_slice(self.digits.as_bytes());
        // Pad to a fixed slot so the record stays a known, constant size.
        for _ in self.digits.len()..SS7BC_MAX_DIGITS {
            out.push(0);
        }
    }

    fn decode(buf: &[u8]) -> Result<(Self, &[u8]), WireError> {
        let (len_byte, rest) = buf
            .split_first()
            .ok_or(WireError::ShortRead { need: 1, have: 0 })?;
        let len = *len_byte as usize;
        if len > SS7BC_MAX_DIGITS {
            return Err(WireError::DigitsTooLong(len));
        }
        if rest.len() < SS7BC_MAX_DIGITS {
            return Err(WireError::ShortRead {
                need: SS7BC_MAX_DIGITS,
                have: rest.len(),
            });
        }
        let digits = String::from_utf8_lossy(&rest[..len]).into_owned();
        Ok((Self { digits }, &rest[SS7BC_MAX_DIGITS..]))
    }
}

/// Byte-exact `ss7bc_event_t` wire record. Field order and widths are fixed
/// by the deployed gateway; this struct must not be reordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ss7bcEvent {
    pub event_id: u8,
    pub fseqno: u32,
    pub call_setup_id: u16,
    pub span: u8,
    pub chan: u8,
    pub release_cause: u8,
    pub called_number_digits: DigitField,
    pub calling_number_digits: DigitField,
    pub flags: u16,
}

impl Ss7bcEvent {
    pub const WIRE_LEN: usize = 1 + 4 + 2 + 1 + 1 + 1 + (1 + SS7BC_MAX_DIGITS) * 2 + 2;

    /// Encode to network (big-endian) byte order, matching the gateway.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::WIRE_LEN);
        out.push(self.event_id);
        out.extend_from_slice(&self.fseqno.to_be_bytes());
        out.extend_from_slice(&self.call_setup_id.to_be_bytes());
        out.push(self.span);
        out.push(self.chan);
        out.push(self.release_cause);
        self.called_number_digits.encode(&mut out);
        self.calling_number_digits.encode(&mut out);
        out.extend_from_slice(&self.flags.to_be_bytes());
        out
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < Self::WIRE_LEN {
            return Err(WireError::ShortRead {
                need: Self::WIRE_LEN,
                have: buf.len(),
            });
        }
        let event_id = buf[0];
        let fseqno = u32::from_be_bytes(buf[1..5].try_into().unwrap());
        let call_setup_id = u16::from_be_bytes(buf[5..7].try_into().unwrap());
        let span = buf[7];
        let chan = buf[8];
        let release_cause = buf[9];
        let rest = &buf[10..];
        let (called_number_digits, rest) = DigitField::decode(rest)?;
        let (calling_number_digits, rest) = DigitField::decode(rest)?;
        if rest.len() < 2 {
            return Err(WireError::ShortRead {
                need: 2,
                have: rest.len(),
            });
        }
        let flags = u16::from_be_bytes(rest[0..2].try_into().unwrap());
        Ok(Self {
            event_id,
            fseqno,
            call_setup_id,
            span,
            chan,
            release_cause,
            called_number_digits,
            calling_number_digits,
            flags,
        })
    }
}
