//! Per-channel flag bits - the output protocol of everyday slot bookkeeping.
//!
//! The original driver carried these as a single `uint32_t flags` with
//! `(1 << N)` constants. We keep the same eleven named bits, typed.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Bitset of per-`ChannelSlot` condition flags.
    ///
    /// # Example
    ///
    /// ```
    /// use isdn_span_engine::flags::ChannelFlags;
    ///
    /// let f = ChannelFlags::GLARE | ChannelFlags::SENT_PROCEED;
    /// assert!(f.contains(ChannelFlags::GLARE));
    /// assert!(!f.contains(ChannelFlags::LOCAL_REL));
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ChannelFlags: u32 {
        const NONE = 0;

        /// Reset was received from the peer and is pending acknowledgement.
        const RESET_RX = 1 << 0;
        /// We sent a reset and are waiting for the peer's acknowledgement.
        const RESET_TX = 1 << 1;
        /// The peer initiated release of the current call.
        const REMOTE_REL = 1 << 2;
        /// We initiated release of the current call.
        const LOCAL_REL = 1 << 3;
        /// The peer aborted the call out of band (link-level, not Q.931 DISC/REL).
        const REMOTE_ABORT = 1 << 4;
        /// We aborted the call out of band.
        const LOCAL_ABORT = 1 << 5;
        /// Simultaneous seizure: an inbound SETUP collided with our outbound one.
        const GLARE = 1 << 6;
        /// Release of this slot has been deferred (e.g. pending facility timer).
        const DELAYED_REL = 1 << 7;
        /// PROCEEDING has already been sent for the current call.
        const SENT_PROCEED = 1 << 8;
        /// DISCONNECT is queued to be sent on the next loop pass.
        const SEND_DISC = 1 << 9;
        /// BRI layer-1 activation was requested and is in flight.
        const ACTIVATING = 1 << 10;
    }
}

impl Default for ChannelFlags {
    fn default() -> Self {
        ChannelFlags::NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glare_implies_combinable_with_other_bits() {
        let f = ChannelFlags::GLARE | ChannelFlags::SENT_PROCEED;
        assert!(f.contains(ChannelFlags::GLARE));
        assert!(f.contains(ChannelFlags::SENT_PROCEED));
        assert!(!f.contains(ChannelFlags::LOCAL_REL));
    }

    #[test]
    fn default_is_none() {
        assert_eq!(ChannelFlags::default(), ChannelFlags::NONE);
    }
}
