//! `ChannelSlot` — per-B-channel call-control state held by one span.
//!
//! One slot exists per physical channel for the lifetime of the span; calls
//! come and go through it, but the slot itself is never reallocated.

use std::time::Instant;

use isdn_wire::{CallerData, ChannelId, PhysChan};

use crate::fsm::CallState;
use crate::flags::ChannelFlags;
use crate::timer::TimerHandle;

/// Everything the registry and FSM need to know about one B-channel.
#[derive(Debug, Clone)]
pub struct ChannelSlot {
    pub chan_id: ChannelId,
    pub phys_chan: PhysChan,
    pub state: CallState,
    pub flags: ChannelFlags,

    /// Our own call instance id, assigned on `open()`.
    pub local_inst: Option<u32>,
    /// The peer's call instance id, bound once the gateway reports it.
    pub peer_inst: Option<u32>,

    /// Caller data for the call currently occupying the slot, if any.
    pub caller_data: Option<CallerData>,

    /// Facility-IE response timer, if the pending call is waiting on one.
    pub facility_timer: Option<TimerHandle>,
    /// T3/channel-restart timer, if one is outstanding.
    pub restart_timer: Option<TimerHandle>,

    /// Glare buffer: an inbound SETUP that arrived while we had already
    /// seized this channel outbound. Held until the collision resolves
    /// (§4.2 arbitration).
    pub glare_buffer: Option<CallerData>,

    pub opened_at: Option<Instant>,
}

impl ChannelSlot {
    pub fn new(chan_id: ChannelId, phys_chan: PhysChan) -> Self {
        Self {
            chan_id,
            phys_chan,
            state: CallState::Down,
            flags: ChannelFlags::NONE,
            local_inst: None,
            peer_inst: None,
            caller_data: None,
            facility_timer: None,
            restart_timer: None,
            glare_buffer: None,
            opened_at: None,
        }
    }

    /// True if this slot is not currently serving a call.
    pub fn is_idle(&self) -> bool {
        self.state == CallState::Down && self.local_inst.is_none() && self.peer_inst.is_none()
    }

    /// Claim the slot for a new call, local or remote.
    pub fn open(&mut self, local_inst: u32, caller_data: Option<CallerData>) {
        self.local_inst = Some(local_inst);
        self.caller_data = caller_data;
        self.opened_at = Some(Instant::now());
    }

    /// Every outstanding timer handle recorded on this slot. The caller
    /// (span loop) is responsible for actually cancelling them against the
    /// `TimerWheel`; this just lists what's live.
    pub fn outstanding_timers(&self) -> Vec<TimerHandle> {
        [self.facility_timer, self.restart_timer]
            .into_iter()
            .flatten()
            .collect()
    }

    /// Reset the slot to idle, cancelling every outstanding timer handle
    /// recorded on it (§4.1 / §9 redesign: uniform cancellation regardless
    /// of timer kind).
    pub fn clear_call_data(&mut self) {
        self.state = CallState::Down;
        self.flags = ChannelFlags::NONE;
        self.local_inst = None;
        self.peer_inst = None;
        self.caller_data = None;
        self.facility_timer = None;
        self.restart_timer = None;
        self.glare_buffer = None;
        self.opened_at = None;
    }

    /// Mark release complete. Distinct from `clear_call_data` in name only -
    /// both fully reset the slot - kept separate because the span loop calls
    /// this from the `RELEASE_REGISTRY_ENTRIES` effect path specifically.
    pub fn done(&mut self) {
        self.clear_call_data();
    }
}
