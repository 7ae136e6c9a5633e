//! Translates Q.921/Q.931 stack callbacks into `StackEvent`s on a span's
//! queue (§4.8).
//!
//! The signalling stack calls back on its own thread (one per D-channel);
//! this adapter is the only thing that thread touches. It never blocks and
//! never reaches into a `ChannelSlot` directly - it only submits events for
//! the span loop to process.

use isdn_wire::{CallerData, ChannelId};
use tracing::warn;

use crate::queue::{CallEvent, StackEvent};
use crate::span::SpanHandle;

/// Callback sink handed to the signalling stack for one span.
pub struct StackAdapter {
    handle: SpanHandle,
}

impl StackAdapter {
    pub fn new(handle: SpanHandle) -> Self {
        Self { handle }
    }

    fn submit(&self, event: StackEvent) {
        if let Err(err) = self.handle.submit(CallEvent::Stack(event)) {
            warn!(span = self.handle.span_id(), error = %err, "dropped stack event, queue full or closed");
        }
    }

    pub fn setup_indication(&self, chan_id: ChannelId, caller_data: CallerData, peer_inst: u32) {
        self.submit(StackEvent::SetupIndication { chan_id, caller_data, peer_inst });
    }

    pub fn proceeding_indication(&self, chan_id: ChannelId) {
        self.submit(StackEvent::ProceedingIndication { chan_id });
    }

    pub fn alerting_indication(&self, chan_id: ChannelId) {
        self.submit(StackEvent::AlertingIndication { chan_id });
    }

    pub fn connect_indication(&self, chan_id: ChannelId) {
        self.submit(StackEvent::ConnectIndication { chan_id });
    }

    pub fn connect_ack(&self, chan_id: ChannelId, peer_inst: u32) {
        self.submit(StackEvent::ConnectAck { chan_id, peer_inst });
    }

    pub fn disconnect_indication(&self, chan_id: ChannelId, cause: u8) {
        self.submit(StackEvent::DisconnectIndication { chan_id, cause });
    }

    pub fn release_indication(&self, chan_id: ChannelId, cause: u8) {
        self.submit(StackEvent::ReleaseIndication { chan_id, cause });
    }

    pub fn release_complete_indication(&self, chan_id: ChannelId, cause: u8) {
        self.submit(StackEvent::ReleaseCompleteIndication { chan_id, cause });
    }

    pub fn restart_indication(&self, chan_id: ChannelId) {
        self.submit(StackEvent::RestartIndication { chan_id });
    }

    pub fn layer2_up(&self) {
        self.submit(StackEvent::Layer2Up);
    }

    pub fn layer2_down(&self) {
        self.submit(StackEvent::Layer2Down);
    }
}
