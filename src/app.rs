//! Upstream application interface (§6).
//!
//! The engine never calls into application code directly from inside the
//! FSM - only the span loop, after translating a `TransitionEffects` bit
//! into one of these calls. Keeping the trait object-safe lets a single
//! engine serve many different call-handling applications without a
//! generic parameter threaded through every module.

use isdn_wire::{CallerData, ChannelId, SpanId};

/// Signals the engine reports upward to the application, one per
/// `TransitionEffects::SIGNAL_*` bit.
pub trait AppSignalSink: Send + Sync {
    /// A new call (inbound or outbound) has started.
    fn on_start(&self, span_id: SpanId, chan_id: ChannelId, caller_data: &CallerData);

    /// Outbound call progress, no media cut through.
    fn on_progress(&self, span_id: SpanId, chan_id: ChannelId);

    /// Outbound call progress, with in-band media/tones flowing.
    fn on_progress_media(&self, span_id: SpanId, chan_id: ChannelId);

    /// The call is connected end to end.
    fn on_up(&self, span_id: SpanId, chan_id: ChannelId);

    /// The call has ended.
    fn on_stop(&self, span_id: SpanId, chan_id: ChannelId, cause: u8);

    /// The span has raised an alarm condition (layer-2/1 down, restart).
    fn on_alarm_trap(&self, span_id: SpanId);

    /// A previously raised alarm has cleared.
    fn on_alarm_clear(&self, span_id: SpanId);

    /// Request a free channel on which to place an outbound call. Returning
    /// `None` means the application declines to originate (no channel
    /// available, policy rejection, etc).
    fn request_channel(&self, span_id: SpanId, caller_data: &CallerData) -> Option<ChannelId>;
}

/// A sink that discards every signal. Useful for engine construction in
/// tests or tools that only exercise the FSM/registry layers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAppSignalSink;

impl AppSignalSink for NullAppSignalSink {
    fn on_start(&self, _span_id: SpanId, _chan_id: ChannelId, _caller_data: &CallerData) {}
    fn on_progress(&self, _span_id: SpanId, _chan_id: ChannelId) {}
    fn on_progress_media(&self, _span_id: SpanId, _chan_id: ChannelId) {}
    fn on_up(&self, _span_id: SpanId, _chan_id: ChannelId) {}
    fn on_stop(&self, _span_id: SpanId, _chan_id: ChannelId, _cause: u8) {}
    fn on_alarm_trap(&self, _span_id: SpanId) {}
    fn on_alarm_clear(&self, _span_id: SpanId) {}

    fn request_channel(&self, _span_id: SpanId, _caller_data: &CallerData) -> Option<ChannelId> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sink_declines_channel_requests() {
        let sink = NullAppSignalSink;
        assert_eq!(sink.request_channel(1, &CallerData::default()), None);
    }
}
