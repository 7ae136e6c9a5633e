//! Transition effects - the output protocol from a state machine `step()`.
//!
//! `StateMachine::step` never performs I/O or calls the application directly;
//! it returns a `TransitionEffects` bitmask describing what the span loop
//! (`SpanEngine::state_advance`) must do next. This keeps the FSM a pure
//! function of `(state, trigger) -> (state, effects)`, easy to test without
//! a running engine.

use bitflags::bitflags;

bitflags! {
    /// Set of effects produced by a single FSM transition.
    ///
    /// Effects are additive - one transition can request several. The span
    /// loop checks each bit and performs the corresponding action.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TransitionEffects: u32 {
        const NONE = 0;

        // ---------------------------------------------------------------
        // Application signal callbacks (§6 upstream interface)
        // ---------------------------------------------------------------
        const SIGNAL_START = 1 << 0;
        const SIGNAL_PROGRESS = 1 << 1;
        const SIGNAL_PROGRESS_MEDIA = 1 << 2;
        const SIGNAL_UP = 1 << 3;
        const SIGNAL_STOP = 1 << 4;
        const SIGNAL_ALARM_TRAP = 1 << 5;
        const SIGNAL_ALARM_CLEAR = 1 << 6;

        // ---------------------------------------------------------------
        // D-channel writes (§4.3)
        // ---------------------------------------------------------------
        const SEND_FRAME = 1 << 7;

        // ---------------------------------------------------------------
        // Registry / timer bookkeeping
        // ---------------------------------------------------------------
        const RELEASE_REGISTRY_ENTRIES = 1 << 8;
        const RESCHEDULE_FACILITY_TIMER = 1 << 9;
        const CANCEL_FACILITY_TIMER = 1 << 10;
        const CLEAR_CALL_DATA = 1 << 11;

        // ---------------------------------------------------------------
        // Span-wide escalation
        // ---------------------------------------------------------------
        const SCHEDULE_SPAN_RESTART = 1 << 12;
    }
}

impl Default for TransitionEffects {
    fn default() -> Self {
        TransitionEffects::NONE
    }
}

impl TransitionEffects {
    /// True if any of the application-facing signal bits are set.
    pub fn has_app_signal(&self) -> bool {
        self.intersects(
            TransitionEffects::SIGNAL_START
                | TransitionEffects::SIGNAL_PROGRESS
                | TransitionEffects::SIGNAL_PROGRESS_MEDIA
                | TransitionEffects::SIGNAL_UP
                | TransitionEffects::SIGNAL_STOP
                | TransitionEffects::SIGNAL_ALARM_TRAP
                | TransitionEffects::SIGNAL_ALARM_CLEAR,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_none() {
        assert_eq!(TransitionEffects::default(), TransitionEffects::NONE);
    }

    #[test]
    fn combine_and_query() {
        let e = TransitionEffects::SIGNAL_PROGRESS | TransitionEffects::SEND_FRAME;
        assert!(e.contains(TransitionEffects::SIGNAL_PROGRESS));
        assert!(e.has_app_signal());
        assert!(!TransitionEffects::SEND_FRAME.has_app_signal());
    }
}
