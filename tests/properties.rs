//! Property-based tests for the invariants every call-instance id allocation
//! and every FSM run must satisfy, independent of any one example sequence.

use proptest::prelude::*;

use isdn_span_engine::fsm::{CallState, StateMachine, Trigger};
use isdn_span_engine::registry::CallInstanceRegistry;

proptest! {
    /// Invariant 2: at most one channel ever claims a given local instance
    /// id at a time - allocating N ids and releasing them in any order
    /// never produces a duplicate live mapping.
    #[test]
    fn registry_never_double_claims_an_id(
        chan_ids in prop::collection::vec(0u16..64, 1..40),
    ) {
        let mut reg = CallInstanceRegistry::new();
        let mut live = std::collections::HashSet::new();

        for chan_id in chan_ids {
            let id = reg.alloc_local(chan_id).unwrap();
            prop_assert!(live.insert(id), "id {} was handed out twice while still live", id);
            reg.release(id, None);
            live.remove(&id);
        }
    }

    /// Invariant 6: driving an outbound SETUP through any legal sequence of
    /// progress indications ends in exactly one terminal signal - either
    /// `UP` (connect) or `STOP` (disconnect before connect) - never both,
    /// never neither.
    #[test]
    fn outbound_setup_reaches_exactly_one_terminal_signal(
        use_proceeding in any::<bool>(),
        use_alerting in any::<bool>(),
        disconnect_before_connect in any::<bool>(),
    ) {
        let fsm = StateMachine;
        let mut state = CallState::Down;
        let mut saw_up = false;
        let mut saw_stop = false;

        let (s, _) = fsm.step(state, Trigger::DialRequest).unwrap();
        state = s;

        if use_proceeding {
            let (s, _) = fsm.step(state, Trigger::ProceedingIndication).unwrap();
            state = s;
        }
        if use_alerting {
            let (s, _) = fsm.step(state, Trigger::AlertingIndication).unwrap();
            state = s;
        }

        if disconnect_before_connect {
            let (s, e) = fsm.step(state, Trigger::DisconnectIndication).unwrap();
            state = s;
            saw_stop |= e.contains(isdn_span_engine::effects::TransitionEffects::SIGNAL_STOP);
            let (s, _) = fsm.step(state, Trigger::ReleaseIndication).unwrap();
            state = s;
            let (s, e) = fsm.step(state, Trigger::ReleaseCompleteIndication).unwrap();
            state = s;
            saw_stop |= e.contains(isdn_span_engine::effects::TransitionEffects::SIGNAL_STOP);
        } else {
            let (s, e) = fsm.step(state, Trigger::ConnectIndication).unwrap();
            state = s;
            saw_up |= e.contains(isdn_span_engine::effects::TransitionEffects::SIGNAL_UP);
        }

        prop_assert_eq!(saw_up, !disconnect_before_connect);
        prop_assert_eq!(saw_stop, disconnect_before_connect);
        prop_assert!(state == CallState::Up || state == CallState::Down);
    }
}
