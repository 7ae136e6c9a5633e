//! The per-channel call-control state machine.
//!
//! `step` is a pure function of `(state, trigger) -> (state, effects)`: it
//! never touches a socket, a timer, or the application callback table. The
//! span loop (`SpanEngine::state_advance`) owns all of that and only asks
//! this module "given what just happened, what state are we in and what
//! should I do about it".

use std::fmt;

use thiserror::Error;

use crate::effects::TransitionEffects;

/// Per-channel call state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallState {
    /// No call on this channel.
    Down,
    /// Outbound SETUP sent, awaiting a response.
    Dialing,
    /// Inbound SETUP received, awaiting the application's decision.
    Ring,
    /// Outbound call has been acknowledged as in-progress (PROCEEDING).
    Progress,
    /// Like `Progress`, but early media / in-band tones are flowing.
    ProgressMedia,
    /// Call is connected (ANSWER / CONNECT received or sent).
    Up,
    /// A local or remote hangup has been initiated; awaiting confirmation.
    Hangup,
    /// Release handshake is in flight; the slot is not yet free.
    Terminating,
    /// The channel itself is being reset (layer-2 restart or T3 expiry).
    Restart,
    /// Call is held (network-initiated suspend).
    Hold,
    /// Call is suspended pending a resume within the suspend timeout.
    Suspended,
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A stimulus driving the state machine. Roughly one variant per
/// `StackEvent`/`AppCommand`/timer-kind that can reach a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    DialRequest,
    SetupIndication,
    ProceedingIndication,
    AlertingIndication,
    AlertingIndicationWithMedia,
    ConnectIndication,
    ConnectAck,
    AnswerRequest,
    HangupRequest,
    DisconnectIndication,
    ReleaseIndication,
    ReleaseCompleteIndication,
    FacilityTimeout,
    RestartRequest,
    RestartComplete,
    GlareDetected,
    GlareWon,
    GlareLost,
    HoldIndication,
    SuspendIndication,
    ResumeIndication,
    SuspendTimeout,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FsmFault {
    #[error("trigger {trigger:?} is not valid in state {state}")]
    InvalidTransition { state: CallState, trigger: Trigger },

    #[error("glare detected on a channel already occupied by an active call")]
    GlareOnActiveCall,
}

/// Pure per-channel state machine. Holds no I/O handles; `step` is the only
/// entry point, called once per inbound trigger by the span loop.
#[derive(Debug, Default)]
pub struct StateMachine;

impl StateMachine {
    /// Advance `state` in response to `trigger`, returning the next state
    /// and the effects the span loop must carry out.
    pub fn step(
        &self,
        state: CallState,
        trigger: Trigger,
    ) -> Result<(CallState, TransitionEffects), FsmFault> {
        use CallState::*;
        use Trigger::*;

        let (next, effects) = match (state, trigger) {
            // ---------------------------------------------------------
            // Outbound call setup
            // ---------------------------------------------------------
            (Down, DialRequest) => (Dialing, TransitionEffects::SEND_FRAME),
            (Dialing, ProceedingIndication) => (Progress, TransitionEffects::SIGNAL_PROGRESS),
            (Dialing, AlertingIndication) => (Progress, TransitionEffects::SIGNAL_PROGRESS),
            (Dialing, AlertingIndicationWithMedia) => {
                (ProgressMedia, TransitionEffects::SIGNAL_PROGRESS_MEDIA)
            }
            (Dialing, ConnectIndication) => {
                (Up, TransitionEffects::SIGNAL_UP | TransitionEffects::SEND_FRAME)
            }
            (Progress, AlertingIndication) => (Progress, TransitionEffects::SIGNAL_PROGRESS),
            (Progress, AlertingIndicationWithMedia) => {
                (ProgressMedia, TransitionEffects::SIGNAL_PROGRESS_MEDIA)
            }
            (Progress, ConnectIndication) => {
                (Up, TransitionEffects::SIGNAL_UP | TransitionEffects::SEND_FRAME)
            }
            (ProgressMedia, ConnectIndication) => {
                (Up, TransitionEffects::SIGNAL_UP | TransitionEffects::SEND_FRAME)
            }

            // ---------------------------------------------------------
            // Inbound call setup
            // ---------------------------------------------------------
            (Down, SetupIndication) => (Ring, TransitionEffects::SIGNAL_START),
            (Down, GlareDetected) => return Err(FsmFault::GlareOnActiveCall),
            (Ring, AnswerRequest) => {
                (Up, TransitionEffects::SIGNAL_UP | TransitionEffects::SEND_FRAME)
            }
            (Ring, HangupRequest) => (
                Terminating,
                TransitionEffects::SEND_FRAME | TransitionEffects::RESCHEDULE_FACILITY_TIMER,
            ),

            // ---------------------------------------------------------
            // Glare arbitration (§4.2): the losing side folds back to
            // `Ring` to process the peer's SETUP as an ordinary inbound
            // call; the winning side continues its own outbound attempt.
            // ---------------------------------------------------------
            (Dialing, GlareDetected) => (Dialing, TransitionEffects::NONE),
            (Dialing, GlareWon) => (Dialing, TransitionEffects::SEND_FRAME),
            (Dialing, GlareLost) => (Ring, TransitionEffects::SIGNAL_START),

            // ---------------------------------------------------------
            // Facility IE timeout (§4.4 / §9): cancellable uniformly,
            // fires only while waiting in Ring or Dialing for a facility
            // response.
            // ---------------------------------------------------------
            (Ring, FacilityTimeout) => (
                Terminating,
                TransitionEffects::SEND_FRAME | TransitionEffects::CANCEL_FACILITY_TIMER,
            ),
            (Dialing, FacilityTimeout) => (
                Terminating,
                TransitionEffects::SEND_FRAME | TransitionEffects::CANCEL_FACILITY_TIMER,
            ),

            // ---------------------------------------------------------
            // Teardown, from any active state
            // ---------------------------------------------------------
            (Up, HangupRequest) | (Up, DisconnectIndication) => {
                (Hangup, TransitionEffects::SEND_FRAME)
            }
            (Progress, HangupRequest) | (Progress, DisconnectIndication) => {
                (Hangup, TransitionEffects::SEND_FRAME)
            }
            (ProgressMedia, HangupRequest) | (ProgressMedia, DisconnectIndication) => {
                (Hangup, TransitionEffects::SEND_FRAME)
            }
            (Dialing, DisconnectIndication) => (Hangup, TransitionEffects::SEND_FRAME),
            (Hangup, ReleaseIndication) => (
                Terminating,
                TransitionEffects::SEND_FRAME | TransitionEffects::RESCHEDULE_FACILITY_TIMER,
            ),
            (Hangup, ReleaseCompleteIndication) => (
                Down,
                TransitionEffects::SIGNAL_STOP
                    | TransitionEffects::RELEASE_REGISTRY_ENTRIES
                    | TransitionEffects::CLEAR_CALL_DATA,
            ),
            (Terminating, ReleaseCompleteIndication) => (
                Down,
                TransitionEffects::SIGNAL_STOP
                    | TransitionEffects::RELEASE_REGISTRY_ENTRIES
                    | TransitionEffects::CLEAR_CALL_DATA,
            ),
            (Terminating, ReleaseIndication) => (
                Down,
                TransitionEffects::SIGNAL_STOP
                    | TransitionEffects::RELEASE_REGISTRY_ENTRIES
                    | TransitionEffects::CLEAR_CALL_DATA,
            ),
            (_, ReleaseIndication) => (
                Down,
                TransitionEffects::SIGNAL_STOP
                    | TransitionEffects::RELEASE_REGISTRY_ENTRIES
                    | TransitionEffects::CLEAR_CALL_DATA,
            ),

            // ---------------------------------------------------------
            // Hold / suspend (ETSI extensions)
            // ---------------------------------------------------------
            (Up, HoldIndication) => (Hold, TransitionEffects::NONE),
            (Hold, ConnectAck) => (Up, TransitionEffects::SIGNAL_UP),
            (Up, SuspendIndication) => (Suspended, TransitionEffects::NONE),
            (Suspended, ResumeIndication) => (Up, TransitionEffects::SIGNAL_UP),
            (Suspended, SuspendTimeout) => (
                Down,
                TransitionEffects::SIGNAL_STOP
                    | TransitionEffects::RELEASE_REGISTRY_ENTRIES
                    | TransitionEffects::CLEAR_CALL_DATA,
            ),

            // ---------------------------------------------------------
            // Span-wide restart: valid from any state, always wins.
            // ---------------------------------------------------------
            (_, RestartRequest) => (
                Restart,
                TransitionEffects::SIGNAL_STOP
                    | TransitionEffects::SIGNAL_ALARM_TRAP
                    | TransitionEffects::SCHEDULE_SPAN_RESTART,
            ),
            (Restart, RestartComplete) => (
                Down,
                TransitionEffects::SIGNAL_ALARM_CLEAR
                    | TransitionEffects::RELEASE_REGISTRY_ENTRIES
                    | TransitionEffects::CLEAR_CALL_DATA,
            ),

            (state, trigger) => return Err(FsmFault::InvalidTransition { state, trigger }),
        };

        Ok((next, effects))
    }
}
