//! `EventQueue` — the bounded, lock-free channel a span loop drains each
//! iteration.
//!
//! Backed by `crossbeam-channel` rather than a hand-rolled mutex+condvar
//! queue; the span loop never needs to see the lock, only `send`/`recv`.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendError, Sender, TrySendError, bounded};
use isdn_wire::{CallerData, ChannelId, Ss7bcEvent};
use thiserror::Error;

use crate::timer::{TimerHandle, TimerKind};

/// Default capacity of a span's event queue. Mirrors the original driver's
/// fixed-size ring (§5): once full, new events are dropped and counted, not
/// blocked on.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("event queue is full, event dropped")]
    QueueFull,
    #[error("event queue has no remaining senders")]
    Disconnected,
}

/// Events arriving on a D-channel, from a stack callback, or from the timer
/// wheel - everything the span loop's `select` drains in one place.
#[derive(Debug, Clone)]
pub enum CallEvent {
    /// A decoded SS7-boost frame arrived from the gateway.
    Boost(Ss7bcEvent),
    /// A Q.921/Q.931 stack callback fired (§4.8).
    Stack(StackEvent),
    /// A previously scheduled timer fired.
    Timer {
        chan_id: ChannelId,
        kind: TimerKind,
        handle: TimerHandle,
    },
    /// An application command requesting new outbound work.
    App(AppCommand),
}

/// Events the signalling stack reports upward through `StackAdapter`.
#[derive(Debug, Clone)]
pub enum StackEvent {
    /// Inbound SETUP. Carries the peer's call instance id so the registry
    /// can bind it the moment the call is known, rather than waiting for a
    /// later message to (maybe) carry one (§4.7/4.8).
    SetupIndication { chan_id: ChannelId, caller_data: CallerData, peer_inst: u32 },
    ProceedingIndication { chan_id: ChannelId },
    AlertingIndication { chan_id: ChannelId },
    ConnectIndication { chan_id: ChannelId },
    /// Peer's acknowledgement of our own outbound CONNECT - the first
    /// message on an outbound call that carries the peer's instance id.
    ConnectAck { chan_id: ChannelId, peer_inst: u32 },
    DisconnectIndication { chan_id: ChannelId, cause: u8 },
    ReleaseIndication { chan_id: ChannelId, cause: u8 },
    ReleaseCompleteIndication { chan_id: ChannelId, cause: u8 },
    RestartIndication { chan_id: ChannelId },
    Layer2Up,
    Layer2Down,
}

/// Commands the application submits to request outbound work.
#[derive(Debug, Clone)]
pub enum AppCommand {
    Dial { chan_id: ChannelId, caller_data: CallerData },
    Answer { chan_id: ChannelId },
    HangUp { chan_id: ChannelId, cause: u8 },
}

/// A cheap-to-clone handle around a bounded `crossbeam-channel`.
///
/// Cloning shares the same underlying queue; every span thread and every
/// timer/receiver thread holds a clone of the same sender/receiver pair.
#[derive(Clone)]
pub struct EventQueue {
    tx: Sender<CallEvent>,
    rx: Receiver<CallEvent>,
}

impl EventQueue {
    pub fn bounded(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx }
    }

    /// Non-blocking send. Returns `QueueError::QueueFull` rather than
    /// blocking the caller (§5: producers must never stall on a full
    /// queue).
    pub fn send(&self, event: CallEvent) -> Result<(), QueueError> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(QueueError::QueueFull),
            Err(TrySendError::Disconnected(_)) => Err(QueueError::Disconnected),
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<CallEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    pub fn try_recv(&self) -> Option<CallEvent> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl From<SendError<CallEvent>> for QueueError {
    fn from(_: SendError<CallEvent>) -> Self {
        QueueError::Disconnected
    }
}
