//! D-channel transport abstraction.
//!
//! The span loop never talks to a physical D-channel directly; it goes
//! through this trait so the signalling stack (real hardware, or a
//! loopback stand-in for tests) can be swapped without touching the FSM.

use isdn_wire::ChannelId;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("D-channel link is down")]
    LinkDown,
    #[error("D-channel operation timed out")]
    Timeout,
}

/// Transport boundary between the span engine and the Q.921/Q.931 stack.
pub trait DChannelPort: Send {
    /// Send a raw signalling frame for `chan_id` (or the D-channel itself
    /// when `chan_id` is `None`).
    fn send_frame(&self, chan_id: Option<ChannelId>, frame: &[u8]) -> Result<(), LinkError>;

    /// Poll for an inbound frame, non-blocking. `None` means nothing is
    /// ready right now.
    fn recv_frame(&self) -> Result<Option<Vec<u8>>, LinkError>;

    /// Send an out-of-band control primitive (layer-2 activate/deactivate,
    /// restart request).
    fn send_oob(&self, primitive: &str) -> Result<(), LinkError>;

    /// Emit a Q.921/Q.931 trace line, gated by `TraceFlags` at the call
    /// site. A no-op transport may simply drop this.
    fn trace(&self, direction: &str, summary: &str);
}

/// In-memory `DChannelPort` used by tests and demos: frames sent are simply
/// queued for `recv_frame` to hand back, with no real wire involved.
pub struct LoopbackDChannelPort {
    inbound: std::sync::Mutex<std::collections::VecDeque<Vec<u8>>>,
    sent: std::sync::Mutex<Vec<(Option<ChannelId>, Vec<u8>)>>,
    down: std::sync::atomic::AtomicBool,
}

impl LoopbackDChannelPort {
    pub fn new() -> Self {
        Self {
            inbound: std::sync::Mutex::new(std::collections::VecDeque::new()),
            sent: std::sync::Mutex::new(Vec::new()),
            down: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Queue a frame for the next `recv_frame` to return, as if it arrived
    /// from the peer.
    pub fn push_inbound(&self, frame: Vec<u8>) {
        self.inbound.lock().expect("inbound queue poisoned").push_back(frame);
    }

    /// Every frame handed to `send_frame` so far, in order.
    pub fn sent_frames(&self) -> Vec<(Option<ChannelId>, Vec<u8>)> {
        self.sent.lock().expect("sent log poisoned").clone()
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Default for LoopbackDChannelPort {
    fn default() -> Self {
        Self::new()
    }
}

impl DChannelPort for LoopbackDChannelPort {
    fn send_frame(&self, chan_id: Option<ChannelId>, frame: &[u8]) -> Result<(), LinkError> {
        if self.down.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(LinkError::LinkDown);
        }
        self.sent
            .lock()
            .expect("sent log poisoned")
            .push((chan_id, frame.to_vec()));
        Ok(())
    }

    fn recv_frame(&self) -> Result<Option<Vec<u8>>, LinkError> {
        if self.down.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(LinkError::LinkDown);
        }
        Ok(self.inbound.lock().expect("inbound queue poisoned").pop_front())
    }

    fn send_oob(&self, _primitive: &str) -> Result<(), LinkError> {
        if self.down.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(LinkError::LinkDown);
        }
        Ok(())
    }

    fn trace(&self, _direction: &str, _summary: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_round_trips_a_frame() {
        let port = LoopbackDChannelPort::new();
        port.push_inbound(vec![1, 2, 3]);
        assert_eq!(port.recv_frame().unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(port.recv_frame().unwrap(), None);
    }

    #[test]
    fn loopback_records_sent_frames() {
        let port = LoopbackDChannelPort::new();
        port.send_frame(Some(4), &[9, 9]).unwrap();
        assert_eq!(port.sent_frames(), vec![(Some(4), vec![9, 9])]);
    }

    #[test]
    fn down_link_rejects_send_and_recv() {
        let port = LoopbackDChannelPort::new();
        port.set_down(true);
        assert_eq!(port.send_frame(None, &[1]).unwrap_err(), LinkError::LinkDown);
        assert_eq!(port.recv_frame().unwrap_err(), LinkError::LinkDown);
    }
}
