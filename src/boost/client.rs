//! `BoostClient` — the twin-socket (`mcon`/`pcon`) SS7-boost transport.
//!
//! Two UDP sockets carry the protocol: `mcon` for call-control events,
//! `pcon` for the heartbeat/system-restart handshake. Each gets its own
//! receiver thread reading with a short timeout rather than a `select`
//! loop, matching the rest of this engine's thread-per-duty design
//! (§4.9 / §9 redesign).

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use isdn_wire::{BoostEventId, WireError, Ss7bcEvent};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::queue::{CallEvent, StackEvent};
use crate::span::SpanHandle;

#[derive(Debug, Error)]
pub enum BoostError {
    #[error("boost socket I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed boost frame: {0}")]
    Wire(#[from] WireError),

    #[error("dial timed out waiting for a boost response")]
    DialTimeout,

    #[error("gateway heartbeat missed, link considered down")]
    HeartbeatLost,
}

/// State of one outstanding outbound call-setup request, keyed by
/// `call_setup_id`.
#[derive(Debug, Clone)]
pub enum OutboundState {
    /// No request occupies this id.
    Free,
    /// Sent, awaiting `CallStartAck`/`CallStartNack`.
    Waiting,
    /// The gateway accepted the call; carries the ack event.
    Ready(Box<Ss7bcEvent>),
    /// The gateway rejected the call; carries the reported cause.
    Fail(u8),
}

/// Hard cap on how long `dial` spin-waits for a gateway response, matching
/// the original driver's fixed ceiling.
const DIAL_TIMEOUT: Duration = Duration::from_secs(60);

/// How long a receiver thread blocks on a single `recv_from` before
/// checking whether it should keep running.
const RECV_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// How long without a heartbeat before the link is declared down.
const HEARTBEAT_STALE_AFTER: Duration = Duration::from_secs(5);

/// How often the heartbeat monitor checks link health.
const HEARTBEAT_MONITOR_INTERVAL: Duration = Duration::from_secs(1);

struct Requests {
    table: Mutex<HashMap<u16, OutboundState>>,
}

impl Requests {
    fn new() -> Self {
        Self { table: Mutex::new(HashMap::new()) }
    }

    fn begin(&self, call_setup_id: u16) {
        self.table.lock().expect("requests poisoned").insert(call_setup_id, OutboundState::Waiting);
    }

    fn resolve(&self, call_setup_id: u16, state: OutboundState) {
        self.table.lock().expect("requests poisoned").insert(call_setup_id, state);
    }

    fn poll(&self, call_setup_id: u16) -> OutboundState {
        self.table
            .lock()
            .expect("requests poisoned")
            .get(&call_setup_id)
            .cloned()
            .unwrap_or(OutboundState::Free)
    }

    fn free(&self, call_setup_id: u16) {
        self.table.lock().expect("requests poisoned").remove(&call_setup_id);
    }
}

impl Clone for OutboundState {
    fn clone(&self) -> Self {
        match self {
            OutboundState::Free => OutboundState::Free,
            OutboundState::Waiting => OutboundState::Waiting,
            OutboundState::Ready(ev) => OutboundState::Ready(ev.clone()),
            OutboundState::Fail(c) => OutboundState::Fail(*c),
        }
    }
}

/// Twin-socket client for one SS7-boost gateway link.
pub struct BoostClient {
    mcon: UdpSocket,
    pcon: UdpSocket,
    peer: SocketAddr,
    fseqno: AtomicU32,
    requests: Arc<Requests>,
    last_heartbeat: Mutex<Instant>,
    link_alarmed: AtomicBool,
}

impl BoostClient {
    /// Bind both sockets and connect them to `peer`. Read timeouts are set
    /// short so receiver threads can poll a shutdown flag instead of
    /// blocking forever.
    pub fn bind(
        mcon_addr: SocketAddr,
        pcon_addr: SocketAddr,
        peer: SocketAddr,
    ) -> Result<Self, BoostError> {
        let mcon = UdpSocket::bind(mcon_addr)?;
        let pcon = UdpSocket::bind(pcon_addr)?;
        mcon.set_read_timeout(Some(RECV_POLL_INTERVAL))?;
        pcon.set_read_timeout(Some(RECV_POLL_INTERVAL))?;
        mcon.connect(peer)?;
        pcon.connect(peer)?;

        Ok(Self {
            mcon,
            pcon,
            peer,
            fseqno: AtomicU32::new(1),
            requests: Arc::new(Requests::new()),
            last_heartbeat: Mutex::new(Instant::now()),
            link_alarmed: AtomicBool::new(false),
        })
    }

    fn next_fseqno(&self) -> u32 {
        self.fseqno.fetch_add(1, Ordering::Relaxed)
    }

    /// Send one event on `mcon`. Call-control traffic only; heartbeats and
    /// restart handshakes use `pcon` via `send_pcon`.
    pub fn exec_command(&self, mut event: Ss7bcEvent) -> Result<(), BoostError> {
        event.fseqno = self.next_fseqno();
        self.mcon.send(&event.to_bytes())?;
        Ok(())
    }

    fn send_pcon(&self, mut event: Ss7bcEvent) -> Result<(), BoostError> {
        event.fseqno = self.next_fseqno();
        self.pcon.send(&event.to_bytes())?;
        Ok(())
    }

    /// Perform the `SYSTEM_RESTART` handshake: announce ourselves on `pcon`
    /// and wait (bounded) for the gateway's ack.
    pub fn system_restart_handshake(&self, timeout: Duration) -> Result<(), BoostError> {
        let restart = Ss7bcEvent {
            event_id: BoostEventId::SystemRestart as u8,
            fseqno: 0,
            call_setup_id: 0,
            span: 0,
            chan: 0,
            release_cause: 0,
            called_number_digits: Default::default(),
            calling_number_digits: Default::default(),
            flags: 0,
        };
        self.send_pcon(restart)?;

        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 512];
        while Instant::now() < deadline {
            match self.pcon.recv(&mut buf) {
                Ok(n) => {
                    if let Ok(ev) = Ss7bcEvent::from_bytes(&buf[..n]) {
                        if ev.event_id == BoostEventId::SystemRestartAck as u8 {
                            info!("boost gateway acked system restart");
                            return Ok(());
                        }
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
                Err(e) => return Err(BoostError::Io(e)),
            }
        }
        Err(BoostError::DialTimeout)
    }

    /// Place an outbound call and spin-wait (bounded at `DIAL_TIMEOUT`) for
    /// the gateway's accept/reject.
    pub fn dial(&self, call_setup_id: u16, event: Ss7bcEvent) -> Result<Ss7bcEvent, BoostError> {
        self.requests.begin(call_setup_id);
        self.exec_command(event)?;

        let deadline = Instant::now() + DIAL_TIMEOUT;
        loop {
            match self.requests.poll(call_setup_id) {
                OutboundState::Ready(ev) => {
                    self.requests.free(call_setup_id);
                    return Ok(*ev);
                }
                OutboundState::Fail(cause) => {
                    self.requests.free(call_setup_id);
                    return Err(BoostError::Wire(WireError::UnknownEventId(cause)));
                }
                OutboundState::Waiting | OutboundState::Free => {
                    if Instant::now() >= deadline {
                        self.requests.free(call_setup_id);
                        return Err(BoostError::DialTimeout);
                    }
                    thread::sleep(Duration::from_millis(20));
                }
            }
        }
    }

    /// True if a heartbeat has arrived within `HEARTBEAT_STALE_AFTER`.
    pub fn link_is_healthy(&self) -> bool {
        self.last_heartbeat.lock().expect("heartbeat lock poisoned").elapsed() < HEARTBEAT_STALE_AFTER
    }

    fn note_heartbeat(&self) {
        *self.last_heartbeat.lock().expect("heartbeat lock poisoned") = Instant::now();
    }

    /// Spawn the `mcon` receiver thread: decodes frames, resolves pending
    /// `dial` requests, and forwards everything else to the span as
    /// `CallEvent::Boost`.
    pub fn spawn_mcon_receiver(self: &Arc<Self>, span: SpanHandle) -> thread::JoinHandle<()> {
        let client = Arc::clone(self);
        thread::spawn(move || loop {
            let mut buf = [0u8; 512];
            match client.mcon.recv(&mut buf) {
                Ok(n) => match Ss7bcEvent::from_bytes(&buf[..n]) {
                    Ok(ev) => client.dispatch_mcon_event(ev, &span),
                    Err(e) => warn!(error = %e, "dropped malformed boost frame"),
                },
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
                Err(e) => {
                    error!(error = %e, "mcon receiver socket error, exiting");
                    return;
                }
            }
        })
    }

    /// Spawn the `pcon` receiver thread: tracks heartbeats, pushes restart
    /// acks through (handshake already drains those synchronously, this is
    /// the steady-state listener).
    pub fn spawn_pcon_receiver(self: &Arc<Self>) -> thread::JoinHandle<()> {
        let client = Arc::clone(self);
        thread::spawn(move || loop {
            let mut buf = [0u8; 512];
            match client.pcon.recv(&mut buf) {
                Ok(n) => match Ss7bcEvent::from_bytes(&buf[..n]) {
                    Ok(ev) if ev.event_id == BoostEventId::Heartbeat as u8 => {
                        client.note_heartbeat();
                        // The peer's heartbeat is echoed back verbatim, not just noted.
                        match client.send_pcon(ev) {
                            Ok(()) => debug!("boost heartbeat received and echoed"),
                            Err(e) => warn!(error = %e, "failed to echo boost heartbeat"),
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "dropped malformed pcon frame"),
                },
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
                Err(e) => {
                    error!(error = %e, "pcon receiver socket error, exiting");
                    return;
                }
            }
        })
    }

    /// Spawn a thread that watches `link_is_healthy` and forces the span
    /// onto its span-wide restart path once the gateway's heartbeat has
    /// been missing for more than `HEARTBEAT_STALE_AFTER` - the other half
    /// of the heartbeat contract (§4.9): absence, not just presence,
    /// drives a transition. Edge-triggered so a link stuck down doesn't
    /// resubmit `Layer2Down` every tick.
    pub fn spawn_heartbeat_monitor(self: &Arc<Self>, span: SpanHandle) -> thread::JoinHandle<()> {
        let client = Arc::clone(self);
        thread::spawn(move || loop {
            thread::sleep(HEARTBEAT_MONITOR_INTERVAL);

            if client.link_is_healthy() {
                client.link_alarmed.store(false, Ordering::Relaxed);
                continue;
            }
            if client.link_alarmed.swap(true, Ordering::Relaxed) {
                continue;
            }

            warn!(error = %BoostError::HeartbeatLost, "boost heartbeat lost, forcing span restart");
            if let Err(err) = span.submit(CallEvent::Stack(StackEvent::Layer2Down)) {
                warn!(span = span.span_id(), error = %err, "dropped layer2-down event, span queue unavailable");
            }
        })
    }

    fn dispatch_mcon_event(&self, ev: Ss7bcEvent, span: &SpanHandle) {
        if ev.event_id == BoostEventId::CallStartAck as u8 {
            self.requests.resolve(ev.call_setup_id, OutboundState::Ready(Box::new(ev.clone())));
        } else if ev.event_id == BoostEventId::CallStartNack as u8 {
            self.requests.resolve(ev.call_setup_id, OutboundState::Fail(ev.release_cause));
        }
        if let Err(err) = span.submit(CallEvent::Boost(ev)) {
            warn!(span = span.span_id(), error = %err, "dropped boost event, span queue unavailable");
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}
