//! End-to-end span scenarios, exercised against a `LoopbackDChannelPort` and
//! an in-memory application sink - no real socket or stack involved.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use isdn_span_engine::app::AppSignalSink;
use isdn_span_engine::config::{SpanConfig, TraceFlags};
use isdn_span_engine::dchannel::LoopbackDChannelPort;
use isdn_span_engine::fsm::CallState;
use isdn_span_engine::queue::{AppCommand, CallEvent, StackEvent};
use isdn_span_engine::span::SpanEngine;
use isdn_wire::{CallerData, SignallingRole, SwitchVariant};

/// Records every signal the engine reports, for assertions.
#[derive(Default)]
struct RecordingSink {
    started: Mutex<Vec<u16>>,
    up: Mutex<Vec<u16>>,
    stopped: Mutex<Vec<u16>>,
}

impl AppSignalSink for RecordingSink {
    fn on_start(&self, _span_id: u16, chan_id: u16, _caller_data: &CallerData) {
        self.started.lock().unwrap().push(chan_id);
    }
    fn on_progress(&self, _span_id: u16, _chan_id: u16) {}
    fn on_progress_media(&self, _span_id: u16, _chan_id: u16) {}
    fn on_up(&self, _span_id: u16, chan_id: u16) {
        self.up.lock().unwrap().push(chan_id);
    }
    fn on_stop(&self, _span_id: u16, chan_id: u16, _cause: u8) {
        self.stopped.lock().unwrap().push(chan_id);
    }
    fn on_alarm_trap(&self, _span_id: u16) {}
    fn on_alarm_clear(&self, _span_id: u16) {}
    fn request_channel(&self, _span_id: u16, _caller_data: &CallerData) -> Option<u16> {
        None
    }
}

fn test_config(chan_count: usize) -> SpanConfig {
    SpanConfig {
        span_id: 1,
        phys_span: 1,
        chan_count,
        switchtype: SwitchVariant::Ni2,
        signalling: SignallingRole::Cpe,
        tei: 0,
        min_digits: 1,
        overlap_dial: false,
        setup_arb: false,
        facility_ie_decode: false,
        facility: true,
        facility_timeout: 1,
        local_numbers: vec!["5551000".to_string()],
        timer_t3: true,
        trace_flags: TraceFlags::default(),
    }
}

fn spawn_engine(chan_count: usize) -> (SpanEngine, Arc<LoopbackDChannelPort>, Arc<RecordingSink>) {
    let port = Arc::new(LoopbackDChannelPort::new());
    let sink = Arc::new(RecordingSink::default());
    let engine = SpanEngine::new(test_config(chan_count), port.clone(), sink.clone()).unwrap();
    (engine, port, sink)
}

/// E1: a straightforward outbound call reaches `Up` and the peer
/// acknowledges it, then the caller hangs up cleanly.
#[test]
fn outbound_call_success() -> Result<()> {
    let (mut engine, _port, sink) = spawn_engine(4);
    let handle = engine.handle_for();

    handle.submit(CallEvent::App(AppCommand::Dial { chan_id: 0, caller_data: CallerData::default() }))?;
    assert!(engine.run_once(Duration::from_millis(50)));
    assert_eq!(engine.channel_state(0), Some(CallState::Dialing));

    handle.submit(CallEvent::Stack(StackEvent::ConnectIndication { chan_id: 0 }))?;
    assert!(engine.run_once(Duration::from_millis(50)));
    assert_eq!(engine.channel_state(0), Some(CallState::Up));
    assert_eq!(sink.up.lock().unwrap().as_slice(), &[0]);

    handle.submit(CallEvent::App(AppCommand::HangUp { chan_id: 0, cause: 16 }))?;
    assert!(engine.run_once(Duration::from_millis(50)));
    assert_eq!(engine.channel_state(0), Some(CallState::Hangup));

    handle.submit(CallEvent::Stack(StackEvent::ReleaseIndication { chan_id: 0, cause: 16 }))?;
    assert!(engine.run_once(Duration::from_millis(50)));

    handle.submit(CallEvent::Stack(StackEvent::ReleaseCompleteIndication { chan_id: 0, cause: 16 }))?;
    assert!(engine.run_once(Duration::from_millis(50)));
    assert_eq!(engine.channel_state(0), Some(CallState::Down));
    assert_eq!(sink.stopped.lock().unwrap().as_slice(), &[0]);
    Ok(())
}

/// E2: an inbound SETUP with no free channel cannot be placed - every slot
/// in this span is already occupied.
#[test]
fn inbound_rejected_when_no_channel_is_free() -> Result<()> {
    let (mut engine, _port, _sink) = spawn_engine(1);
    let handle = engine.handle_for();

    // Occupy the only channel.
    handle.submit(CallEvent::App(AppCommand::Dial { chan_id: 0, caller_data: CallerData::default() }))?;
    assert!(engine.run_once(Duration::from_millis(50)));
    assert_eq!(engine.channel_state(0), Some(CallState::Dialing));

    // A second dial on the same (now busy) channel must not silently
    // re-occupy it via an unrelated path - the span has nowhere else to put
    // the request, so `Dial` on the busy id goes through glare handling at
    // the FSM layer (the channel stays Dialing, not reset to fresh Dialing).
    handle.submit(CallEvent::Stack(StackEvent::SetupIndication { chan_id: 0, caller_data: CallerData::default(), peer_inst: 11 }))?;
    assert!(engine.run_once(Duration::from_millis(50)));
    assert_eq!(engine.channel_state(0), Some(CallState::Dialing));
    Ok(())
}

/// E3: glare - an inbound SETUP collides with our own outbound attempt on
/// the same channel, and our side loses the race.
#[test]
fn glare_loser_processes_the_inbound_call() -> Result<()> {
    let (mut engine, _port, sink) = spawn_engine(1);
    let handle = engine.handle_for();

    handle.submit(CallEvent::App(AppCommand::Dial { chan_id: 0, caller_data: CallerData::default() }))?;
    assert!(engine.run_once(Duration::from_millis(50)));

    handle.submit(CallEvent::Stack(StackEvent::SetupIndication { chan_id: 0, caller_data: CallerData::default(), peer_inst: 22 }))?;
    assert!(engine.run_once(Duration::from_millis(50)));
    // Our own dial is still in flight; the collision was recorded, not yet
    // resolved in our favor or theirs (that call is the application's to
    // make in a real deployment - here we just assert it didn't crash the
    // slot back to Down).
    assert_ne!(engine.channel_state(0), Some(CallState::Down));
    let _ = sink.started.lock().unwrap();
    Ok(())
}

/// E5: a facility-IE timer expires before the peer responds, and the call
/// is torn down instead of hanging forever.
#[test]
fn facility_timeout_tears_down_a_stalled_inbound_call() -> Result<()> {
    let (mut engine, _port, _sink) = spawn_engine(2);
    let handle = engine.handle_for();

    handle.submit(CallEvent::Stack(StackEvent::SetupIndication { chan_id: 0, caller_data: CallerData::default(), peer_inst: 33 }))?;
    assert!(engine.run_once(Duration::from_millis(50)));
    assert_eq!(engine.channel_state(0), Some(CallState::Ring));

    // Drive the FSM directly with the timeout trigger the real timer wheel
    // would eventually deliver - this asserts the transition, independent
    // of real wall-clock timing.
    handle.submit(CallEvent::Timer {
        chan_id: 0,
        kind: isdn_span_engine::timer::TimerKind::Facility,
        handle: isdn_span_engine::timer::TimerHandle::from_raw(1),
    })?;
    assert!(engine.run_once(Duration::from_millis(50)));
    assert_eq!(engine.channel_state(0), Some(CallState::Terminating));
    Ok(())
}

/// E6: the D-channel drops mid-call; the span-wide restart trigger must
/// move every occupied channel, not just the one that noticed, and each
/// restarted channel must come all the way back down to `Down` (with the
/// application seeing `STOP`) once its restart timer fires - not get stuck
/// in `Restart` forever.
#[test]
fn link_down_restarts_every_channel() -> Result<()> {
    let (mut engine, _port, sink) = spawn_engine(2);
    let handle = engine.handle_for();

    handle.submit(CallEvent::App(AppCommand::Dial { chan_id: 0, caller_data: CallerData::default() }))?;
    assert!(engine.run_once(Duration::from_millis(50)));

    handle.submit(CallEvent::Stack(StackEvent::Layer2Down))?;
    assert!(engine.run_once(Duration::from_millis(50)));

    assert_eq!(engine.channel_state(0), Some(CallState::Restart));
    assert_eq!(engine.channel_state(1), Some(CallState::Restart));
    assert_eq!(sink.stopped.lock().unwrap().as_slice(), &[0, 1]);

    // Drive each channel's restart timer to completion.
    for _ in 0..2 {
        assert!(engine.run_once(Duration::from_secs(1)));
    }

    assert_eq!(engine.channel_state(0), Some(CallState::Down));
    assert_eq!(engine.channel_state(1), Some(CallState::Down));
    Ok(())
}

/// Boundary: the queue enforces its fixed capacity rather than growing
/// unbounded or blocking a producer.
#[test]
fn queue_overflow_is_reported_not_blocked() {
    use isdn_span_engine::queue::EventQueue;

    let queue = EventQueue::bounded(100);
    for _ in 0..100 {
        queue
            .send(CallEvent::App(AppCommand::Answer { chan_id: 0 }))
            .expect("queue has room for the first 100 events");
    }
    let err = queue
        .send(CallEvent::App(AppCommand::Answer { chan_id: 0 }))
        .expect_err("the 101st event must be rejected, not queued");
    assert_eq!(err, isdn_span_engine::queue::QueueError::QueueFull);
}
