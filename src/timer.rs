//! `TimerWheel` — schedules delayed `CallEvent::Timer` deliveries back onto
//! a span's `EventQueue`.
//!
//! One scheduler thread per wheel, process-wide per span (§5), not one
//! thread per scheduled timer: the thread sleeps until the earliest
//! pending deadline and wakes early whenever `schedule`/`cancel` changes
//! which deadline is next.
//!
//! Every timer, regardless of what it's for, is cancellable by handle alone
//! (§4.4 / §9 redesign: the wheel no longer branches on a timer "kind" when
//! deciding whether cancellation is legal).

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use isdn_wire::ChannelId;

use crate::queue::{CallEvent, EventQueue};

/// What a timer is for. Carried for observability (logging, tests) only -
/// the wheel itself treats every handle uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Facility,
    Restart,
    T3,
}

/// Opaque handle to a scheduled timer. Equality is by id only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Construct a handle from a raw id. Exposed for tests that need a
    /// handle without going through a live `TimerWheel`.
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

#[derive(Clone)]
struct Pending {
    fire_at: Instant,
    chan_id: ChannelId,
    kind: TimerKind,
}

struct State {
    next_id: u64,
    entries: HashMap<u64, Pending>,
    /// Same entries ordered by deadline, for O(log n) "what's next".
    order: BTreeSet<(Instant, u64)>,
    shutdown: bool,
}

impl State {
    fn earliest(&self) -> Option<(Instant, u64)> {
        self.order.iter().next().copied()
    }
}

/// One timer wheel per span. A single scheduler thread owns the pending
/// set and posts `CallEvent::Timer` onto the span's queue when a deadline
/// is reached; cancellation removes the entry before it ever fires.
pub struct TimerWheel {
    state: Arc<Mutex<State>>,
    cond: Arc<Condvar>,
    scheduler: Option<JoinHandle<()>>,
}

impl TimerWheel {
    pub fn new(queue: EventQueue) -> Self {
        let state = Arc::new(Mutex::new(State {
            next_id: 1,
            entries: HashMap::new(),
            order: BTreeSet::new(),
            shutdown: false,
        }));
        let cond = Arc::new(Condvar::new());

        let scheduler = {
            let state = Arc::clone(&state);
            let cond = Arc::clone(&cond);
            thread::spawn(move || Self::run_scheduler(state, cond, queue))
        };

        Self { state, cond, scheduler: Some(scheduler) }
    }

    fn run_scheduler(state: Arc<Mutex<State>>, cond: Arc<Condvar>, queue: EventQueue) {
        let mut guard = state.lock().expect("timer state poisoned");
        loop {
            if guard.shutdown {
                return;
            }

            match guard.earliest() {
                None => {
                    guard = cond.wait(guard).expect("timer state poisoned");
                }
                Some((fire_at, id)) => {
                    let now = Instant::now();
                    if fire_at <= now {
                        guard.order.remove(&(fire_at, id));
                        let fired = guard.entries.remove(&id);
                        drop(guard);
                        if let Some(p) = fired {
                            let _ = queue.send(CallEvent::Timer {
                                chan_id: p.chan_id,
                                kind: p.kind,
                                handle: TimerHandle(id),
                            });
                        }
                        guard = state.lock().expect("timer state poisoned");
                    } else {
                        let (g, _) = cond
                            .wait_timeout(guard, fire_at - now)
                            .expect("timer state poisoned");
                        guard = g;
                    }
                }
            }
        }
    }

    /// Schedule a timer to fire after `delay`, posting `CallEvent::Timer` to
    /// the span's queue when it does.
    pub fn schedule(&self, chan_id: ChannelId, kind: TimerKind, delay: Duration) -> TimerHandle {
        let mut state = self.state.lock().expect("timer state poisoned");
        let id = state.next_id;
        state.next_id += 1;
        let fire_at = Instant::now() + delay;
        state.entries.insert(id, Pending { fire_at, chan_id, kind });
        state.order.insert((fire_at, id));
        drop(state);
        // The new deadline may be earlier than whatever the scheduler was
        // sleeping toward.
        self.cond.notify_one();
        TimerHandle(id)
    }

    /// Cancel a timer. No-op if it already fired or was already cancelled -
    /// every handle is cancellable regardless of what it was scheduled for.
    pub fn cancel(&self, handle: TimerHandle) {
        let mut state = self.state.lock().expect("timer state poisoned");
        if let Some(p) = state.entries.remove(&handle.0) {
            state.order.remove(&(p.fire_at, handle.0));
        }
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().expect("timer state poisoned").entries.len()
    }
}

impl Drop for TimerWheel {
    fn drop(&mut self) {
        {
            let mut state = self.state.lock().expect("timer state poisoned");
            state.shutdown = true;
        }
        self.cond.notify_all();
        if let Some(handle) = self.scheduler.take() {
            let _ = handle.join();
        }
    }
}
