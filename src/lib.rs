//! Per-span ISDN/SS7-boost call-control signaling engine.
//!
//! # Architecture
//!
//! ```text
//!   application                 SpanEngine (one thread per span)
//!  ┌───────────┐   AppCommand   ┌───────────────────────────────┐
//!  │ AppSignal │ ─────────────> │  EventQueue -> StateMachine    │
//!  │   Sink    │ <───────────── │   -> ChannelSlot -> effects    │
//!  └───────────┘   on_*(...)    └───────────────┬────────────────┘
//!                                                │ SEND_FRAME
//!                               ┌────────────────▼───────────────┐
//!                               │   DChannelPort (Q.921/Q.931)    │
//!                               └──────────────────────────────────┘
//!
//!   SS7-boost gateway                BoostClient (mcon/pcon)
//!  ┌──────────────┐  UDP frames  ┌────────────────────────────────┐
//!  │   gateway     │ <─────────> │ receiver threads -> EventQueue  │
//!  └──────────────┘              └────────────────────────────────┘
//! ```
//!
//! Each span owns exactly one [`span::SpanEngine`], running its event loop
//! on a dedicated thread. Every other thread - stack callbacks, boost
//! socket receivers, timers, the application - only ever reaches a span
//! through its [`span::SpanHandle`] and the bounded [`queue::EventQueue`]
//! behind it.
//!
//! The call-control logic itself lives in [`fsm::StateMachine`], a pure
//! `(state, trigger) -> (state, effects)` function with no I/O - the span
//! loop is the only place effects are carried out.

pub mod app;
pub mod boost;
pub mod channel;
pub mod config;
pub mod context;
pub mod dchannel;
pub mod effects;
pub mod error;
pub mod flags;
pub mod fsm;
pub mod queue;
pub mod registry;
pub mod span;
pub mod stack_adapter;
pub mod timer;

pub use app::AppSignalSink;
pub use config::SpanConfig;
pub use context::EngineContext;
pub use error::EngineError;
pub use fsm::{CallState, StateMachine, Trigger};
pub use span::{SpanEngine, SpanHandle};

/// Install a `tracing` subscriber reading `RUST_LOG` (or `info` by
/// default). Intended for binaries embedding this engine; library tests
/// and consumers may install their own subscriber instead.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}
