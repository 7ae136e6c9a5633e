//! SS7-boost wire client (§4.9): the twin-socket transport to the signalling
//! gateway.

mod client;

pub use client::{BoostClient, BoostError, OutboundState};
