//! Crate-wide error type aggregating every module's fault enum.
//!
//! Mirrors the teacher pattern of one `thiserror` enum per module plus a
//! single boundary type built from them with `#[from]`, rather than a single
//! flat enum carrying every variant directly.

use thiserror::Error;

use crate::config::ConfigError;
use crate::dchannel::LinkError;
use crate::fsm::FsmFault;
use crate::queue::QueueError;
use crate::registry::RegistryError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Fsm(#[from] FsmFault),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Link(#[from] LinkError),
}

impl EngineError {
    /// True for faults the span loop can log and continue past; false for
    /// faults that should take the span into `Restart`.
    pub fn is_recoverable(&self) -> bool {
        match self {
            EngineError::Config(_) => false,
            EngineError::Registry(_) => true,
            EngineError::Fsm(_) => true,
            EngineError::Queue(QueueError::QueueFull) => true,
            EngineError::Queue(QueueError::Disconnected) => false,
            EngineError::Link(_) => false,
        }
    }
}
