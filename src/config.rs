//! Per-span configuration.
//!
//! Reading a config file or parsing CLI flags is a caller concern (out of
//! scope, §1); this module only defines the validated value the caller hands
//! to [`crate::span::SpanEngine::new`] and the rules that make it valid.

use isdn_wire::{MAX_LOCAL_NUMBERS, SignallingRole, SpanId, SwitchVariant};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Optional Q.921/Q.931 trace flags, gating [`crate::dchannel::DChannelPort::trace`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceFlags {
    pub q921: bool,
    pub q931: bool,
}

/// Per-span configuration, as handed to the engine by an already-validated
/// source (file, CLI, test fixture - all out of this crate's scope).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanConfig {
    pub span_id: SpanId,
    pub phys_span: u16,
    pub chan_count: usize,
    pub switchtype: SwitchVariant,
    pub signalling: SignallingRole,
    pub tei: u8,
    pub min_digits: u8,
    pub overlap_dial: bool,
    pub setup_arb: bool,
    pub facility_ie_decode: bool,
    pub facility: bool,
    /// Signed seconds; 0 disables the facility timer.
    pub facility_timeout: i8,
    pub local_numbers: Vec<String>,
    pub timer_t3: bool,
    pub trace_flags: TraceFlags,
}

/// Errors rejecting a `SpanConfig` at attach time. The engine never starts
/// with an invalid config (§7, `ConfigInvalid`).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("chan_count {got} is out of range for this interface (expected one of {expected:?})")]
    BadChannelCount { got: usize, expected: &'static [usize] },

    #[error("local_numbers has {got} entries, maximum is {MAX_LOCAL_NUMBERS}")]
    TooManyLocalNumbers { got: usize },

    #[error("tei {0} is not a valid layer-2 TEI (must be 0..=127)")]
    BadTei(u8),

    #[error("min_digits must be at least 1, got {0}")]
    BadMinDigits(u8),
}

/// Valid interface channel counts: BRI (2), T1 PRI (24, D included), E1 PRI (32, D on 16).
const VALID_CHAN_COUNTS: &[usize] = &[2, 24, 32];

impl SpanConfig {
    /// Validate the configuration, rejecting it synchronously before any
    /// span loop or socket is started.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_CHAN_COUNTS.contains(&self.chan_count) {
            return Err(ConfigError::BadChannelCount {
                got: self.chan_count,
                expected: VALID_CHAN_COUNTS,
            });
        }
        if self.local_numbers.len() > MAX_LOCAL_NUMBERS {
            return Err(ConfigError::TooManyLocalNumbers {
                got: self.local_numbers.len(),
            });
        }
        if self.tei > 127 {
            return Err(ConfigError::BadTei(self.tei));
        }
        if self.min_digits == 0 {
            return Err(ConfigError::BadMinDigits(self.min_digits));
        }
        Ok(())
    }

    /// The facility timeout as a `Duration`, or `None` when disabled (`<= 0`).
    pub fn facility_timeout_duration(&self) -> Option<std::time::Duration> {
        if self.facility_timeout <= 0 {
            None
        } else {
            Some(std::time::Duration::from_secs(self.facility_timeout as u64))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> SpanConfig {
        SpanConfig {
            span_id: 1,
            phys_span: 1,
            chan_count: 24,
            switchtype: SwitchVariant::Ni2,
            signalling: SignallingRole::Cpe,
            tei: 0,
            min_digits: 1,
            overlap_dial: false,
            setup_arb: false,
            facility_ie_decode: false,
            facility: false,
            facility_timeout: 0,
            local_numbers: vec![],
            timer_t3: true,
            trace_flags: TraceFlags::default(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn bad_channel_count_rejected() {
        let mut cfg = base_config();
        cfg.chan_count = 5;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::BadChannelCount {
                got: 5,
                expected: VALID_CHAN_COUNTS
            })
        );
    }

    #[test]
    fn too_many_local_numbers_rejected() {
        let mut cfg = base_config();
        cfg.local_numbers = (0..9).map(|i| i.to_string()).collect();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::TooManyLocalNumbers { got: 9 })
        ));
    }

    #[test]
    fn facility_timeout_duration_disabled_at_zero() {
        let cfg = base_config();
        assert_eq!(cfg.facility_timeout_duration(), None);
    }

    #[test]
    fn facility_timeout_duration_converts_seconds() {
        let mut cfg = base_config();
        cfg.facility_timeout = 2;
        assert_eq!(
            cfg.facility_timeout_duration(),
            Some(std::time::Duration::from_secs(2))
        );
    }
}
