//! Pairing configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DonePolicy
// ---------------------------------------------------------------------------

/// How `PAIRING_DONE` signals are counted toward teardown.
///
/// An exchange is removed once its done count reaches 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DonePolicy {
    /// Every signal counts, even repeats from the same participant.
    ///
    /// One client sending `PAIRING_DONE` twice tears the exchange down on
    /// its own. This is what deployed clients have always seen.
    #[default]
    PerSignal,

    /// Each participant counts at most once; repeats are ignored.
    PerParticipant,
}

// ---------------------------------------------------------------------------
// PairingConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`Matchmaker`](crate::Matchmaker).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PairingConfig {
    /// Completion counting rule.
    pub done_policy: DonePolicy,

    /// How long an unmatched waiter may sit in the pool.
    ///
    /// `None` (the default) keeps waiters queued until they abort, finish or
    /// disconnect. Matched exchanges are never expired.
    pub waiting_timeout: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairing_config_default() {
        let config = PairingConfig::default();
        assert_eq!(config.done_policy, DonePolicy::PerSignal);
        assert!(config.waiting_timeout.is_none());
    }
}
