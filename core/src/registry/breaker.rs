use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Worker health as seen by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    #[default]
    Healthy,
    /// Cooldown elapsed; one trial task decides whether the circuit closes.
    Degraded,
    CircuitOpen,
}

impl Health {
    /// Sort key for selection: healthy workers first.
    pub(crate) fn rank(self) -> u8 {
        match self {
            Self::Healthy => 0,
            Self::Degraded => 1,
            Self::CircuitOpen => 2,
        }
    }
}

/// Health transitions worth announcing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerTransition {
    Opened,
    HalfOpened,
    Closed,
}

#[derive(Debug, Clone, Default)]
pub struct BreakerState {
    pub health: Health,
    pub consecutive_failures: u32,
    pub opened_at: Option<Instant>,
}

/// Per-worker circuit breaker rules.
///
/// ```text
/// Healthy --failure x threshold--> CircuitOpen --cooldown--> Degraded
/// Degraded --success--> Healthy
/// Degraded --failure--> CircuitOpen
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn on_failure(&self, state: &mut BreakerState, now: Instant) -> Option<BreakerTransition> {
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        match state.health {
            Health::Healthy if state.consecutive_failures >= self.threshold => {
                Some(self.open(state, now))
            }
            Health::Degraded => Some(self.open(state, now)),
            // A late result from before the circuit opened.
            Health::CircuitOpen | Health::Healthy => None,
        }
    }

    pub fn on_success(&self, state: &mut BreakerState) -> Option<BreakerTransition> {
        state.consecutive_failures = 0;
        match state.health {
            Health::Degraded => {
                state.health = Health::Healthy;
                state.opened_at = None;
                Some(BreakerTransition::Closed)
            }
            Health::Healthy | Health::CircuitOpen => None,
        }
    }

    /// Move an open circuit to `Degraded` once its cooldown has elapsed.
    pub fn refresh(&self, state: &mut BreakerState, now: Instant) -> Option<BreakerTransition> {
        match (state.health, state.opened_at) {
            (Health::CircuitOpen, Some(opened_at))
                if now.saturating_duration_since(opened_at) >= self.cooldown =>
            {
                state.health = Health::Degraded;
                Some(BreakerTransition::HalfOpened)
            }
            _ => None,
        }
    }

    fn open(&self, state: &mut BreakerState, now: Instant) -> BreakerTransition {
        state.health = Health::CircuitOpen;
        state.opened_at = Some(now);
        BreakerTransition::Opened
    }
}
