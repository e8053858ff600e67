//! Speculative tick ladder.
//!
//! While a record set's first attempt is still outstanding, the dispatcher
//! periodically fires an *additional* parallel attempt on the next roster
//! stream. The gaps between ticks grow exponentially and saturate at a
//! ceiling:
//!
//! ```text
//! dispatch ──▶ attempt 1
//!    │
//!    ├─ first ─────────▶ tick: attempt 2
//!    ├─ first × m ─────▶ tick: attempt 3
//!    ├─ first × m² ────▶ tick: attempt 4
//!    │       …capped at max…
//!    └─ stops when a tick reports the set settled or unadvanceable
//! ```
//!
//! With the defaults (first 50 ms, max 200 ms, ×2) a stuck set fans out to
//! a second stream after 50 ms and keeps widening until the hard deadline
//! or the roster runs out.

use std::time::Duration;

use crate::error::{ClientError, Result};

/// Parameters of the tick ladder.
#[derive(Debug, Clone, Copy)]
pub struct SpeculativePolicy {
    /// Gap before the first speculative tick.
    pub first: Duration,

    /// Ceiling on the gap between ticks.
    pub max: Duration,

    /// Growth factor applied to the gap after each tick.
    pub multiplier: f64,
}

impl Default for SpeculativePolicy {
    fn default() -> Self {
        Self {
            first: Duration::from_millis(50),
            max: Duration::from_millis(200),
            multiplier: 2.0,
        }
    }
}

impl SpeculativePolicy {
    /// Check the ladder against the hard per-set deadline.
    ///
    /// Requires `0 < first <= max < request_timeout` and a positive
    /// multiplier; anything else is a construction-time error.
    pub fn validate(&self, request_timeout: Duration) -> Result<()> {
        if self.first.is_zero() {
            return Err(ClientError::Config(
                "first speculative timeout must be positive".to_string(),
            ));
        }
        if self.first > self.max {
            return Err(ClientError::Config(format!(
                "first speculative timeout {:?} exceeds max {:?}",
                self.first, self.max
            )));
        }
        if self.max >= request_timeout {
            return Err(ClientError::Config(format!(
                "max speculative timeout {:?} must be below the request timeout {:?}",
                self.max, request_timeout
            )));
        }
        if !(self.multiplier > 0.0) {
            return Err(ClientError::Config(
                "speculative backoff multiplier must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Gap to the next tick, given the gap that just elapsed.
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.mul_f64(self.multiplier).min(self.max)
    }
}
