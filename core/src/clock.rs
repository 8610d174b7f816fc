//! Wall-clock source for cookie expiry stamps.
//!
//! RULE: Nothing in the resolver reads the system clock directly.
//! "Now" is always handed in from a Clock, so tests can pin it and
//! assert exact expiry timestamps.

use chrono::{DateTime, TimeZone, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    /// Real wall-clock time (production).
    System,
    /// A frozen instant (tests).
    Fixed(DateTime<Utc>),
}

impl Clock {
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(instant) => *instant,
        }
    }

    /// A fixed clock at the given unix timestamp (seconds).
    pub fn fixed_at(unix_secs: i64) -> Self {
        Clock::Fixed(Utc.timestamp_opt(unix_secs, 0).single().unwrap_or_default())
    }
}
