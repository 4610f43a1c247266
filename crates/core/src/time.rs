use chrono::{DateTime, Utc};

/// Time source handed to every service so tests can pin the clock.
///
/// `Default` reads the system clock; `Fixed` always answers with the instant
/// it was built from.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock pinned to `at`.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Reads the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(at) => *at,
        }
    }
}

/// Epoch seconds used by deterministic tests (2025-08-01T00:00:00Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_754_006_400;

/// The deterministic test instant as a `DateTime<Utc>`.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// A clock pinned at [`fixed_now`].
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}
