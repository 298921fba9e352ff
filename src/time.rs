//! Monotonic time abstraction traits.
//!
//! The wall clock (see [`crate::clock`]) only advances on the 1 Hz tick. Button
//! debouncing and BLE retry deadlines need finer, monotonic time, which the
//! platform provides through these traits.

/// Trait for abstracting time sources.
pub trait TimeSource<I: TimeInstant> {
    /// Returns the current time instant.
    fn now(&self) -> I;
}

/// Trait abstraction for duration types.
pub trait TimeDuration: Copy + PartialEq {
    /// Zero duration constant.
    const ZERO: Self;

    /// Converts duration to milliseconds.
    fn as_millis(&self) -> u64;

    /// Creates duration from milliseconds.
    fn from_millis(millis: u64) -> Self;
}

/// Trait abstraction for instant types.
///
/// Instants must be ordered so deadlines can be compared without
/// computing a negative duration.
pub trait TimeInstant: Copy + PartialOrd {
    /// Duration type for this instant.
    type Duration: TimeDuration;

    /// Calculates duration since an earlier instant.
    fn duration_since(&self, earlier: Self) -> Self::Duration;

    /// Adds duration to instant, returns None on overflow.
    fn checked_add(self, duration: Self::Duration) -> Option<Self>;
}

/// Milliseconds elapsed from `earlier` to `now`, zero if `now` is earlier.
pub(crate) fn millis_since<I: TimeInstant>(now: I, earlier: I) -> u64 {
    if now < earlier {
        0
    } else {
        now.duration_since(earlier).as_millis()
    }
}

/// `now + millis`, saturating at `now` if the instant type would overflow.
pub(crate) fn deadline_after<I: TimeInstant>(now: I, millis: u64) -> I {
    now.checked_add(I::Duration::from_millis(millis)).unwrap_or(now)
}
