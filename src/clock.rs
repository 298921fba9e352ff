//! Wall-clock time of day.

/// Number of seconds in one day.
pub const SECONDS_PER_DAY: u32 = 86_400;

/// Errors for rejected time input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeError {
    /// Hour, minute or second outside its range.
    InvalidTimeValue,

    /// Negative relative duration.
    InvalidDuration,
}

impl core::fmt::Display for TimeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TimeError::InvalidTimeValue => {
                write!(f, "time value out of range (hour 0-23, minute/second 0-59)")
            }
            TimeError::InvalidDuration => write!(f, "duration must not be negative"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TimeError {}

/// Half of a 12-hour day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Meridiem {
    Am,
    Pm,
}

impl Meridiem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Meridiem::Am => "AM",
            Meridiem::Pm => "PM",
        }
    }
}

/// A normalized time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Time {
    hour: u8,
    minute: u8,
    second: u8,
}

impl Time {
    pub const MIDNIGHT: Time = Time {
        hour: 0,
        minute: 0,
        second: 0,
    };

    /// Creates a time, rejecting out-of-range fields.
    pub fn new(hour: u8, minute: u8, second: u8) -> Result<Self, TimeError> {
        if hour >= 24 || minute >= 60 || second >= 60 {
            return Err(TimeError::InvalidTimeValue);
        }
        Ok(Self {
            hour,
            minute,
            second,
        })
    }

    /// Creates a time from seconds since midnight, wrapping at one day.
    pub fn from_seconds_of_day(seconds: u32) -> Self {
        let seconds = seconds % SECONDS_PER_DAY;
        Self {
            hour: (seconds / 3600) as u8,
            minute: (seconds / 60 % 60) as u8,
            second: (seconds % 60) as u8,
        }
    }

    #[inline]
    pub fn hour(&self) -> u8 {
        self.hour
    }

    #[inline]
    pub fn minute(&self) -> u8 {
        self.minute
    }

    #[inline]
    pub fn second(&self) -> u8 {
        self.second
    }

    /// Seconds since midnight.
    pub fn seconds_of_day(&self) -> u32 {
        self.hour as u32 * 3600 + self.minute as u32 * 60 + self.second as u32
    }

    /// Hour on a 12-hour dial (1-12) with its meridiem.
    pub fn hour12(&self) -> (u8, Meridiem) {
        let meridiem = if self.hour < 12 {
            Meridiem::Am
        } else {
            Meridiem::Pm
        };
        let hour = match self.hour % 12 {
            0 => 12,
            h => h,
        };
        (hour, meridiem)
    }
}

/// The authoritative wall clock, advanced once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Clock {
    now: Time,
}

impl Clock {
    pub fn new(now: Time) -> Self {
        Self { now }
    }

    pub fn now(&self) -> Time {
        self.now
    }

    /// Advances one second with minute, hour and day rollover.
    pub fn tick(&mut self) {
        self.now.second += 1;
        if self.now.second >= 60 {
            self.now.second = 0;
            self.now.minute += 1;
            if self.now.minute >= 60 {
                self.now.minute = 0;
                self.now.hour = (self.now.hour + 1) % 24;
            }
        }
    }

    /// Overwrites hour and minute and zeroes the seconds.
    pub fn set(&mut self, hour: u8, minute: u8) -> Result<(), TimeError> {
        self.now = Time::new(hour, minute, 0)?;
        Ok(())
    }

    /// Increments the hour, wrapping at 24. Zeroes the seconds.
    pub fn increment_hour(&mut self) {
        self.now.hour = (self.now.hour + 1) % 24;
        self.now.second = 0;
    }

    /// Increments the minute, wrapping at 60 without touching the hour.
    /// Zeroes the seconds.
    pub fn increment_minute(&mut self) {
        self.now.minute = (self.now.minute + 1) % 60;
        self.now.second = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_rolls_over_at_midnight() {
        let mut clock = Clock::new(Time::new(23, 59, 59).unwrap());
        clock.tick();
        assert_eq!(clock.now(), Time::MIDNIGHT);
    }

    #[test]
    fn tick_rolls_seconds_into_minutes() {
        let mut clock = Clock::new(Time::new(6, 14, 59).unwrap());
        clock.tick();
        assert_eq!(clock.now(), Time::new(6, 15, 0).unwrap());
    }

    #[test]
    fn set_rejects_out_of_range_and_keeps_time() {
        let start = Time::new(7, 30, 12).unwrap();
        let mut clock = Clock::new(start);
        assert_eq!(clock.set(24, 0), Err(TimeError::InvalidTimeValue));
        assert_eq!(clock.set(0, 60), Err(TimeError::InvalidTimeValue));
        assert_eq!(clock.now(), start);

        clock.set(9, 5).unwrap();
        assert_eq!(clock.now(), Time::new(9, 5, 0).unwrap());
    }

    #[test]
    fn hour12_maps_noon_and_midnight() {
        assert_eq!(Time::MIDNIGHT.hour12(), (12, Meridiem::Am));
        assert_eq!(Time::new(12, 0, 0).unwrap().hour12(), (12, Meridiem::Pm));
        assert_eq!(Time::new(13, 0, 0).unwrap().hour12(), (1, Meridiem::Pm));
        assert_eq!(Time::new(11, 59, 0).unwrap().hour12(), (11, Meridiem::Am));
    }

    #[test]
    fn seconds_of_day_wraps() {
        let t = Time::from_seconds_of_day(SECONDS_PER_DAY + 61);
        assert_eq!(t, Time::new(0, 1, 1).unwrap());
        assert_eq!(t.seconds_of_day(), 61);
    }
}
