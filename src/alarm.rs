//! The single volatile alarm.

use crate::clock::{SECONDS_PER_DAY, Time, TimeError};

/// What happens to the alarm after it has rung and been stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RearmPolicy {
    /// Disarm after one ring-and-stop cycle.
    #[default]
    Once,

    /// Stay armed and ring again the next day.
    Daily,
}

/// Alarm time plus its armed flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Alarm {
    hour: u8,
    minute: u8,
    second: u8,
    armed: bool,
}

impl Alarm {
    /// A disarmed alarm holding the given time.
    pub const fn disarmed(hour: u8, minute: u8) -> Self {
        Self {
            hour: hour % 24,
            minute: minute % 60,
            second: 0,
            armed: false,
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

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// The time of day the alarm rings at.
    pub fn time(&self) -> Time {
        Time::from_seconds_of_day(
            self.hour as u32 * 3600 + self.minute as u32 * 60 + self.second as u32,
        )
    }
}

impl Default for Alarm {
    fn default() -> Self {
        Alarm::disarmed(7, 0)
    }
}

/// Owner of the alarm. Every mutation goes through one of its methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlarmStore {
    alarm: Alarm,
    policy: RearmPolicy,
}

impl AlarmStore {
    pub fn new(policy: RearmPolicy) -> Self {
        Self {
            alarm: Alarm::default(),
            policy,
        }
    }

    pub fn alarm(&self) -> Alarm {
        self.alarm
    }

    pub fn policy(&self) -> RearmPolicy {
        self.policy
    }

    /// Sets and arms the alarm.
    ///
    /// # Errors
    /// * `InvalidTimeValue` - hour or minute out of range; the alarm is unchanged
    pub fn set_alarm(&mut self, hour: u8, minute: u8) -> Result<(), TimeError> {
        let time = Time::new(hour, minute, 0)?;
        self.store(time);
        Ok(())
    }

    /// Arms the alarm `seconds` after `now`, wrapping past midnight.
    ///
    /// # Errors
    /// * `InvalidDuration` - `seconds` is negative; the alarm is unchanged
    pub fn set_alarm_in(&mut self, now: Time, seconds: i64) -> Result<(), TimeError> {
        if seconds < 0 {
            return Err(TimeError::InvalidDuration);
        }
        let offset = (seconds % SECONDS_PER_DAY as i64) as u32;
        self.store(Time::from_seconds_of_day(now.seconds_of_day() + offset));
        Ok(())
    }

    fn store(&mut self, time: Time) {
        self.alarm = Alarm {
            hour: time.hour(),
            minute: time.minute(),
            second: time.second(),
            armed: true,
        };
    }

    /// Re-arms the stored alarm time.
    pub fn arm(&mut self) {
        self.alarm.armed = true;
    }

    /// Clears the armed flag, keeping the time.
    pub fn disarm(&mut self) {
        self.alarm.armed = false;
    }

    pub fn increment_hour(&mut self) {
        self.alarm.hour = (self.alarm.hour + 1) % 24;
        self.alarm.second = 0;
    }

    pub fn increment_minute(&mut self) {
        self.alarm.minute = (self.alarm.minute + 1) % 60;
        self.alarm.second = 0;
    }

    /// Applies the re-arm policy after the alarm rang and was stopped.
    pub fn complete_cycle(&mut self) {
        if self.policy == RearmPolicy::Once {
            self.alarm.armed = false;
        }
    }
}
