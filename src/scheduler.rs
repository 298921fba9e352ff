//! Pre-alarm window and fire decisions.
//!
//! The cube radio is expensive, so it is only switched on inside a short
//! window before the alarm. [`AlarmScheduler::evaluate`] runs once per tick
//! and tells the controller when to open that window and when to ring.

use crate::alarm::Alarm;
use crate::clock::{SECONDS_PER_DAY, Time};

/// Default length of the pre-alarm polling window.
///
/// The window opens on the first tick with fewer than this many seconds
/// left, so a 10 s window opens 9 s before the alarm.
pub const POLL_WINDOW_SECONDS: u32 = 10;

/// Decision returned by [`AlarmScheduler::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SchedulerSignal {
    /// Nothing to do this tick.
    Idle,
    /// The alarm is less than one window away: start polling the cube.
    OpenWindow,
    /// The alarm is due.
    Fire,
    /// The window was open but the alarm was disarmed or moved away.
    CloseWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Waiting,
    WindowOpen,
    Fired,
}

/// Seconds from `now` forward to the armed alarm, `None` if disarmed.
///
/// The distance wraps at one day, so an alarm at the current second is `0`
/// and an alarm one second ago is almost a full day away.
pub fn seconds_until_alarm(now: Time, alarm: &Alarm) -> Option<u32> {
    if !alarm.is_armed() {
        return None;
    }
    let target = alarm.time().seconds_of_day();
    Some((target + SECONDS_PER_DAY - now.seconds_of_day()) % SECONDS_PER_DAY)
}

/// Tracks the window for the current alarm target.
#[derive(Debug, Clone, Copy)]
pub struct AlarmScheduler {
    window_secs: u32,
    phase: Phase,
    target: Option<u32>,
    last_now: Option<u32>,
}

impl AlarmScheduler {
    pub fn new(window_secs: u32) -> Self {
        Self {
            window_secs,
            phase: Phase::Waiting,
            target: None,
            last_now: None,
        }
    }

    pub fn window_secs(&self) -> u32 {
        self.window_secs
    }

    /// True while a window opened by this scheduler has not been closed or fired.
    pub fn is_window_open(&self) -> bool {
        self.phase == Phase::WindowOpen
    }

    pub fn evaluate(&mut self, now: Time, alarm: &Alarm) -> SchedulerSignal {
        let previous = self.last_now.replace(now.seconds_of_day());
        let Some(remaining) = seconds_until_alarm(now, alarm) else {
            let was_open = self.phase == Phase::WindowOpen;
            self.phase = Phase::Waiting;
            self.target = None;
            return if was_open {
                SchedulerSignal::CloseWindow
            } else {
                SchedulerSignal::Idle
            };
        };

        let target = alarm.time().seconds_of_day();
        let moved = self.target.is_some_and(|t| t != target);
        self.target = Some(target);

        match self.phase {
            Phase::Waiting => self.enter(remaining),
            Phase::WindowOpen => {
                if remaining == 0 {
                    self.phase = Phase::Fired;
                    SchedulerSignal::Fire
                } else if remaining < self.window_secs {
                    SchedulerSignal::Idle
                } else if !moved && previous.is_some_and(|p| skipped_over(p, now, target)) {
                    self.phase = Phase::Fired;
                    SchedulerSignal::Fire
                } else {
                    // The alarm or the clock was moved out of the window.
                    self.phase = Phase::Waiting;
                    SchedulerSignal::CloseWindow
                }
            }
            Phase::Fired => {
                if moved || remaining >= self.window_secs {
                    self.phase = Phase::Waiting;
                    if moved {
                        return self.enter(remaining);
                    }
                }
                SchedulerSignal::Idle
            }
        }
    }

    fn enter(&mut self, remaining: u32) -> SchedulerSignal {
        if remaining == 0 {
            self.phase = Phase::Fired;
            SchedulerSignal::Fire
        } else if remaining < self.window_secs {
            self.phase = Phase::WindowOpen;
            SchedulerSignal::OpenWindow
        } else {
            SchedulerSignal::Idle
        }
    }
}

/// True if the clock went forward from `previous` past `target` by less than
/// half a day.
fn skipped_over(previous: u32, now: Time, target: u32) -> bool {
    let advanced = (now.seconds_of_day() + SECONDS_PER_DAY - previous) % SECONDS_PER_DAY;
    let due_in = (target + SECONDS_PER_DAY - previous) % SECONDS_PER_DAY;
    advanced < SECONDS_PER_DAY / 2 && advanced >= due_in
}
