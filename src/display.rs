//! Rendering of controller state into a display payload.

use core::fmt::Write;

use heapless::String;

use crate::alarm::Alarm;
use crate::clock::{Meridiem, Time};
use crate::controller::Mode;
use crate::cube::LinkPhase;

/// Capacity of [`DisplayPayload::time`], enough for `"12:59"`.
pub const TIME_TEXT_LEN: usize = 8;

/// Capacity of [`DisplayPayload::line`].
pub const LINE_LEN: usize = 16;

/// Everything the display driver needs for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayPayload {
    pub mode: Mode,
    /// Main time text on a 12-hour dial, e.g. `"7:05"`.
    pub time: String<TIME_TEXT_LEN>,
    pub meridiem: Meridiem,
    /// Status line below the time.
    pub line: String<LINE_LEN>,
    /// False on the off phase of the blinking edited value in setting modes.
    pub blink_visible: bool,
}

/// Display driver.
pub trait DisplaySink {
    fn show(&mut self, payload: &DisplayPayload);
}

/// Builds the payload for the given state. Pure; the caller decides when to
/// push it to a [`DisplaySink`].
pub fn render(mode: Mode, now: Time, alarm: &Alarm, link: LinkPhase) -> DisplayPayload {
    let shown = match mode {
        Mode::SettingAlarm => alarm.time(),
        _ => now,
    };
    let (time, meridiem) = time_text(shown);

    let mut line = String::new();
    let _ = match mode {
        Mode::Normal if alarm.is_armed() => {
            let (text, meridiem) = time_text(alarm.time());
            write!(line, "AL {} {}", text, meridiem.as_str())
        }
        Mode::Normal => line.write_str("AL OFF"),
        Mode::SettingTime => line.write_str("SET TIME"),
        Mode::SettingAlarm => line.write_str("SET ALARM"),
        Mode::PreAlarmPolling => line.write_str(link_status(link)),
        Mode::Ringing => line.write_str("Solve cube!"),
    };

    let blink_visible = match mode {
        Mode::SettingTime | Mode::SettingAlarm => now.second() % 2 == 0,
        _ => true,
    };

    DisplayPayload {
        mode,
        time,
        meridiem,
        line,
        blink_visible,
    }
}

fn time_text(time: Time) -> (String<TIME_TEXT_LEN>, Meridiem) {
    let (hour, meridiem) = time.hour12();
    let mut text = String::new();
    let _ = write!(text, "{}:{:02}", hour, time.minute());
    (text, meridiem)
}

fn link_status(phase: LinkPhase) -> &'static str {
    match phase {
        LinkPhase::Disconnected => "Cube offline",
        LinkPhase::Scanning => "Cube scanning",
        LinkPhase::Connecting => "Cube connecting",
        LinkPhase::Connected => "Cube connected",
        LinkPhase::Subscribed => "Cube ready",
    }
}
