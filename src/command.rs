//! Programmatic control of the alarm clock.
//!
//! Commands reach the controller either as values or as text lines from a
//! serial console, parsed with [`ControlCommand::parse`]:
//!
//! ```text
//! alarm 7 30      set and arm the alarm
//! alarm_in 90     arm the alarm 90 seconds from now
//! disarm          disarm the alarm
//! time 6 45       set the clock
//! facelets        request the cube state
//! battery         request the cube battery level
//! hardware        request cube hardware info
//! reset           mark the cube's current state as solved
//! ```

use crate::clock::TimeError;
use crate::cube::{CubeCommand, LinkError};

/// Actions accepted by [`crate::ModeController::handle_command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlCommand {
    /// Set and arm the alarm.
    SetAlarm { hour: u8, minute: u8 },
    /// Arm the alarm relative to the current time.
    SetAlarmIn { seconds: i64 },
    /// Disarm the alarm.
    Disarm,
    /// Set the wall clock.
    SetTime { hour: u8, minute: u8 },
    /// Forward a command to the connected cube.
    Cube(CubeCommand),
}

/// Text command parse errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Blank line.
    Empty,
    /// Unknown command word.
    UnknownCommand,
    /// A required argument is missing.
    MissingArgument,
    /// An argument is not a number in range.
    InvalidNumber,
    /// Extra words after the last argument.
    TrailingInput,
}

impl core::fmt::Display for ParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ParseError::Empty => write!(f, "empty command"),
            ParseError::UnknownCommand => write!(f, "unknown command"),
            ParseError::MissingArgument => write!(f, "missing argument"),
            ParseError::InvalidNumber => write!(f, "invalid number"),
            ParseError::TrailingInput => write!(f, "unexpected trailing input"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseError {}

/// Errors from executing a [`ControlCommand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// Rejected time or duration; nothing changed.
    Time(TimeError),
    /// The cube is not connected.
    Cube(LinkError),
}

impl core::fmt::Display for CommandError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CommandError::Time(err) => write!(f, "{}", err),
            CommandError::Cube(err) => write!(f, "{}", err),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CommandError {}

impl From<TimeError> for CommandError {
    fn from(err: TimeError) -> Self {
        CommandError::Time(err)
    }
}

impl From<LinkError> for CommandError {
    fn from(err: LinkError) -> Self {
        CommandError::Cube(err)
    }
}

impl ControlCommand {
    /// Parses one console line. Words are separated by whitespace; command
    /// words are case-insensitive.
    ///
    /// Range checks on hours and minutes are left to the controller, which
    /// reports them as [`TimeError::InvalidTimeValue`].
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut words = line.split_whitespace();
        let word = words.next().ok_or(ParseError::Empty)?;

        let command = if word.eq_ignore_ascii_case("alarm") {
            let (hour, minute) = hour_minute(&mut words)?;
            ControlCommand::SetAlarm { hour, minute }
        } else if word.eq_ignore_ascii_case("alarm_in") {
            let seconds = number::<i64>(words.next())?;
            ControlCommand::SetAlarmIn { seconds }
        } else if word.eq_ignore_ascii_case("disarm") {
            ControlCommand::Disarm
        } else if word.eq_ignore_ascii_case("time") {
            let (hour, minute) = hour_minute(&mut words)?;
            ControlCommand::SetTime { hour, minute }
        } else if word.eq_ignore_ascii_case("facelets") {
            ControlCommand::Cube(CubeCommand::RequestFacelets)
        } else if word.eq_ignore_ascii_case("battery") {
            ControlCommand::Cube(CubeCommand::RequestBattery)
        } else if word.eq_ignore_ascii_case("hardware") {
            ControlCommand::Cube(CubeCommand::RequestHardware)
        } else if word.eq_ignore_ascii_case("reset") {
            ControlCommand::Cube(CubeCommand::ResetSolved)
        } else {
            return Err(ParseError::UnknownCommand);
        };

        if words.next().is_some() {
            return Err(ParseError::TrailingInput);
        }
        Ok(command)
    }
}

fn number<T: core::str::FromStr>(word: Option<&str>) -> Result<T, ParseError> {
    word.ok_or(ParseError::MissingArgument)?
        .parse()
        .map_err(|_| ParseError::InvalidNumber)
}

fn hour_minute<'a>(words: &mut impl Iterator<Item = &'a str>) -> Result<(u8, u8), ParseError> {
    let hour = number(words.next())?;
    let minute = number(words.next())?;
    Ok((hour, minute))
}
