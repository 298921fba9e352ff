#![cfg_attr(not(feature = "std"), no_std)]
#![doc = include_str!("../README.md")]

//! # Core Concepts
//!
//! - **`ModeController`**: Owns all state and collaborators; consumes `Event`s in arrival order
//! - **`Mode`**: `Normal`, `SettingTime`, `SettingAlarm`, `PreAlarmPolling` or `Ringing`
//! - **`InputManager`**: Debounces buttons A and B into short press, hold, repeat and release events
//! - **`Clock`** / **`AlarmStore`**: Volatile wall-clock time and the single alarm
//! - **`AlarmScheduler`**: Decides each tick whether to open the pre-alarm window or ring
//! - **`CubeLink`**: BLE connection to the paired GAN cube with backoff and a solved latch
//! - **`BleTransport`**, **`DisplaySink`**, **`Buzzer`**: Traits to implement for your hardware
//! - **`TimeSource`**: Trait to implement for your monotonic timer
//! - **`Config`**: Validated timing and cube identity, built with `Config::builder`
//! - **`ControlCommand`**: Programmatic control, parseable from console text

#[macro_use]
mod fmt;

pub mod alarm;
pub mod clock;
pub mod command;
pub mod config;
pub mod controller;
pub mod cube;
pub mod display;
pub mod input;
pub mod scheduler;
pub mod time;

pub use alarm::{Alarm, AlarmStore, RearmPolicy};
pub use clock::{Clock, Meridiem, Time, TimeError};
pub use command::{CommandError, ControlCommand, ParseError};
pub use config::{Config, ConfigBuilder, ConfigError};
pub use controller::{Buzzer, Event, Mode, ModeController};
pub use cube::{
    BleTransport, CubeCommand, CubeIdentity, CubeLink, LinkConfig, LinkError, LinkEvent,
    LinkPhase, TransportError,
};
pub use display::{DisplayPayload, DisplaySink, render};
pub use input::{Button, InputConfig, InputEvent, InputManager};
pub use scheduler::{AlarmScheduler, POLL_WINDOW_SECONDS, SchedulerSignal};
pub use time::{TimeDuration, TimeInstant, TimeSource};
