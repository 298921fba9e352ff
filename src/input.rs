//! Two-button debouncing and press classification.
//!
//! Raw levels are sampled at a fixed interval (or on every edge interrupt) and
//! fed to [`InputManager::sample`]. A level only counts once it has been stable
//! for the debounce window, so contact bounce never produces events.
//!
//! ```text
//!            stable >= debounce               held >= hold
//!  Released ───────────────────► Pressed ─────────────────► Held
//!     ▲                             │                         │
//!     │  ShortPress + Release       │     Release             │
//!     └─────────────────────────────┴─────────────────────────┘
//! ```

use crate::time::{TimeInstant, millis_since};
use heapless::Vec;

/// One of the two physical buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Button {
    A,
    B,
}

impl Button {
    pub(crate) fn index(self) -> usize {
        match self {
            Button::A => 0,
            Button::B => 1,
        }
    }
}

/// Discrete events produced from debounced button levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputEvent {
    /// Pressed and released before the hold threshold.
    ShortPress(Button),
    /// Held past the hold threshold. Fires once per press.
    HoldStart(Button),
    /// Still held, one repeat interval after the previous hold event.
    HoldRepeat(Button),
    /// Released, after either a short press or a hold.
    Release(Button),
}

impl InputEvent {
    pub fn button(&self) -> Button {
        match *self {
            InputEvent::ShortPress(b)
            | InputEvent::HoldStart(b)
            | InputEvent::HoldRepeat(b)
            | InputEvent::Release(b) => b,
        }
    }
}

/// Events from one sample of one button.
pub type InputEvents = Vec<InputEvent, 2>;

/// Events from one sample of both buttons.
pub type PairEvents = Vec<InputEvent, 4>;

/// Debounce and hold timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InputConfig {
    /// Time a raw level must stay stable before it is accepted.
    pub debounce_ms: u64,
    /// Press duration after which a hold is reported.
    pub hold_ms: u64,
    /// Interval between hold repeats, `None` disables repeats.
    pub repeat_ms: Option<u64>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 30,
            hold_ms: 800,
            repeat_ms: Some(200),
        }
    }
}

/// Per-button debounce state.
#[derive(Debug, Clone, Copy)]
pub struct ButtonState<I: TimeInstant> {
    raw_level: bool,
    debounced_level: bool,
    raw_changed_at: Option<I>,
    press_start_time: Option<I>,
    held_fired: bool,
    last_repeat: Option<I>,
}

impl<I: TimeInstant> ButtonState<I> {
    const fn new() -> Self {
        Self {
            raw_level: false,
            debounced_level: false,
            raw_changed_at: None,
            press_start_time: None,
            held_fired: false,
            last_repeat: None,
        }
    }

    pub fn raw_level(&self) -> bool {
        self.raw_level
    }

    pub fn debounced_level(&self) -> bool {
        self.debounced_level
    }

    pub fn press_start_time(&self) -> Option<I> {
        self.press_start_time
    }

    pub fn held_fired(&self) -> bool {
        self.held_fired
    }

    fn sample(&mut self, button: Button, pressed: bool, now: I, config: &InputConfig) -> InputEvents {
        let mut events = InputEvents::new();

        if pressed != self.raw_level {
            self.raw_level = pressed;
            self.raw_changed_at = Some(now);
        }

        if self.raw_level != self.debounced_level {
            let stable_since = self.raw_changed_at.unwrap_or(now);
            if millis_since(now, stable_since) >= config.debounce_ms {
                self.debounced_level = self.raw_level;
                if self.debounced_level {
                    self.press_start_time = Some(now);
                    self.held_fired = false;
                    self.last_repeat = None;
                } else {
                    if !self.held_fired {
                        let _ = events.push(InputEvent::ShortPress(button));
                    }
                    let _ = events.push(InputEvent::Release(button));
                    self.press_start_time = None;
                    self.held_fired = false;
                    self.last_repeat = None;
                    return events;
                }
            }
        }

        if let (true, Some(start)) = (self.debounced_level, self.press_start_time) {
            if !self.held_fired {
                if millis_since(now, start) >= config.hold_ms {
                    self.held_fired = true;
                    self.last_repeat = Some(now);
                    let _ = events.push(InputEvent::HoldStart(button));
                }
            } else if let (Some(interval), Some(last)) = (config.repeat_ms, self.last_repeat) {
                if millis_since(now, last) >= interval {
                    self.last_repeat = Some(now);
                    let _ = events.push(InputEvent::HoldRepeat(button));
                }
            }
        }

        events
    }
}

/// Debouncer and press classifier for buttons A and B.
#[derive(Debug, Clone, Copy)]
pub struct InputManager<I: TimeInstant> {
    config: InputConfig,
    buttons: [ButtonState<I>; 2],
}

impl<I: TimeInstant> InputManager<I> {
    pub fn new(config: InputConfig) -> Self {
        Self {
            config,
            buttons: [ButtonState::new(), ButtonState::new()],
        }
    }

    pub fn config(&self) -> &InputConfig {
        &self.config
    }

    /// Feeds one raw level sample (`true` = pressed) for `button`.
    pub fn sample(&mut self, button: Button, pressed: bool, now: I) -> InputEvents {
        self.buttons[button.index()].sample(button, pressed, now, &self.config)
    }

    /// Samples both buttons at the same instant, A first.
    pub fn sample_pair(&mut self, a_pressed: bool, b_pressed: bool, now: I) -> PairEvents {
        let mut events = PairEvents::new();
        for event in self.sample(Button::A, a_pressed, now) {
            let _ = events.push(event);
        }
        for event in self.sample(Button::B, b_pressed, now) {
            let _ = events.push(event);
        }
        events
    }

    /// Debounced level of `button`.
    pub fn is_pressed(&self, button: Button) -> bool {
        self.buttons[button.index()].debounced_level
    }

    pub fn state(&self, button: Button) -> &ButtonState<I> {
        &self.buttons[button.index()]
    }
}
