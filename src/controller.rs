//! Top-level mode state machine.
//!
//! [`ModeController`] owns the clock, the alarm, the input debouncer, the
//! scheduler, the cube link and the two actuators. Every input reaches it as
//! an [`Event`], either queued with [`ModeController::enqueue`] from interrupt
//! or callback context and drained with [`ModeController::run_pending`], or
//! handled directly with [`ModeController::handle_event`].
//!
//! ```text
//!  SettingTime ◄─ HoldStart(A) ─► Normal ◄─ HoldStart(B) ─► SettingAlarm
//!                                 │   ▲
//!                      OpenWindow │   │ CloseWindow / disarm
//!                                 ▼   │
//!                           PreAlarmPolling
//!                                 │
//!                            Fire │         solved / HoldStart(B) ─► Normal
//!                                 ▼
//!                              Ringing
//! ```

use heapless::Deque;

use crate::alarm::{Alarm, AlarmStore};
use crate::clock::{Clock, Time};
use crate::command::{CommandError, ControlCommand};
use crate::config::Config;
use crate::cube::{BleTransport, CubeLink, LinkEvent};
use crate::display::{DisplayPayload, DisplaySink, render};
use crate::input::{Button, InputEvent, InputManager};
use crate::scheduler::{AlarmScheduler, SchedulerSignal, seconds_until_alarm};
use crate::time::{TimeInstant, TimeSource};

/// Capacity of the inbound event queue.
pub const EVENT_QUEUE_LEN: usize = 16;

/// Top-level operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Showing the time.
    #[default]
    Normal,
    /// Editing the clock.
    SettingTime,
    /// Editing the alarm.
    SettingAlarm,
    /// Alarm is close; the cube link is open.
    PreAlarmPolling,
    /// Buzzer on until the cube is solved or B is held.
    Ringing,
}

/// Trait for the alarm sound actuator.
pub trait Buzzer {
    fn set_active(&mut self, on: bool);
}

/// Inputs consumed by the controller, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The 1 Hz wall-clock tick.
    Tick,
    /// Raw button levels, `true` = pressed.
    Buttons { a: bool, b: bool },
    /// An already classified button event.
    Input(InputEvent),
    /// A completion or notification from the BLE stack.
    Link(LinkEvent),
    /// A programmatic control command.
    Command(ControlCommand),
}

/// Alarm clock orchestrator.
///
/// # Type Parameters
/// * `'t` - Lifetime of the time source reference
/// * `I` - Time instant type
/// * `T` - Time source implementation type
/// * `B` - BLE transport implementation type
/// * `D` - Display implementation type
/// * `Z` - Buzzer implementation type
pub struct ModeController<'t, I, T, B, D, Z>
where
    I: TimeInstant,
    T: TimeSource<I>,
    B: BleTransport,
    D: DisplaySink,
    Z: Buzzer,
{
    time_source: &'t T,
    mode: Mode,
    clock: Clock,
    alarms: AlarmStore,
    input: InputManager<I>,
    scheduler: AlarmScheduler,
    link: CubeLink<I, B>,
    display: D,
    buzzer: Z,
    queue: Deque<Event, EVENT_QUEUE_LEN>,
    suppressed: [bool; 2],
    shown: Option<DisplayPayload>,
}

impl<'t, I, T, B, D, Z> ModeController<'t, I, T, B, D, Z>
where
    I: TimeInstant,
    T: TimeSource<I>,
    B: BleTransport,
    D: DisplaySink,
    Z: Buzzer,
{
    /// Creates a controller in `Normal` mode with the buzzer off and the
    /// alarm disarmed at 07:00.
    pub fn new(
        config: Config,
        time_source: &'t T,
        transport: B,
        display: D,
        mut buzzer: Z,
        now: Time,
    ) -> Self {
        buzzer.set_active(false);

        let mut controller = Self {
            time_source,
            mode: Mode::Normal,
            clock: Clock::new(now),
            alarms: AlarmStore::new(config.rearm),
            input: InputManager::new(config.input),
            scheduler: AlarmScheduler::new(config.poll_window_secs),
            link: CubeLink::new(transport, config.identity, config.link),
            display,
            buzzer,
            queue: Deque::new(),
            suppressed: [false; 2],
            shown: None,
        };
        controller.refresh_display();
        controller
    }

    /// Queues an event. Returns it back if the queue is full.
    pub fn enqueue(&mut self, event: Event) -> Result<(), Event> {
        self.queue.push_back(event)
    }

    /// Handles queued events in arrival order. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.queue.pop_front() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Handles one event immediately. Errors are logged, never returned:
    /// nothing may stop the alarm from ringing or from being stopped.
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Tick => self.tick(),
            Event::Buttons { a, b } => self.sample_buttons(a, b),
            Event::Input(input) => self.handle_input(input),
            Event::Link(link) => self.handle_link_event(link),
            Event::Command(command) => {
                if let Err(err) = self.handle_command(command) {
                    warn!("command {:?} rejected: {}", command, err);
                }
            }
        }
    }

    /// Advances the clock by one second and runs the scheduler.
    pub fn tick(&mut self) {
        self.clock.tick();
        self.evaluate_alarm();
        self.service();
        self.refresh_display();
    }

    /// Runs due link retries and deferred cube requests. Call on every loop
    /// iteration; [`tick`](Self::tick) also calls it.
    pub fn service(&mut self) {
        if let Err(err) = self.link.poll(self.time_source.now()) {
            warn!("cube link: {}", err);
        }
    }

    /// Debounces raw button levels and handles the resulting events.
    pub fn sample_buttons(&mut self, a_pressed: bool, b_pressed: bool) {
        let now = self.time_source.now();
        for event in self.input.sample_pair(a_pressed, b_pressed, now) {
            self.handle_input(event);
        }
    }

    /// Applies one classified button event to the current mode.
    pub fn handle_input(&mut self, event: InputEvent) {
        let button = event.button();
        let index = button.index();
        if self.suppressed[index] {
            if let InputEvent::Release(_) = event {
                self.suppressed[index] = false;
            }
            return;
        }

        match (self.mode, event) {
            (Mode::Normal, InputEvent::HoldStart(Button::A)) => self.set_mode(Mode::SettingTime),
            (Mode::Normal, InputEvent::HoldStart(Button::B)) => self.set_mode(Mode::SettingAlarm),

            (Mode::SettingTime, InputEvent::HoldStart(Button::A)) => self.set_mode(Mode::Normal),
            (Mode::SettingTime, InputEvent::ShortPress(Button::A)) => self.clock.increment_hour(),
            (
                Mode::SettingTime,
                InputEvent::ShortPress(Button::B)
                | InputEvent::HoldStart(Button::B)
                | InputEvent::HoldRepeat(Button::B),
            ) => self.clock.increment_minute(),

            (Mode::SettingAlarm, InputEvent::HoldStart(Button::B)) => self.set_mode(Mode::Normal),
            (
                Mode::SettingAlarm,
                InputEvent::ShortPress(Button::A)
                | InputEvent::HoldStart(Button::A)
                | InputEvent::HoldRepeat(Button::A),
            ) => {
                self.alarms.increment_hour();
                self.alarms.arm();
            }
            (Mode::SettingAlarm, InputEvent::ShortPress(Button::B)) => {
                self.alarms.increment_minute();
                self.alarms.arm();
            }

            (Mode::Ringing, InputEvent::HoldStart(Button::B)) => {
                info!("alarm stopped by long press");
                self.stop_ringing();
            }

            _ => return,
        }
        self.refresh_display();
    }

    /// Feeds a BLE completion or notification to the cube link.
    pub fn handle_link_event(&mut self, event: LinkEvent) {
        if let Err(err) = self.link.handle_event(event, self.time_source.now()) {
            warn!("cube link: {}", err);
        }
        if self.mode == Mode::Ringing && self.link.is_solved() {
            info!("alarm stopped by solved cube");
            self.stop_ringing();
        }
        self.refresh_display();
    }

    /// Executes a control command.
    ///
    /// # Errors
    /// * `Time` - invalid time or negative duration; nothing changed
    /// * `Cube` - a cube command was sent without a subscribed link
    pub fn handle_command(&mut self, command: ControlCommand) -> Result<(), CommandError> {
        match command {
            ControlCommand::SetAlarm { hour, minute } => {
                self.alarms.set_alarm(hour, minute)?;
                info!("alarm set to {}:{}", hour, minute);
            }
            ControlCommand::SetAlarmIn { seconds } => {
                self.alarms.set_alarm_in(self.clock.now(), seconds)?;
                info!("alarm set {} s from now", seconds);
                // The next tick moves the clock past a target at the current second.
                if seconds_until_alarm(self.clock.now(), &self.alarms.alarm()) == Some(0) {
                    self.evaluate_alarm();
                }
            }
            ControlCommand::Disarm => {
                self.alarms.disarm();
                if self.mode == Mode::PreAlarmPolling {
                    self.close_window();
                }
            }
            ControlCommand::SetTime { hour, minute } => self.clock.set(hour, minute)?,
            ControlCommand::Cube(cube) => self.link.send_command(cube)?,
        }
        self.refresh_display();
        Ok(())
    }

    fn evaluate_alarm(&mut self) {
        if matches!(self.mode, Mode::Normal | Mode::PreAlarmPolling) {
            let signal = self.scheduler.evaluate(self.clock.now(), &self.alarms.alarm());
            self.apply_signal(signal);
        }
    }

    fn apply_signal(&mut self, signal: SchedulerSignal) {
        match signal {
            SchedulerSignal::Idle => {}
            SchedulerSignal::OpenWindow => {
                if self.mode == Mode::Normal {
                    info!("pre-alarm window open");
                    self.set_mode(Mode::PreAlarmPolling);
                    self.open_link();
                }
            }
            SchedulerSignal::Fire => self.start_ringing(),
            SchedulerSignal::CloseWindow => {
                if self.mode == Mode::PreAlarmPolling {
                    self.close_window();
                }
            }
        }
    }

    fn start_ringing(&mut self) {
        info!("alarm ringing");
        self.set_mode(Mode::Ringing);
        self.buzzer.set_active(true);
        // The window may have been skipped; solving must still work.
        self.open_link();
        if self.link.is_solved() {
            info!("cube already solved");
            self.stop_ringing();
        }
    }

    fn stop_ringing(&mut self) {
        if self.mode != Mode::Ringing {
            return;
        }
        self.buzzer.set_active(false);
        self.link.close();
        self.alarms.complete_cycle();
        self.set_mode(Mode::Normal);
        for button in [Button::A, Button::B] {
            if self.input.is_pressed(button) {
                self.suppressed[button.index()] = true;
            }
        }
    }

    fn close_window(&mut self) {
        info!("pre-alarm window closed");
        self.link.close();
        self.set_mode(Mode::Normal);
    }

    fn open_link(&mut self) {
        if let Err(err) = self.link.open(self.time_source.now()) {
            warn!("cube link: {}", err);
        }
    }

    fn set_mode(&mut self, mode: Mode) {
        if mode != self.mode {
            debug!("mode {:?} -> {:?}", self.mode, mode);
            self.mode = mode;
        }
    }

    /// Pushes a new payload to the display if it differs from the last one.
    fn refresh_display(&mut self) {
        let payload = render(
            self.mode,
            self.clock.now(),
            &self.alarms.alarm(),
            self.link.phase(),
        );
        if self.shown.as_ref() != Some(&payload) {
            self.display.show(&payload);
            self.shown = Some(payload);
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn time(&self) -> Time {
        self.clock.now()
    }

    pub fn alarm(&self) -> Alarm {
        self.alarms.alarm()
    }

    pub fn link(&self) -> &CubeLink<I, B> {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut CubeLink<I, B> {
        &mut self.link
    }

    pub fn input(&self) -> &InputManager<I> {
        &self.input
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn buzzer(&self) -> &Z {
        &self.buzzer
    }

    /// True while `button` is ignored until its next release.
    pub fn is_suppressed(&self, button: Button) -> bool {
        self.suppressed[button.index()]
    }
}
