//! Shared test infrastructure for cube-alarm integration tests

#![allow(dead_code)] // Items used across multiple test files; Rust analyzes per-file

use cube_alarm::cube::{Characteristic, CubeState, Payload};
use cube_alarm::{
    BleTransport, Button, Buzzer, Config, CubeIdentity, DisplayPayload, DisplaySink, LinkEvent,
    ModeController, Time, TimeDuration, TimeInstant, TimeSource, TransportError,
};

// ============================================================================
// Mock Time Types
// ============================================================================

/// Mock duration type for testing (wraps milliseconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TestDuration(pub u64);

impl TimeDuration for TestDuration {
    const ZERO: Self = TestDuration(0);

    fn as_millis(&self) -> u64 {
        self.0
    }

    fn from_millis(millis: u64) -> Self {
        TestDuration(millis)
    }
}

/// Mock instant type for testing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TestInstant(pub u64);

impl TimeInstant for TestInstant {
    type Duration = TestDuration;

    fn duration_since(&self, earlier: Self) -> Self::Duration {
        TestDuration(self.0 - earlier.0)
    }

    fn checked_add(self, duration: Self::Duration) -> Option<Self> {
        self.0.checked_add(duration.0).map(TestInstant)
    }
}

// ============================================================================
// Mock Time Source
// ============================================================================

/// Mock time source with controllable time advancement
pub struct MockTimeSource {
    current_time: core::cell::Cell<TestInstant>,
}

impl MockTimeSource {
    pub fn new() -> Self {
        Self {
            current_time: core::cell::Cell::new(TestInstant(0)),
        }
    }

    /// Advance time by the given number of milliseconds
    pub fn advance(&self, millis: u64) {
        let current = self.current_time.get();
        self.current_time.set(TestInstant(current.0 + millis));
    }

    pub fn set_time(&self, time: TestInstant) {
        self.current_time.set(time);
    }
}

impl TimeSource<TestInstant> for MockTimeSource {
    fn now(&self) -> TestInstant {
        self.current_time.get()
    }
}

// ============================================================================
// Mock BLE Transport
// ============================================================================

/// One call made on the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    StartScan,
    StopScan,
    Connect([u8; 6]),
    Subscribe(Characteristic),
    Write(Characteristic, Payload),
    Disconnect,
}

/// Mock transport that records every call and fails on request
pub struct MockTransport {
    calls: heapless::Vec<TransportCall, 64>,
    /// Number of upcoming `start_scan` calls that fail
    pub fail_scans: u32,
    /// Number of upcoming `connect` calls that fail
    pub fail_connects: u32,
    /// Number of upcoming `write` calls that fail
    pub fail_writes: u32,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            calls: heapless::Vec::new(),
            fail_scans: 0,
            fail_connects: 0,
            fail_writes: 0,
        }
    }

    pub fn calls(&self) -> &[TransportCall] {
        &self.calls
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    pub fn count(&self, call: &TransportCall) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    pub fn scans(&self) -> usize {
        self.count(&TransportCall::StartScan)
    }

    /// Payloads written to the command characteristic
    pub fn writes(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, TransportCall::Write(Characteristic::Command, _)))
            .count()
    }

    fn record(&mut self, call: TransportCall) {
        let _ = self.calls.push(call);
    }

    fn take_failure(counter: &mut u32) -> bool {
        if *counter > 0 {
            *counter -= 1;
            true
        } else {
            false
        }
    }
}

impl BleTransport for MockTransport {
    fn start_scan(&mut self) -> Result<(), TransportError> {
        self.record(TransportCall::StartScan);
        if Self::take_failure(&mut self.fail_scans) {
            return Err(TransportError::Busy);
        }
        Ok(())
    }

    fn stop_scan(&mut self) {
        self.record(TransportCall::StopScan);
    }

    fn connect(&mut self, address: [u8; 6]) -> Result<(), TransportError> {
        self.record(TransportCall::Connect(address));
        if Self::take_failure(&mut self.fail_connects) {
            return Err(TransportError::Rejected);
        }
        Ok(())
    }

    fn subscribe(&mut self, characteristic: Characteristic) -> Result<(), TransportError> {
        self.record(TransportCall::Subscribe(characteristic));
        Ok(())
    }

    fn write(&mut self, characteristic: Characteristic, data: &[u8]) -> Result<(), TransportError> {
        let payload = Payload::from_slice(data).unwrap();
        self.record(TransportCall::Write(characteristic, payload));
        if Self::take_failure(&mut self.fail_writes) {
            return Err(TransportError::NotConnected);
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        self.record(TransportCall::Disconnect);
    }
}

// ============================================================================
// Mock Display and Buzzer
// ============================================================================

/// Mock display that keeps the last payload
pub struct MockDisplay {
    last: Option<DisplayPayload>,
    frames: usize,
}

impl MockDisplay {
    pub fn new() -> Self {
        Self {
            last: None,
            frames: 0,
        }
    }

    pub fn last(&self) -> &DisplayPayload {
        self.last.as_ref().unwrap()
    }

    pub fn frames(&self) -> usize {
        self.frames
    }
}

impl DisplaySink for MockDisplay {
    fn show(&mut self, payload: &DisplayPayload) {
        self.last = Some(payload.clone());
        self.frames += 1;
    }
}

/// Mock buzzer that records every state change
pub struct MockBuzzer {
    history: heapless::Vec<bool, 32>,
}

impl MockBuzzer {
    pub fn new() -> Self {
        Self {
            history: heapless::Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.history.last().copied().unwrap_or(false)
    }

    pub fn history(&self) -> &[bool] {
        &self.history
    }
}

impl Buzzer for MockBuzzer {
    fn set_active(&mut self, on: bool) {
        let _ = self.history.push(on);
    }
}

// ============================================================================
// Cube fixtures
// ============================================================================

/// Address of the test cube
pub const CUBE_MAC: [u8; 6] = [0xCF, 0xAA, 0x79, 0xC9, 0x96, 0x9C];

pub fn identity() -> CubeIdentity {
    CubeIdentity::from_mac(CUBE_MAC)
}

/// A state two swaps away from solved
pub fn scrambled_state() -> CubeState {
    let mut state = CubeState::SOLVED;
    state.corner_permutation.swap(0, 1);
    state.edge_permutation.swap(0, 1);
    state.corner_orientation[0] = 1;
    state.corner_orientation[1] = 2;
    state
}

/// Encrypted facelets notification for `state`
pub fn facelets_frame(state: &CubeState) -> Payload {
    identity().key().encrypt(&state.to_frame()).unwrap()
}

pub fn solved_frame() -> Payload {
    facelets_frame(&CubeState::SOLVED)
}

pub fn scrambled_frame() -> Payload {
    facelets_frame(&scrambled_state())
}

/// Encrypted 16-byte move notification
pub fn move_frame(code: u8, serial: u16) -> Payload {
    let mut clear = [0u8; 16];
    clear[0] = 0x55;
    clear[1] = 0x02;
    clear[2..4].copy_from_slice(&serial.to_le_bytes());
    clear[5] = code;
    identity().key().encrypt(&clear).unwrap()
}

// ============================================================================
// Controller helpers
// ============================================================================

pub type TestController<'t> =
    ModeController<'t, TestInstant, MockTimeSource, MockTransport, MockDisplay, MockBuzzer>;

pub fn controller_with(time: &MockTimeSource, config: Config, now: Time) -> TestController<'_> {
    ModeController::new(
        config,
        time,
        MockTransport::new(),
        MockDisplay::new(),
        MockBuzzer::new(),
        now,
    )
}

pub fn controller(time: &MockTimeSource, now: Time) -> TestController<'_> {
    controller_with(time, Config::builder(identity()).build().unwrap(), now)
}

/// Advances one second and ticks
pub fn tick(controller: &mut TestController<'_>, time: &MockTimeSource) {
    time.advance(1_000);
    controller.tick();
}

pub fn ticks(controller: &mut TestController<'_>, time: &MockTimeSource, count: u32) {
    for _ in 0..count {
        tick(controller, time);
    }
}

/// Samples both buttons every 10 ms for `millis`
pub fn hold_levels(
    controller: &mut TestController<'_>,
    time: &MockTimeSource,
    a: bool,
    b: bool,
    millis: u64,
) {
    let mut elapsed = 0;
    while elapsed < millis {
        controller.sample_buttons(a, b);
        time.advance(10);
        elapsed += 10;
    }
}

/// Presses `button` for `millis`, then releases it long enough to debounce
pub fn press(controller: &mut TestController<'_>, time: &MockTimeSource, button: Button, millis: u64) {
    let (a, b) = match button {
        Button::A => (true, false),
        Button::B => (false, true),
    };
    hold_levels(controller, time, a, b, millis);
    hold_levels(controller, time, false, false, 60);
}

pub fn short_press(controller: &mut TestController<'_>, time: &MockTimeSource, button: Button) {
    press(controller, time, button, 100);
}

pub fn long_press(controller: &mut TestController<'_>, time: &MockTimeSource, button: Button) {
    press(controller, time, button, 900);
}

/// Walks the link from scanning to subscribed
pub fn connect_cube(controller: &mut TestController<'_>) {
    controller.handle_link_event(LinkEvent::Advertisement { address: CUBE_MAC });
    controller.handle_link_event(LinkEvent::Connected);
    controller.handle_link_event(LinkEvent::Subscribed);
}
