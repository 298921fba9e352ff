//! BLE connection lifecycle for the paired cube.
//!
//! The link is only open during the pre-alarm window and while ringing.
//! Transport calls never block: each one starts a step, and the stack reports
//! completion later as a [`LinkEvent`]. A failed step drops the link back to
//! `Disconnected` and schedules a fresh scan after an exponential backoff.
//!
//! ```text
//!  Disconnected ─scan─► Scanning ─advert─► Connecting ─connected─► Connected ─subscribed─► Subscribed
//!        ▲                                                                                     │
//!        └──────────────────── failure / disconnect (retry after backoff) ─────────────────────┘
//! ```

use crate::cube::protocol::{
    Characteristic, CubeCommand, CubeIdentity, CubeKey, CubePacket, DecodeError, Payload, decode,
};
use crate::time::{TimeInstant, deadline_after};

/// Non-blocking BLE central primitives.
///
/// Implement this for your BLE stack. Every method only starts an operation;
/// completions and notifications are fed back through
/// [`CubeLink::handle_event`].
pub trait BleTransport {
    /// Starts scanning for advertisements.
    fn start_scan(&mut self) -> Result<(), TransportError>;

    /// Stops an active scan. Must be safe to call when not scanning.
    fn stop_scan(&mut self);

    /// Starts connecting to an advertised address.
    fn connect(&mut self, address: [u8; 6]) -> Result<(), TransportError>;

    /// Enables notifications on a characteristic of the connected cube.
    fn subscribe(&mut self, characteristic: Characteristic) -> Result<(), TransportError>;

    /// Writes without response to a characteristic of the connected cube.
    fn write(&mut self, characteristic: Characteristic, data: &[u8]) -> Result<(), TransportError>;

    /// Drops the connection. Must be safe to call in any state.
    fn disconnect(&mut self);
}

/// Failures reported by the BLE stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// The radio is busy with another operation.
    Busy,
    /// The operation needs a connection that does not exist.
    NotConnected,
    /// The peer or the stack rejected the operation.
    Rejected,
    /// The connection dropped or a step failed asynchronously.
    ConnectionLost,
}

impl core::fmt::Display for TransportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TransportError::Busy => write!(f, "radio busy"),
            TransportError::NotConnected => write!(f, "not connected"),
            TransportError::Rejected => write!(f, "operation rejected"),
            TransportError::ConnectionLost => write!(f, "connection lost"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TransportError {}

/// Errors surfaced by the link. None of them are fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// A connection step failed; a retry has been scheduled.
    BleConnectionFailure(TransportError),
    /// A notification could not be decoded and was dropped.
    NotificationDecode(DecodeError),
    /// The operation needs a subscribed link.
    NotSubscribed,
}

impl core::fmt::Display for LinkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LinkError::BleConnectionFailure(err) => write!(f, "cube connection failed: {}", err),
            LinkError::NotificationDecode(err) => write!(f, "bad cube notification: {}", err),
            LinkError::NotSubscribed => write!(f, "cube link is not subscribed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LinkError {}

impl From<DecodeError> for LinkError {
    fn from(err: DecodeError) -> Self {
        LinkError::NotificationDecode(err)
    }
}

/// Completions and data reported by the BLE stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// An advertisement was received while scanning.
    Advertisement { address: [u8; 6] },
    /// The scan ended without being stopped.
    ScanComplete,
    /// The connection started by [`BleTransport::connect`] is up.
    Connected,
    /// Notifications on the state characteristic are enabled.
    Subscribed,
    /// The peer dropped the connection.
    Disconnected,
    /// The pending step failed asynchronously.
    Failed,
    /// A notification from the state characteristic.
    Notification(Payload),
}

/// Connection phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkPhase {
    Disconnected,
    Scanning,
    Connecting,
    Connected,
    Subscribed,
}

/// Retry and polling timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkConfig {
    /// Delay before the first retry after a failure.
    pub backoff_initial_ms: u64,
    /// Upper bound for the doubling retry delay.
    pub backoff_max_ms: u64,
    /// Extra attempts for the facelets request after subscribing.
    pub facelet_retries: u8,
    /// Delay between facelets request attempts.
    pub facelet_retry_ms: u64,
    /// Delay between a move frame and the facelets poll it triggers.
    pub facelet_poll_delay_ms: u64,
    /// Minimum spacing of move-triggered facelets polls.
    pub facelet_rate_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            backoff_initial_ms: 250,
            backoff_max_ms: 2_000,
            facelet_retries: 3,
            facelet_retry_ms: 200,
            facelet_poll_delay_ms: 80,
            facelet_rate_ms: 250,
        }
    }
}

/// State of one open link, dropped on close.
#[derive(Debug, Clone, Copy)]
pub struct CubeConnection<I: TimeInstant> {
    phase: LinkPhase,
    last_notification_time: Option<I>,
    solved: bool,
    peer: Option<[u8; 6]>,
    key: Option<CubeKey>,
    retry_at: Option<I>,
    backoff_ms: u64,
    attempts: u32,
    pending_requests: u8,
    next_request_at: Option<I>,
    poll_allowed_at: Option<I>,
}

impl<I: TimeInstant> CubeConnection<I> {
    fn new(backoff_ms: u64) -> Self {
        Self {
            phase: LinkPhase::Disconnected,
            last_notification_time: None,
            solved: false,
            peer: None,
            key: None,
            retry_at: None,
            backoff_ms,
            attempts: 0,
            pending_requests: 0,
            next_request_at: None,
            poll_allowed_at: None,
        }
    }

    pub fn phase(&self) -> LinkPhase {
        self.phase
    }

    pub fn last_notification_time(&self) -> Option<I> {
        self.last_notification_time
    }

    pub fn solved(&self) -> bool {
        self.solved
    }

    /// Address the cube advertised from, once found.
    pub fn peer(&self) -> Option<[u8; 6]> {
        self.peer
    }

    /// Connection attempts started since the link was opened.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Owner of the cube connection and of the transport.
pub struct CubeLink<I: TimeInstant, B: BleTransport> {
    transport: B,
    identity: CubeIdentity,
    config: LinkConfig,
    connection: Option<CubeConnection<I>>,
}

impl<I: TimeInstant, B: BleTransport> CubeLink<I, B> {
    pub fn new(transport: B, identity: CubeIdentity, config: LinkConfig) -> Self {
        Self {
            transport,
            identity,
            config,
            connection: None,
        }
    }

    pub fn transport(&self) -> &B {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut B {
        &mut self.transport
    }

    pub fn identity(&self) -> &CubeIdentity {
        &self.identity
    }

    pub fn connection(&self) -> Option<&CubeConnection<I>> {
        self.connection.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    pub fn phase(&self) -> LinkPhase {
        self.connection
            .as_ref()
            .map_or(LinkPhase::Disconnected, |c| c.phase)
    }

    /// Latched solved flag. Only `open` and `close` clear it.
    pub fn is_solved(&self) -> bool {
        self.connection.as_ref().is_some_and(|c| c.solved)
    }

    pub fn last_notification_time(&self) -> Option<I> {
        self.connection.as_ref().and_then(|c| c.last_notification_time)
    }

    /// Opens the link and starts scanning. Does nothing if already open.
    ///
    /// A failure to start the scan is returned but the link stays open with a
    /// retry scheduled.
    pub fn open(&mut self, now: I) -> Result<(), LinkError> {
        if self.connection.is_some() {
            return Ok(());
        }
        info!("cube link: open");
        self.connection = Some(CubeConnection::new(self.config.backoff_initial_ms));
        self.start_scan(now)
    }

    /// Tears the link down from any phase and forgets the solved flag.
    pub fn close(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        match connection.phase {
            LinkPhase::Disconnected => {}
            LinkPhase::Scanning => self.transport.stop_scan(),
            LinkPhase::Connecting | LinkPhase::Connected | LinkPhase::Subscribed => {
                self.transport.disconnect()
            }
        }
        info!("cube link: closed after {} attempts", connection.attempts);
    }

    /// Runs due retries and deferred facelets requests.
    pub fn poll(&mut self, now: I) -> Result<(), LinkError> {
        let Some(connection) = self.connection.as_ref() else {
            return Ok(());
        };
        match connection.phase {
            LinkPhase::Disconnected => {
                if connection.retry_at.is_none_or(|at| now >= at) {
                    return self.start_scan(now);
                }
            }
            LinkPhase::Subscribed => {
                let due = connection.pending_requests > 0
                    && connection.next_request_at.is_none_or(|at| now >= at);
                if due {
                    self.request_facelets(now);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Feeds one completion or notification from the BLE stack.
    ///
    /// Events that do not fit the current phase are ignored, so late
    /// completions after `close` are harmless.
    pub fn handle_event(&mut self, event: LinkEvent, now: I) -> Result<(), LinkError> {
        let Some(phase) = self.connection.as_ref().map(|c| c.phase) else {
            return Ok(());
        };

        match (event, phase) {
            (LinkEvent::Advertisement { address }, LinkPhase::Scanning) => {
                if !self.identity.matches(&address) {
                    return Ok(());
                }
                info!("cube link: found cube, connecting");
                self.transport.stop_scan();
                match self.transport.connect(address) {
                    Ok(()) => {
                        self.set_phase(LinkPhase::Connecting);
                        if let Some(connection) = self.connection.as_mut() {
                            connection.peer = Some(address);
                        }
                    }
                    Err(err) => return Err(self.fail(now, err)),
                }
            }
            (LinkEvent::ScanComplete, LinkPhase::Scanning) => {
                debug!("cube link: scan finished without the cube, rescanning");
                return self.start_scan(now);
            }
            (LinkEvent::Connected, LinkPhase::Connecting) => {
                self.set_phase(LinkPhase::Connected);
                if let Some(connection) = self.connection.as_mut() {
                    connection.key = Some(self.identity.key());
                }
                if let Err(err) = self.transport.subscribe(Characteristic::State) {
                    return Err(self.fail(now, err));
                }
            }
            (LinkEvent::Subscribed, LinkPhase::Connected) => {
                info!("cube link: subscribed");
                let backoff = self.config.backoff_initial_ms;
                if let Some(connection) = self.connection.as_mut() {
                    connection.phase = LinkPhase::Subscribed;
                    connection.backoff_ms = backoff;
                    connection.pending_requests = self.config.facelet_retries.saturating_add(1);
                    connection.next_request_at = None;
                }
                self.request_facelets(now);
            }
            (LinkEvent::Disconnected | LinkEvent::Failed, phase)
                if phase != LinkPhase::Disconnected =>
            {
                return Err(self.fail(now, TransportError::ConnectionLost));
            }
            (LinkEvent::Notification(frame), LinkPhase::Subscribed) => {
                return self.handle_notification(&frame, now);
            }
            _ => {}
        }
        Ok(())
    }

    /// Sends a command to the subscribed cube.
    pub fn send_command(&mut self, command: CubeCommand) -> Result<(), LinkError> {
        let key = match self.connection.as_ref() {
            Some(c) if c.phase == LinkPhase::Subscribed => {
                c.key.unwrap_or_else(|| self.identity.key())
            }
            _ => return Err(LinkError::NotSubscribed),
        };
        let frame = command.encrypt(&key)?;
        self.transport
            .write(Characteristic::Command, &frame)
            .map_err(LinkError::BleConnectionFailure)
    }

    fn handle_notification(&mut self, frame: &[u8], now: I) -> Result<(), LinkError> {
        let Some(connection) = self.connection.as_mut() else {
            return Ok(());
        };
        connection.last_notification_time = Some(now);
        let key = connection.key.unwrap_or_else(|| self.identity.key());

        match decode(frame, &key)? {
            CubePacket::Facelets(state) => {
                if state.is_solved() {
                    if !connection.solved {
                        info!("cube link: cube solved");
                    }
                    connection.solved = true;
                }
            }
            CubePacket::Move(mv) => {
                debug!("cube link: move {:?}", mv);
                self.schedule_facelets_poll(now);
            }
            CubePacket::Other(kind) => {
                debug!("cube link: ignoring frame type {}", kind);
            }
        }
        Ok(())
    }

    /// Queues one facelets request shortly after a move, at most once per
    /// `facelet_rate_ms`.
    fn schedule_facelets_poll(&mut self, now: I) {
        let delay = self.config.facelet_poll_delay_ms;
        let rate = self.config.facelet_rate_ms;
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        if connection.poll_allowed_at.is_some_and(|at| now < at) {
            return;
        }
        connection.pending_requests = connection.pending_requests.max(1);
        if connection.next_request_at.is_none_or(|at| at < now) {
            connection.next_request_at = Some(deadline_after(now, delay));
        }
        connection.poll_allowed_at = Some(deadline_after(now, rate));
    }

    fn request_facelets(&mut self, now: I) {
        let retry_ms = self.config.facelet_retry_ms;
        let result = self.send_command(CubeCommand::RequestFacelets);
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        match result {
            Ok(()) => {
                connection.pending_requests = 0;
                connection.next_request_at = None;
            }
            Err(err) => {
                connection.pending_requests = connection.pending_requests.saturating_sub(1);
                connection.next_request_at = Some(deadline_after(now, retry_ms));
                warn!(
                    "cube link: facelets request failed ({}), {} attempts left",
                    err,
                    connection.pending_requests
                );
            }
        }
    }

    fn start_scan(&mut self, now: I) -> Result<(), LinkError> {
        if let Some(connection) = self.connection.as_mut() {
            connection.attempts += 1;
            connection.retry_at = None;
        }
        match self.transport.start_scan() {
            Ok(()) => {
                self.set_phase(LinkPhase::Scanning);
                Ok(())
            }
            Err(err) => Err(self.fail(now, err)),
        }
    }

    /// Drops to `Disconnected` and schedules the next scan.
    fn fail(&mut self, now: I, err: TransportError) -> LinkError {
        let max = self.config.backoff_max_ms;
        if let Some(connection) = self.connection.as_mut() {
            match connection.phase {
                LinkPhase::Scanning => self.transport.stop_scan(),
                LinkPhase::Connecting | LinkPhase::Connected | LinkPhase::Subscribed => {
                    self.transport.disconnect()
                }
                LinkPhase::Disconnected => {}
            }
            connection.phase = LinkPhase::Disconnected;
            connection.key = None;
            connection.pending_requests = 0;
            connection.next_request_at = None;
            connection.retry_at = Some(deadline_after(now, connection.backoff_ms));
            warn!(
                "cube link: {}, retrying in {} ms",
                err,
                connection.backoff_ms
            );
            connection.backoff_ms = (connection.backoff_ms * 2).min(max);
        }
        LinkError::BleConnectionFailure(err)
    }

    fn set_phase(&mut self, phase: LinkPhase) {
        if let Some(connection) = self.connection.as_mut() {
            debug!("cube link: {:?} -> {:?}", connection.phase, phase);
            connection.phase = phase;
        }
    }
}
