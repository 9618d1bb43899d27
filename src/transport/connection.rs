use super::messages::{InboundMessage, NORMAL_CLOSURE, OutboundMessage, parse_inbound};
use crate::error::ConnectionError;
use crate::tracking::ElementDescriptor;
use chrono::{SecondsFormat, Utc};
use std::time::Duration;
use strum::Display;
use url::Url;

/// Default number of connect attempts before an explicit reset is required.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default delay before an automatic reconnect.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Bidirectional socket the manager drives. Opening is asynchronous: the
/// implementation reports the outcome through the manager's `on_*`
/// transitions.
pub trait Transport {
    fn open(&mut self, endpoint: &Url) -> Result<(), ConnectionError>;

    fn send(&mut self, payload: String) -> Result<(), ConnectionError>;

    fn close(&mut self, code: u16);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub u64);

/// One-shot timers. A fired timer comes back through
/// [`ConnectionManager::on_retry_due`].
pub trait Scheduler {
    fn schedule(&mut self, delay: Duration) -> TimerId;

    fn cancel(&mut self, timer: TimerId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// What a `connect` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Started,
    AlreadyConnecting,
    AlreadyConnected,
    AttemptsExhausted,
    InvalidEndpoint,
}

/// Rewrite `http(s)` endpoints to `ws(s)`; `ws(s)` passes through.
pub fn normalize_endpoint(raw: &str) -> Result<Url, ConnectionError> {
    let mut url = Url::parse(raw.trim()).map_err(|e| ConnectionError::InvalidEndpoint {
        endpoint: raw.to_string(),
        message: e.to_string(),
    })?;

    let target = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(ConnectionError::UnsupportedScheme(other.to_string())),
    };
    if url.scheme() != target {
        url.set_scheme(target)
            .map_err(|()| ConnectionError::UnsupportedScheme(url.scheme().to_string()))?;
    }
    Ok(url)
}

/// Connection lifecycle state machine.
///
/// Every host callback maps onto one transition method, so the retry bound
/// and the single-pending-timer rule live in one place:
///
/// ```text
/// Disconnected --connect--> Connecting --on_open--> Connected
/// Connecting/Connected --on_close--> Disconnected (+ retry unless normal or exhausted)
/// any --disconnect--> Disconnected (timers cancelled, no auto-retry)
/// ```
pub struct ConnectionManager<T, S> {
    transport: T,
    scheduler: S,
    endpoint: Url,
    status: ConnectionStatus,
    attempts: u32,
    max_attempts: u32,
    retry_delay: Duration,
    pending_retry: Option<TimerId>,
    socket_live: bool,
    manually_closed: bool,
}

impl<T: Transport, S: Scheduler> ConnectionManager<T, S> {
    pub fn new(
        transport: T,
        scheduler: S,
        endpoint: Url,
        max_attempts: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            transport,
            scheduler,
            endpoint,
            status: ConnectionStatus::Disconnected,
            attempts: 0,
            max_attempts,
            retry_delay,
            pending_retry: None,
            socket_live: false,
            manually_closed: false,
        }
    }

    pub fn connect(&mut self, endpoint: Option<&str>) -> ConnectOutcome {
        match self.status {
            ConnectionStatus::Connecting => {
                tracing::warn!("connection attempt already in progress");
                return ConnectOutcome::AlreadyConnecting;
            }
            ConnectionStatus::Connected => {
                tracing::debug!("already connected");
                return ConnectOutcome::AlreadyConnected;
            }
            ConnectionStatus::Disconnected => {}
        }

        if self.attempts >= self.max_attempts {
            tracing::error!(
                attempts = self.attempts,
                max_attempts = self.max_attempts,
                "maximum connection attempts reached; reset attempts to retry"
            );
            return ConnectOutcome::AttemptsExhausted;
        }

        if let Some(raw) = endpoint {
            match normalize_endpoint(raw) {
                Ok(url) => self.endpoint = url,
                Err(e) => {
                    tracing::error!(endpoint = raw, error = %e, "refusing to connect");
                    return ConnectOutcome::InvalidEndpoint;
                }
            }
        }

        if self.socket_live {
            self.transport.close(NORMAL_CLOSURE);
            self.socket_live = false;
        }

        self.cancel_retry();
        self.manually_closed = false;
        self.status = ConnectionStatus::Connecting;
        self.attempts += 1;
        tracing::info!(
            endpoint = %self.endpoint,
            attempt = self.attempts,
            max_attempts = self.max_attempts,
            "connecting"
        );

        if let Err(e) = self.transport.open(&self.endpoint) {
            tracing::error!(error = %e, "failed to open transport");
            self.handle_closed(None);
        } else {
            self.socket_live = true;
        }
        ConnectOutcome::Started
    }

    pub fn on_open(&mut self) {
        tracing::info!(endpoint = %self.endpoint, "connected");
        self.status = ConnectionStatus::Connected;
        self.attempts = 0;
    }

    pub fn on_close(&mut self, code: u16) {
        self.socket_live = false;
        self.handle_closed(Some(code));
    }

    /// Errors only drop the connected flag; the close that follows owns
    /// retry scheduling.
    pub fn on_error(&mut self, message: &str) {
        tracing::warn!(error = message, "transport error");
        if self.status == ConnectionStatus::Connected {
            self.status = ConnectionStatus::Disconnected;
        }
    }

    /// Parse one inbound payload. Malformed and unrecognized messages are
    /// logged and swallowed.
    pub fn on_message(&mut self, raw: &str) -> Option<InboundMessage> {
        match parse_inbound(raw) {
            Ok(InboundMessage::Unrecognized(kind)) => {
                tracing::warn!(kind = %kind, "unrecognized message type");
                None
            }
            Ok(message) => Some(message),
            Err(e) => {
                tracing::warn!(error = %e, "discarding malformed message");
                None
            }
        }
    }

    pub fn on_retry_due(&mut self, timer: TimerId) {
        if self.pending_retry != Some(timer) {
            tracing::trace!(timer = timer.0, "ignoring stale retry timer");
            return;
        }
        self.pending_retry = None;
        self.connect(None);
    }

    pub fn disconnect(&mut self) {
        self.cancel_retry();
        if self.socket_live {
            self.transport.close(NORMAL_CLOSURE);
            self.socket_live = false;
        }
        if self.status != ConnectionStatus::Disconnected {
            tracing::info!("disconnected");
        }
        self.manually_closed = true;
        self.status = ConnectionStatus::Disconnected;
    }

    pub fn reset_attempts(&mut self) {
        tracing::info!("connection attempts reset");
        self.attempts = 0;
        self.cancel_retry();
    }

    /// Best-effort, at-most-once delivery of a click report.
    pub fn send_click(&mut self, descriptor: &ElementDescriptor) -> bool {
        if self.status != ConnectionStatus::Connected {
            tracing::debug!(path = %descriptor.path, "not connected; dropping click");
            return false;
        }

        let message = OutboundMessage::ElementClicked {
            data: descriptor.clone(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        let payload = match serde_json::to_string(&message) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode click report");
                return false;
            }
        };
        match self.transport.send(payload) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "failed to send click report");
                false
            }
        }
    }

    fn handle_closed(&mut self, code: Option<u16>) {
        self.status = ConnectionStatus::Disconnected;

        let normal = code == Some(NORMAL_CLOSURE);
        if normal || self.manually_closed {
            tracing::info!(code = ?code, "connection closed");
            return;
        }

        if self.attempts < self.max_attempts {
            self.schedule_retry();
        } else {
            tracing::error!(
                code = ?code,
                attempts = self.attempts,
                "connection lost and retry budget exhausted"
            );
        }
    }

    fn schedule_retry(&mut self) {
        self.cancel_retry();
        let timer = self.scheduler.schedule(self.retry_delay);
        self.pending_retry = Some(timer);
        tracing::warn!(
            delay_ms = u64::try_from(self.retry_delay.as_millis()).unwrap_or(u64::MAX),
            next_attempt = self.attempts + 1,
            max_attempts = self.max_attempts,
            "connection lost; scheduling reconnect"
        );
    }

    fn cancel_retry(&mut self) {
        if let Some(timer) = self.pending_retry.take() {
            self.scheduler.cancel(timer);
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.status == ConnectionStatus::Connecting
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn pending_retry(&self) -> Option<TimerId> {
        self.pending_retry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }
}
