use crate::config::Config;
use crate::dom::{Dom, ElementHandle};
use crate::error::ConfigError;
use crate::inject::{ApplyOutcome, InstructionEngine, RawInstruction, ReversionRecord};
use crate::tracking::{ClickTracker, ElementDescriptor};
use crate::transport::{
    ConnectOutcome, ConnectionManager, InboundMessage, Scheduler, TimerId, Transport,
    normalize_endpoint,
};
use serde::Serialize;
use std::time::Instant;

pub type ClickCallback = Box<dyn FnMut(&ElementDescriptor) + Send>;
pub type InstructionCallback = Box<dyn FnMut(&RawInstruction, &ApplyOutcome) + Send>;

/// Point-in-time view of the client's flags and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientStatus {
    pub is_connected: bool,
    pub is_connecting: bool,
    pub connection_attempts: u32,
    pub max_connection_attempts: u32,
    /// An automatic reconnect is scheduled.
    pub retry_pending: bool,
    pub is_tracking_enabled: bool,
    pub dyna_dubbing: bool,
}

/// Public surface used by the host page: one instance per page.
///
/// The client owns the document, the connection state machine, the
/// instruction engine and the click tracker. Host callbacks (socket events,
/// timer firings, clicks) enter through the `handle_*` methods and `click`.
pub struct Client<D, T, S> {
    dom: D,
    connection: ConnectionManager<T, S>,
    engine: InstructionEngine,
    tracker: ClickTracker,
    click_callbacks: Vec<ClickCallback>,
    instruction_callbacks: Vec<InstructionCallback>,
}

impl<D: Dom, T: Transport, S: Scheduler> Client<D, T, S> {
    pub fn new(dom: D, transport: T, scheduler: S, config: &Config) -> Result<Self, ConfigError> {
        let endpoint = normalize_endpoint(&config.connection.endpoint)
            .map_err(|e| ConfigError::Validation(format!("connection.endpoint: {e}")))?;

        let mut tracker = ClickTracker::new(
            config.tracking.click_throttle(),
            config.tracking.max_text_chars,
        );
        if config.tracking.enabled_on_start {
            tracker.enable();
        }

        Ok(Self {
            dom,
            connection: ConnectionManager::new(
                transport,
                scheduler,
                endpoint,
                config.connection.max_attempts,
                config.connection.retry_delay(),
            ),
            engine: InstructionEngine::new(
                config.injection.dyna_dubbing,
                config.injection.force_apply_all,
            ),
            tracker,
            click_callbacks: Vec::new(),
            instruction_callbacks: Vec::new(),
        })
    }

    // ── Tracking ─────────────────────────────────────────────────────────

    pub fn enable_element_tracking(&mut self) {
        self.tracker.enable();
    }

    pub fn disable_element_tracking(&mut self) {
        self.tracker.disable(&mut self.dom);
    }

    pub fn is_tracking_enabled(&self) -> bool {
        self.tracker.is_enabled()
    }

    /// Host click on `target`. Returns whether a report went out.
    pub fn click(&mut self, target: ElementHandle, now: Instant) -> bool {
        match self.tracker.handle_click(&mut self.dom, target, now) {
            Some(descriptor) => self.connection.send_click(&descriptor),
            None => false,
        }
    }

    // ── Connection ───────────────────────────────────────────────────────

    pub fn connect(&mut self, endpoint: Option<&str>) -> ConnectOutcome {
        self.connection.connect(endpoint)
    }

    pub fn disconnect(&mut self) {
        self.connection.disconnect();
    }

    pub fn reset_connection_attempts(&mut self) {
        self.connection.reset_attempts();
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn is_connecting(&self) -> bool {
        self.connection.is_connecting()
    }

    pub fn connection_attempts(&self) -> u32 {
        self.connection.attempts()
    }

    pub fn max_connection_attempts(&self) -> u32 {
        self.connection.max_attempts()
    }

    pub fn handle_open(&mut self) {
        self.connection.on_open();
    }

    pub fn handle_close(&mut self, code: u16) {
        self.connection.on_close(code);
    }

    pub fn handle_error(&mut self, message: &str) {
        self.connection.on_error(message);
    }

    pub fn handle_retry_due(&mut self, timer: TimerId) {
        self.connection.on_retry_due(timer);
    }

    /// Route one inbound payload. Instructions are applied strictly in
    /// arrival order.
    pub fn handle_message(&mut self, raw: &str) {
        match self.connection.on_message(raw) {
            Some(InboundMessage::InjectInstruction(instruction)) => {
                let outcome = self.engine.apply(&mut self.dom, &instruction);
                for callback in &mut self.instruction_callbacks {
                    callback(&instruction, &outcome);
                }
            }
            Some(InboundMessage::ElementClicked(descriptor)) => {
                for callback in &mut self.click_callbacks {
                    callback(&descriptor);
                }
            }
            Some(InboundMessage::Unrecognized(_)) | None => {}
        }
    }

    // ── Observers ────────────────────────────────────────────────────────

    pub fn on_element_click(&mut self, callback: ClickCallback) {
        self.click_callbacks.push(callback);
    }

    pub fn on_instruction(&mut self, callback: InstructionCallback) {
        self.instruction_callbacks.push(callback);
    }

    // ── Injection ────────────────────────────────────────────────────────

    pub fn apply_instruction(&mut self, instruction: &RawInstruction) -> ApplyOutcome {
        self.engine.apply(&mut self.dom, instruction)
    }

    pub fn injections(&self) -> Vec<ReversionRecord> {
        self.engine.injections()
    }

    pub fn set_dyna_dubbing(&mut self, enabled: bool) {
        self.engine.set_dubbing(enabled);
    }

    pub fn dyna_dubbing(&self) -> bool {
        self.engine.dubbing()
    }

    // ── Introspection ────────────────────────────────────────────────────

    pub fn status(&self) -> ClientStatus {
        ClientStatus {
            is_connected: self.is_connected(),
            is_connecting: self.is_connecting(),
            connection_attempts: self.connection_attempts(),
            max_connection_attempts: self.max_connection_attempts(),
            retry_pending: self.connection.pending_retry().is_some(),
            is_tracking_enabled: self.is_tracking_enabled(),
            dyna_dubbing: self.dyna_dubbing(),
        }
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut D {
        &mut self.dom
    }

    pub fn connection(&self) -> &ConnectionManager<T, S> {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut ConnectionManager<T, S> {
        &mut self.connection
    }

    pub fn into_dom(self) -> D {
        self.dom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::HtmlDocument;
    use crate::transport::testing::{ManualScheduler, RecordingTransport};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type TestClient = Client<HtmlDocument, RecordingTransport, ManualScheduler>;

    fn client(page: &str) -> TestClient {
        Client::new(
            HtmlDocument::parse(page),
            RecordingTransport::default(),
            ManualScheduler::default(),
            &Config::default(),
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_bad_endpoint() {
        let mut config = Config::default();
        config.connection.endpoint = "mailto:a@b.c".into();
        let result = TestClient::new(
            HtmlDocument::parse(""),
            RecordingTransport::default(),
            ManualScheduler::default(),
            &config,
        );
        assert!(result.is_err());
    }

    #[test]
    fn click_is_reported_only_when_connected() {
        let mut client = client(r#"<a id="buy" href="/buy">Buy</a>"#);
        let link = client.dom().query_selector("#buy").unwrap().unwrap();
        let start = Instant::now();

        assert!(!client.click(link, start));
        client.connect(None);
        client.handle_open();
        assert!(client.click(link, start + Duration::from_secs(1)));

        let sent = &client.connection().transport().sent;
        assert_eq!(sent.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(value["type"], "element-clicked");
        assert_eq!(value["data"]["path"], "a#buy");
    }

    #[test]
    fn instruction_message_mutates_and_notifies_in_order() {
        let mut client = client(r#"<h1 id="title">Old</h1>"#);
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            client.on_instruction(Box::new(move |instruction: &RawInstruction, outcome: &ApplyOutcome| {
                seen.lock().unwrap().push(format!(
                    "{tag}:{}:{}",
                    instruction.id.as_deref().unwrap_or(""),
                    outcome.is_applied()
                ));
            }));
        }

        client.handle_message(
            r##"{"type":"inject-instruction","data":{"id":"1","action":"replaceHTML","selector":"#title","content":"<span>Hi</span>","publish":true}}"##,
        );

        let title = client.dom().query_selector("#title").unwrap().unwrap();
        assert_eq!(client.dom().inner_html(title).unwrap(), "<span>Hi</span>");
        assert_eq!(*seen.lock().unwrap(), vec!["first:1:true", "second:1:true"]);
        assert_eq!(client.injections()[0].original_content, "Old");
    }

    #[test]
    fn echoed_click_fires_click_observers() {
        let mut client = client("<p>x</p>");
        let paths = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&paths);
        client.on_element_click(Box::new(move |descriptor: &ElementDescriptor| {
            sink.lock().unwrap().push(descriptor.path.clone());
        }));

        client.handle_message(
            r#"{"type":"element-clicked","data":{"tagName":"P","timestamp":"t","path":"html > body > p"}}"#,
        );

        assert_eq!(*paths.lock().unwrap(), vec!["html > body > p"]);
    }

    #[test]
    fn status_reflects_toggles() {
        let mut client = client("<p>x</p>");
        client.disable_element_tracking();
        client.set_dyna_dubbing(true);

        let status = client.status();
        assert!(!status.is_tracking_enabled);
        assert!(status.dyna_dubbing);
        assert_eq!(status.max_connection_attempts, 3);
        assert!(!status.is_connected);
        assert!(!status.retry_pending);
    }

    #[test]
    fn status_reports_scheduled_reconnect() {
        let mut client = client("<p>x</p>");
        client.connect(None);
        client.handle_close(crate::transport::ABNORMAL_CLOSURE);
        assert!(client.status().retry_pending);

        client.disconnect();
        assert!(!client.status().retry_pending);
    }
}
