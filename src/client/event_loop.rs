use super::api::{ClickCallback, Client, ClientStatus, InstructionCallback};
use crate::config::Config;
use crate::dom::Dom;
use crate::error::ConfigError;
use crate::inject::ReversionRecord;
use crate::transport::{LinkEvent, TokioScheduler, WsTransport};
use anyhow::{Context, Result};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Client wired to the real socket transport and tokio timers.
pub type NativeClient<D> = Client<D, WsTransport, TokioScheduler>;

const COMMAND_BUFFER: usize = 64;

/// Host request delivered to the event loop.
pub enum Command {
    Connect(Option<String>),
    Disconnect,
    ResetConnectionAttempts,
    EnableTracking,
    DisableTracking,
    SetDynaDubbing(bool),
    /// Click on the first element matching the selector.
    Click(String),
    OnElementClick(ClickCallback),
    OnInstruction(InstructionCallback),
    Status(oneshot::Sender<ClientStatus>),
    Injections(oneshot::Sender<Vec<ReversionRecord>>),
    DocumentHtml(oneshot::Sender<String>),
}

/// Single-task driver: socket events, timer firings and host commands are
/// handled one at a time, in arrival order.
pub struct EventLoop<D> {
    client: NativeClient<D>,
    events: mpsc::UnboundedReceiver<LinkEvent>,
    commands: mpsc::Receiver<Command>,
    shutdown: CancellationToken,
}

/// Cloneable, async front for a running [`EventLoop`].
#[derive(Clone)]
pub struct ClientHandle {
    commands: mpsc::Sender<Command>,
    shutdown: CancellationToken,
}

impl<D: Dom> EventLoop<D> {
    pub fn new(dom: D, config: &Config) -> Result<(Self, ClientHandle), ConfigError> {
        let (event_tx, events) = mpsc::unbounded_channel();
        let (command_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let shutdown = CancellationToken::new();

        let client = Client::new(
            dom,
            WsTransport::new(event_tx.clone()),
            TokioScheduler::new(event_tx),
            config,
        )?;

        let handle = ClientHandle {
            commands: command_tx,
            shutdown: shutdown.clone(),
        };
        Ok((
            Self {
                client,
                events,
                commands,
                shutdown,
            },
            handle,
        ))
    }

    pub fn client(&self) -> &NativeClient<D> {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut NativeClient<D> {
        &mut self.client
    }

    /// Run until shutdown is requested or every handle is dropped, then
    /// disconnect and hand the client back.
    pub async fn run(mut self) -> NativeClient<D> {
        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                Some(event) = self.events.recv() => self.dispatch_event(event),
                command = self.commands.recv() => match command {
                    Some(command) => self.dispatch_command(command),
                    None => break,
                },
            }
        }

        self.client.disconnect();
        tracing::info!("event loop stopped");
        self.client
    }

    fn dispatch_event(&mut self, event: LinkEvent) {
        if let Some(generation) = socket_generation(&event)
            && !self.client.connection().transport().is_current(generation)
        {
            tracing::trace!(generation, "dropping event from superseded socket");
            return;
        }

        match event {
            LinkEvent::Opened { .. } => self.client.handle_open(),
            LinkEvent::Message { text, .. } => self.client.handle_message(&text),
            LinkEvent::Closed { code, .. } => self.client.handle_close(code),
            LinkEvent::Error { message, .. } => self.client.handle_error(&message),
            LinkEvent::RetryDue(timer) => {
                self.client.connection_mut().scheduler_mut().fired(timer);
                self.client.handle_retry_due(timer);
            }
        }
    }

    fn dispatch_command(&mut self, command: Command) {
        match command {
            Command::Connect(endpoint) => {
                self.client.connect(endpoint.as_deref());
            }
            Command::Disconnect => self.client.disconnect(),
            Command::ResetConnectionAttempts => self.client.reset_connection_attempts(),
            Command::EnableTracking => self.client.enable_element_tracking(),
            Command::DisableTracking => self.client.disable_element_tracking(),
            Command::SetDynaDubbing(enabled) => self.client.set_dyna_dubbing(enabled),
            Command::Click(selector) => match self.client.dom().query_selector(&selector) {
                Ok(Some(target)) => {
                    self.client.click(target, Instant::now());
                }
                Ok(None) => tracing::debug!(selector = %selector, "click target not found"),
                Err(e) => tracing::warn!(selector = %selector, error = %e, "invalid click selector"),
            },
            Command::OnElementClick(callback) => self.client.on_element_click(callback),
            Command::OnInstruction(callback) => self.client.on_instruction(callback),
            Command::Status(reply) => {
                let _ = reply.send(self.client.status());
            }
            Command::Injections(reply) => {
                let _ = reply.send(self.client.injections());
            }
            Command::DocumentHtml(reply) => {
                let _ = reply.send(self.client.dom().to_html());
            }
        }
    }
}

fn socket_generation(event: &LinkEvent) -> Option<u64> {
    match event {
        LinkEvent::Opened { generation }
        | LinkEvent::Message { generation, .. }
        | LinkEvent::Closed { generation, .. }
        | LinkEvent::Error { generation, .. } => Some(*generation),
        LinkEvent::RetryDue(_) => None,
    }
}

impl ClientHandle {
    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .ok()
            .context("event loop stopped")
    }

    async fn request<R>(&self, build: impl FnOnce(oneshot::Sender<R>) -> Command) -> Result<R> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx)).await?;
        rx.await.context("event loop dropped the reply")
    }

    pub async fn connect(&self, endpoint: Option<String>) -> Result<()> {
        self.send(Command::Connect(endpoint)).await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.send(Command::Disconnect).await
    }

    pub async fn reset_connection_attempts(&self) -> Result<()> {
        self.send(Command::ResetConnectionAttempts).await
    }

    pub async fn enable_element_tracking(&self) -> Result<()> {
        self.send(Command::EnableTracking).await
    }

    pub async fn disable_element_tracking(&self) -> Result<()> {
        self.send(Command::DisableTracking).await
    }

    pub async fn set_dyna_dubbing(&self, enabled: bool) -> Result<()> {
        self.send(Command::SetDynaDubbing(enabled)).await
    }

    pub async fn click(&self, selector: impl Into<String>) -> Result<()> {
        self.send(Command::Click(selector.into())).await
    }

    pub async fn on_element_click(&self, callback: ClickCallback) -> Result<()> {
        self.send(Command::OnElementClick(callback)).await
    }

    pub async fn on_instruction(&self, callback: InstructionCallback) -> Result<()> {
        self.send(Command::OnInstruction(callback)).await
    }

    pub async fn status(&self) -> Result<ClientStatus> {
        self.request(Command::Status).await
    }

    pub async fn dyna_dubbing(&self) -> Result<bool> {
        Ok(self.status().await?.dyna_dubbing)
    }

    pub async fn injections(&self) -> Result<Vec<ReversionRecord>> {
        self.request(Command::Injections).await
    }

    pub async fn document_html(&self) -> Result<String> {
        self.request(Command::DocumentHtml).await
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
