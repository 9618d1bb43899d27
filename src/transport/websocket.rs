use super::connection::{Scheduler, TimerId, Transport};
use super::messages::ABNORMAL_CLOSURE;
use crate::error::ConnectionError;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use url::Url;

/// Close code used when the peer sent a close frame without a status.
const NO_STATUS_RECEIVED: u16 = 1005;

/// Everything the socket tasks and timers report back to the event loop.
///
/// Socket events carry the generation of the socket that produced them so
/// the loop can drop events from a socket that was already replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Opened { generation: u64 },
    Message { generation: u64, text: String },
    Closed { generation: u64, code: u16 },
    Error { generation: u64, message: String },
    RetryDue(TimerId),
}

enum SocketCommand {
    Send(String),
    Close(u16),
}

/// `Transport` over `tokio-tungstenite`. Each `open` spawns one socket task.
pub struct WsTransport {
    events: mpsc::UnboundedSender<LinkEvent>,
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<SocketCommand>>,
}

impl WsTransport {
    pub fn new(events: mpsc::UnboundedSender<LinkEvent>) -> Self {
        Self {
            events,
            generation: 0,
            outbound: None,
        }
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.outbound.is_some() && generation == self.generation
    }
}

impl Transport for WsTransport {
    fn open(&mut self, endpoint: &Url) -> Result<(), ConnectionError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ConnectionError::Open(format!("no tokio runtime: {e}")))?;

        self.generation += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        self.outbound = Some(tx);

        runtime.spawn(run_socket(
            endpoint.to_string(),
            self.generation,
            self.events.clone(),
            rx,
        ));
        Ok(())
    }

    fn send(&mut self, payload: String) -> Result<(), ConnectionError> {
        self.outbound
            .as_ref()
            .ok_or_else(|| ConnectionError::Send("socket not open".into()))?
            .send(SocketCommand::Send(payload))
            .map_err(|_| ConnectionError::Send("socket task ended".into()))
    }

    fn close(&mut self, code: u16) {
        if let Some(outbound) = self.outbound.take() {
            let _ = outbound.send(SocketCommand::Close(code));
        }
    }
}

async fn run_socket(
    url: String,
    generation: u64,
    events: mpsc::UnboundedSender<LinkEvent>,
    mut commands: mpsc::UnboundedReceiver<SocketCommand>,
) {
    let emit = |event: LinkEvent| {
        let _ = events.send(event);
    };

    let stream = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            emit(LinkEvent::Error {
                generation,
                message: format!("connect {url}: {e}"),
            });
            emit(LinkEvent::Closed {
                generation,
                code: ABNORMAL_CLOSURE,
            });
            return;
        }
    };
    emit(LinkEvent::Opened { generation });

    let (mut write, mut read) = stream.split();
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(SocketCommand::Send(text)) => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        emit(LinkEvent::Error { generation, message: format!("send: {e}") });
                    }
                }
                Some(SocketCommand::Close(code)) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: "client disconnect".into(),
                    };
                    let _ = write.send(Message::Close(Some(frame))).await;
                    emit(LinkEvent::Closed { generation, code });
                    return;
                }
                None => {
                    let _ = write.send(Message::Close(None)).await;
                    return;
                }
            },
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    emit(LinkEvent::Message { generation, text: text.to_string() });
                }
                Some(Ok(Message::Binary(bytes))) => {
                    if let Ok(text) = String::from_utf8(bytes.to_vec()) {
                        emit(LinkEvent::Message { generation, text });
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let code = frame.map_or(NO_STATUS_RECEIVED, |frame| u16::from(frame.code));
                    emit(LinkEvent::Closed { generation, code });
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    emit(LinkEvent::Error { generation, message: format!("read: {e}") });
                    emit(LinkEvent::Closed { generation, code: ABNORMAL_CLOSURE });
                    return;
                }
                None => {
                    emit(LinkEvent::Closed { generation, code: ABNORMAL_CLOSURE });
                    return;
                }
            }
        }
    }
}

/// `Scheduler` backed by `tokio::time::sleep`; firing sends
/// [`LinkEvent::RetryDue`] into the same channel as socket events.
pub struct TokioScheduler {
    events: mpsc::UnboundedSender<LinkEvent>,
    next_id: u64,
    timers: HashMap<TimerId, AbortHandle>,
}

impl TokioScheduler {
    pub fn new(events: mpsc::UnboundedSender<LinkEvent>) -> Self {
        Self {
            events,
            next_id: 0,
            timers: HashMap::new(),
        }
    }

    /// Forget a timer that already fired.
    pub fn fired(&mut self, timer: TimerId) {
        self.timers.remove(&timer);
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, delay: Duration) -> TimerId {
        self.next_id += 1;
        let timer = TimerId(self.next_id);
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(LinkEvent::RetryDue(timer));
        });
        self.timers.insert(timer, handle.abort_handle());
        timer
    }

    fn cancel(&mut self, timer: TimerId) {
        if let Some(handle) = self.timers.remove(&timer) {
            handle.abort();
        }
    }
}
