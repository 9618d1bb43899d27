pub mod connection;
pub mod messages;
#[doc(hidden)]
pub mod testing;
pub mod websocket;

pub use connection::{
    ConnectOutcome, ConnectionManager, ConnectionStatus, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_RETRY_DELAY, Scheduler, TimerId, Transport, normalize_endpoint,
};
pub use messages::{
    ABNORMAL_CLOSURE, InboundMessage, NORMAL_CLOSURE, OutboundMessage, parse_inbound,
};
pub use websocket::{LinkEvent, TokioScheduler, WsTransport};
