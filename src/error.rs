use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `dynadub`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; the CLI layer continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum DubError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Connection / Transport ──────────────────────────────────────────
    #[error("connection: {0}")]
    Connection(#[from] ConnectionError),

    // ── Instruction engine ──────────────────────────────────────────────
    #[error("instruction: {0}")]
    Instruction(#[from] InstructionError),

    // ── Document model ──────────────────────────────────────────────────
    #[error("dom: {0}")]
    Dom(#[from] DomError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("validation failed: {0}")]
    Validation(String),
}

// ─── Connection errors ───────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("invalid endpoint {endpoint}: {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    #[error("unsupported endpoint scheme: {0}")]
    UnsupportedScheme(String),

    #[error("transport open failed: {0}")]
    Open(String),

    #[error("transport send failed: {0}")]
    Send(String),

    #[error("malformed inbound message: {0}")]
    Protocol(String),
}

// ─── Instruction errors ──────────────────────────────────────────────────────

/// Every reason an instruction can be dropped without touching the document.
#[derive(Debug, Error)]
pub enum InstructionError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("unknown action `{0}`")]
    UnknownAction(String),

    #[error("instruction {id} is not published and dubbing is disabled")]
    NotPublished { id: String },

    #[error("no element matches selector `{selector}`")]
    ElementNotFound { selector: String },

    #[error("action {action} requires non-empty content")]
    MissingContent { action: String },

    #[error("element matched by `{selector}` has no parent")]
    NoParent { selector: String },

    #[error(transparent)]
    Dom(#[from] DomError),
}

// ─── Document model errors ───────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum DomError {
    #[error("invalid selector `{selector}`: {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("stale element handle")]
    StaleHandle,

    #[error("node is not an element")]
    NotAnElement,
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, DubError>;
