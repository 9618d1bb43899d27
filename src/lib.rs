#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::unnecessary_literal_bound,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod client;
pub mod config;
pub mod dom;
pub mod error;
pub mod inject;
pub mod tracking;
pub mod transport;

pub use client::{Client, ClientHandle, ClientStatus, EventLoop};
pub use config::Config;
pub use dom::{Dom, ElementHandle, HtmlDocument};
pub use error::{DubError, Result};
pub use inject::{ApplyOutcome, InstructionEngine, RawInstruction, ReversionRecord};
pub use tracking::ElementDescriptor;
