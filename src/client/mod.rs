pub mod api;
pub mod event_loop;

pub use api::{ClickCallback, Client, ClientStatus, InstructionCallback};
pub use event_loop::{ClientHandle, Command, EventLoop, NativeClient};
