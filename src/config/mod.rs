mod env_overrides;
mod loader;
pub mod schema;

pub use schema::{Config, ConnectionConfig, InjectionConfig, TrackingConfig};
