pub mod client;
pub mod config;
pub mod core;
pub mod handlers;
pub mod protocol;
pub mod routes;
pub mod state;

// Re-export commonly used items for convenience
pub use client::{ClientHandle, ClientNotice, LiveClient};
pub use config::{ClientConfig, ServerConfig};
pub use crate::core::*;
pub use protocol::{ClientMessage, ServerMessage};
pub use state::AppState;
