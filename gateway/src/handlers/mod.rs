//! HTTP and WebSocket request handlers
//!
//! This module organizes all handlers into logical groups:
//! - `api` - Health check endpoints
//! - `live` - Live session WebSocket

pub mod api;
pub mod live;

// Re-export commonly used handlers for convenient access
pub use live::live_handler;
