//! Live WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::live::live_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the live session WebSocket router
///
/// # Endpoint
///
/// `GET /ws` - WebSocket upgrade for mixed text/voice sessions
///
/// # Example
///
/// ```json
/// // Client starts a voice session
/// {"type": "live_start"}
///
/// // Gateway answers, then greets
/// {"type": "live_status", "status": "started"}
/// {"type": "live_text", "text": "Hello. How can I help you today?"}
/// {"type": "live_audio", "audio": "...", "mime_type": "audio/pcm;rate=24000"}
///
/// // Client streams microphone audio
/// {"type": "audio_chunk", "audio": "...", "sample_rate": 16000}
/// ```
pub fn create_live_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws", get(live_handler))
        .layer(TraceLayer::new_for_http())
}
