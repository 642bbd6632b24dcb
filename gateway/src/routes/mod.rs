pub mod api;
pub mod live;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Build the complete application router without CORS or server bindings
pub fn create_app(state: Arc<AppState>) -> Router {
    api::create_api_router()
        .merge(live::create_live_router())
        .with_state(state)
}
