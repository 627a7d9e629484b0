pub mod health;
pub mod verification;

use axum::Router;

use crate::config::ServerConfig;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
pub fn api_routes(config: &ServerConfig) -> Router<AppState> {
    Router::new().merge(verification::router(config.max_upload_bytes))
}
