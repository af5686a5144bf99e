use axum::{extract::State, response::Response, routing::get, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::webserver::state::AppState;
use crate::webserver::utils::success_response;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub hub: &'static str,
    pub uptime_seconds: u64,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/healthcheck", get(healthcheck))
}

/// Liveness check; answers 200 while the process serves HTTP
async fn healthcheck(State(state): State<Arc<AppState>>) -> Response {
    success_response(HealthResponse {
        status: "ok",
        hub: state.hub.state().as_str(),
        uptime_seconds: state.uptime_seconds(),
    })
}
