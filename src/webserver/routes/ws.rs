/// Live-update WebSocket endpoint
///
/// `GET /ws` upgrades an authenticated request and hands the socket to the
/// hub for the rest of its life. `GET /ws/stats` reports hub counters.
use axum::{
    extract::{ws::WebSocketUpgrade, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use std::sync::Arc;

use crate::{
    logger::{self, LogTag},
    webserver::{
        auth::origin_allowed,
        state::AppState,
        utils::{error_response, success_response},
        ws::{split_socket, HubState},
    },
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/ws/stats", get(ws_stats))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    if !origin_allowed(&state.config.server.allowed_origins, &headers) {
        logger::warning(
            LogTag::Webserver,
            &format!(
                "Rejected upgrade from origin {:?}",
                headers.get(axum::http::header::ORIGIN)
            ),
        );
        return error_response(StatusCode::FORBIDDEN, "origin_not_allowed", "Origin not allowed");
    }

    let user_id = match state.auth.authenticate(&headers) {
        Ok(user_id) => user_id,
        Err(e) => {
            logger::debug(LogTag::Webserver, &format!("Unauthorized upgrade: {}", e));
            return error_response(StatusCode::UNAUTHORIZED, "unauthorized", &e.to_string());
        }
    };

    if state.hub.state() >= HubState::Closing {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "shutting_down",
            "Server is shutting down",
        );
    }

    let hub = Arc::clone(&state.hub);
    ws.max_message_size(state.config.hub.max_read_size)
        .on_upgrade(move |socket| async move {
            let (sink, stream) = split_socket(socket);
            hub.accept(user_id, sink, stream).await;
        })
}

async fn ws_stats(State(state): State<Arc<AppState>>) -> Response {
    success_response(state.hub.stats())
}
