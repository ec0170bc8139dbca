//! `/ws/system` upgrade handler.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::Response;
use futures::StreamExt;

use crate::monitor::run_session;
use crate::server::AppState;

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let registry = state.registry.clone();
    let queue_depth = state.settings.monitor.send_queue;

    ws.on_upgrade(move |socket| async move {
        let (tx, rx) = socket.split();
        run_session(tx, rx, registry, queue_depth).await;
    })
}
