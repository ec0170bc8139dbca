//! Per-socket lifecycle: register, reply to commands, unregister.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message as WsMessage;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::monitor::commands;
use crate::monitor::registry::{Connection, ConnectionRegistry};

/// How long the writer may take to flush queued frames after the reader ends
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Drive one monitor socket until the client goes away.
///
/// The socket is passed as its two halves. A writer task owns the sink and
/// drains the connection queue; this task reads commands and queues replies
/// on that same queue.
pub async fn run_session<Tx, Rx, E>(
    ws_tx: Tx,
    mut ws_rx: Rx,
    registry: Arc<ConnectionRegistry>,
    queue_depth: usize,
) where
    Tx: Sink<WsMessage> + Unpin + Send + 'static,
    Rx: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: std::fmt::Display,
{
    let (conn, mut outbound) = Connection::channel(queue_depth);
    let conn_id = conn.id();
    registry.register(conn.clone());
    info!(conn_id = %conn_id, active = registry.len(), "monitor client connected");

    let mut writer = tokio::spawn(async move {
        let mut ws_tx = ws_tx;
        while let Some(payload) = outbound.recv().await {
            if ws_tx
                .send(WsMessage::Text(payload.to_string().into()))
                .await
                .is_err()
            {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(WsMessage::Text(text)) => {
                let reply = commands::respond(text.as_str());
                if let Err(e) = conn.reply(&reply).await {
                    debug!(conn_id = %conn_id, error = %e, "writer gone, dropping command reply");
                    break;
                }
            }
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(conn_id = %conn_id, error = %e, "monitor socket error");
                break;
            }
        }
    }

    registry.unregister(&conn_id);
    drop(conn);

    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
        .await
        .is_err()
    {
        writer.abort();
    }

    info!(conn_id = %conn_id, active = registry.len(), "monitor client disconnected");
}
