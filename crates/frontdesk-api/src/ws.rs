//! WebSocket transport for the real-time channel.
//!
//! Each upgraded socket becomes one gateway connection. Inbound text frames
//! are handed to the gateway verbatim; a writer task drains the connection's
//! bounded outbound queue onto the socket. A send that stalls past the
//! configured timeout ends the connection so one slow client cannot hold
//! up anyone else.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::header::{ORIGIN, USER_AGENT};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;

use frontdesk_core::events::ServerEvent;
use frontdesk_gateway::{ConnectMetadata, ConnectionId, Gateway};

use crate::handlers::header_value;
use crate::state::AppState;

/// Why a connection's writer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterExit {
    /// The gateway dropped the connection's queue.
    QueueClosed,
    /// The socket rejected a frame.
    SocketError,
    /// A frame could not be written within the send timeout.
    TimedOut,
}

/// GET /ws - upgrade to the real-time channel.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let metadata = ConnectMetadata {
        origin: header_value(&headers, ORIGIN),
        user_agent: header_value(&headers, USER_AGENT),
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state.gateway, metadata))
}

async fn handle_socket(socket: WebSocket, gateway: Arc<Gateway>, metadata: ConnectMetadata) {
    let (conn, outbound) = gateway.connect(metadata);
    let send_timeout = Duration::from_millis(gateway.config().send_timeout_ms);
    let (sink, stream) = socket.split();

    let mut writer = tokio::spawn(write_events(sink, outbound, send_timeout, conn));

    tokio::select! {
        _ = read_frames(stream, &gateway, conn) => {
            tracing::debug!(connection = %conn, "Client closed socket");
        }
        exit = &mut writer => {
            tracing::debug!(connection = %conn, exit = ?exit, "Socket writer stopped");
        }
    }

    gateway.disconnect(conn);
    writer.abort();
}

/// Feed inbound text frames to the gateway until the client closes.
pub(crate) async fn read_frames<S, E>(mut stream: S, gateway: &Gateway, conn: ConnectionId)
where
    S: Stream<Item = Result<Message, E>> + Unpin,
{
    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => gateway.handle_frame(conn, text.as_str()).await,
            Message::Close(_) => break,
            _ => continue,
        }
    }
}

/// Drain the outbound queue onto the socket.
pub(crate) async fn write_events<S>(
    mut sink: S,
    mut outbound: mpsc::Receiver<ServerEvent>,
    send_timeout: Duration,
    conn: ConnectionId,
) -> WriterExit
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    while let Some(event) = outbound.recv().await {
        let frame = match serde_json::to_string(&event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(connection = %conn, event = event.name(), error = %e, "Failed to encode event");
                continue;
            }
        };

        match tokio::time::timeout(send_timeout, sink.send(Message::Text(frame.into()))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(connection = %conn, error = %e, "Socket send failed");
                return WriterExit::SocketError;
            }
            Err(_) => {
                tracing::warn!(
                    connection = %conn,
                    timeout_ms = send_timeout.as_millis() as u64,
                    "Socket send timed out, dropping connection"
                );
                return WriterExit::TimedOut;
            }
        }
    }

    let _ = sink.close().await;
    WriterExit::QueueClosed
}
