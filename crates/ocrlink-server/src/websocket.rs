//! WebSocket transport for the gateway
//!
//! Each socket is split into a writer task draining the connection's
//! [`Outbound`] queue and a reader task feeding handshakes and pongs to the
//! [`Gateway`]. Either side finishing tears the connection down.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::stream::SplitStream;
use futures::{Sink, SinkExt, StreamExt};
use ocrlink_core::{ClientMessage, Error};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use crate::gateway::{ConnectionId, Gateway, Outbound};
use crate::state::AppState;

/// How long a single frame may take to reach the socket before the writer gives up
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let gateway = state.gateway.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, gateway))
}

/// Drive one WebSocket connection until it closes
pub async fn handle_socket(socket: WebSocket, gateway: Arc<Gateway>) {
    let (conn_id, outbound_rx) = gateway.accept();
    let (sender, receiver) = socket.split();

    let mut send_task = tokio::spawn(write_outbound(sender, outbound_rx, FLUSH_TIMEOUT));
    let mut recv_task = tokio::spawn(read_inbound(receiver, gateway.clone(), conn_id));

    let writer_finished = tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
            true
        }
        _ = &mut recv_task => false,
    };

    // Dropping the record closes the outbound channel, which ends the writer
    gateway.release(conn_id);

    if !writer_finished && tokio::time::timeout(FLUSH_TIMEOUT, &mut send_task).await.is_err() {
        send_task.abort();
    }

    debug!("Connection {} closed", conn_id);
}

async fn write_outbound<S>(
    mut sender: S,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    flush_timeout: Duration,
) where
    S: Sink<Message> + Unpin,
{
    while let Some(frame) = outbound.recv().await {
        let (message, last) = match frame {
            Outbound::Text(text) => (Message::Text(text), false),
            Outbound::Ping => (Message::Ping(Vec::new()), false),
            Outbound::Close => (Message::Close(None), true),
        };
        // A peer that stopped reading must not pin the task until TCP gives up
        match tokio::time::timeout(flush_timeout, sender.send(message)).await {
            Ok(Ok(())) if !last => {}
            Ok(Ok(())) => break,
            Ok(Err(_)) => break,
            Err(_) => {
                debug!("Timed out writing to socket, dropping connection");
                return;
            }
        }
    }
    let _ = tokio::time::timeout(flush_timeout, sender.close()).await;
}

async fn read_inbound(
    mut receiver: SplitStream<WebSocket>,
    gateway: Arc<Gateway>,
    conn_id: ConnectionId,
) {
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => handle_text(&gateway, conn_id, &text),
            Ok(Message::Pong(_)) => gateway.mark_alive(conn_id),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Connection {} receive error: {}", conn_id, e);
                break;
            }
        }
    }
}

fn handle_text(gateway: &Gateway, conn_id: ConnectionId, text: &str) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Authenticate { token, role }) => {
            // Outcome is logged and answered by the gateway itself; a missing
            // token is rejected like any other invalid one
            let token = token.as_deref().unwrap_or_default();
            let _ = gateway.authenticate(conn_id, token, role.as_deref());
        }
        Ok(ClientMessage::Unknown) => {
            debug!("Connection {} sent an unhandled message type", conn_id);
        }
        Err(e) => {
            debug!(
                "Connection {}: {}",
                conn_id,
                Error::MalformedMessage(e.to_string())
            );
        }
    }
}
