//! WebSocket Endpoint
//!
//! Upgrades `GET /ws`, runs the connection through the transport gate and,
//! once authenticated, pumps outbound frames to the client while applying
//! inbound conversation control frames.

use std::collections::HashMap;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{debug, info, warn};

use super::handlers::AppState;
use crate::gateway::{ConnectionState, ControlEvent, Handshake};
use crate::registry::ConnectionId;
use crate::transport::Outbound;

/// Handler for GET /ws
///
/// Credentials come from the `token` query parameter or an
/// `Authorization: Bearer` header. Authentication happens after the upgrade;
/// rejected connections are closed without any event.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let handshake = Handshake::from_parts(&query, &headers);
    ws.on_upgrade(move |socket| handle_socket(socket, state, handshake))
}

/// Runs for the lifetime of one WebSocket connection.
async fn handle_socket(socket: WebSocket, state: AppState, handshake: Handshake) {
    let connection = ConnectionId::new();
    let (tx, mut rx) = unbounded_channel();
    state.transport.attach(connection.clone(), tx);

    let (mut sender, mut receiver) = socket.split();

    // The socket is watched while the credential is verified, so a client
    // that leaves early is closed before it can be admitted.
    let connect = state.gate.connect(connection.clone(), &handshake);
    tokio::pin!(connect);
    let mut client_gone = false;
    let admitted = loop {
        tokio::select! {
            admitted = &mut connect => break admitted,

            inbound = receiver.next(), if !client_gone => {
                match inbound {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                        debug!(connection_id = %connection, "Client left during authentication");
                        state.gate.disconnect(&connection);
                        client_gone = true;
                    }
                    Some(Ok(_)) => {
                        debug!(connection_id = %connection, "Frame before authentication ignored");
                    }
                }
            }
        }
    };

    match admitted {
        ConnectionState::Authenticated => {
            info!(connection_id = %connection, "WebSocket connected");
            pump(&state, &connection, &mut rx, &mut sender, &mut receiver).await;
        }
        state_after_connect => {
            debug!(
                connection_id = %connection,
                state = ?state_after_connect,
                "Connection not admitted"
            );
        }
    }

    if !client_gone {
        let _ = sender.send(Message::Close(None)).await;
        state.gate.disconnect(&connection);
    }
    state.transport.detach(&connection);
    info!(connection_id = %connection, "WebSocket disconnected");
}

/// Forwards outbound frames and applies inbound control frames until either
/// side closes.
async fn pump(
    state: &AppState,
    connection: &ConnectionId,
    rx: &mut UnboundedReceiver<Outbound>,
    sender: &mut SplitSink<WebSocket, Message>,
    receiver: &mut SplitStream<WebSocket>,
) {
    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(Outbound::Frame(frame)) => {
                        if let Err(e) = sender.send(Message::Text(frame)).await {
                            warn!(
                                connection_id = %connection,
                                error = %e,
                                "Failed to send frame, closing connection"
                            );
                            break;
                        }
                    }
                    Some(Outbound::Close) | None => break,
                }
            }

            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        apply_control(state, connection, &text).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(connection_id = %connection, "Client closed connection");
                        break;
                    }
                    // Pings are answered by axum
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(connection_id = %connection, error = %e, "WebSocket receive error");
                        break;
                    }
                }
            }
        }
    }
}

async fn apply_control(state: &AppState, connection: &ConnectionId, text: &str) {
    match ControlEvent::parse(text) {
        Ok(control) => {
            let event = control.event_name();
            let applied = state.fanout.handle_control(connection, control).await;
            debug!(connection_id = %connection, event, applied, "Control event");
        }
        Err(e) => {
            debug!(connection_id = %connection, error = %e, "Ignoring unrecognised frame");
        }
    }
}
