//! Per-connection handler: request dispatch and event delivery.
//!
//! Each accepted connection gets its own Tokio task running this
//! handler. The loop multiplexes two directions over one socket:
//! requests coming in (decoded, dispatched to the coordinator, answered
//! with exactly one response) and broadcast events going out (drained
//! from the connection's delivery channel as room actors publish).

use std::sync::Arc;

use quizroom_broadcast::event_channel;
use quizroom_protocol::{Codec, Request, Response};
use quizroom_transport::{Connection, ConnectionId, WebSocketConnection};

use crate::QuizroomError;
use crate::server::ServerState;

/// Drop guard that tears down a connection's coordinator state when the
/// handler exits, even on an early error return or panic. `Drop` is
/// synchronous, so the async teardown runs in a fire-and-forget task.
struct ConnectionGuard<C: Codec> {
    conn_id: ConnectionId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.coordinator.disconnect(conn_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), QuizroomError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    // Delivery channel first, so no broadcast can slip past between the
    // first request and the subscription it creates.
    let (event_tx, mut events) = event_channel();
    state.coordinator.register_connection(conn_id, event_tx);
    let _guard = ConnectionGuard {
        conn_id,
        state: Arc::clone(&state),
    };

    loop {
        tokio::select! {
            incoming = conn.recv() => {
                match incoming {
                    Ok(Some(data)) => {
                        let request: Request = match state.codec.decode(&data) {
                            Ok(req) => req,
                            Err(e) => {
                                // Malformed frames are skipped, not fatal.
                                tracing::debug!(
                                    %conn_id, error = %e, "undecodable request frame, ignoring"
                                );
                                continue;
                            }
                        };
                        let response = dispatch(&state, conn_id, request).await;
                        let bytes = state.codec.encode(&response)?;
                        conn.send(&bytes).await.map_err(QuizroomError::Transport)?;
                    }
                    Ok(None) => {
                        tracing::info!(%conn_id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        break;
                    }
                }
            }
            event = events.recv() => {
                // None means the delivery channel was replaced or torn
                // down; nothing more will ever arrive.
                let Some(event) = event else { break };
                let bytes = state.codec.encode(&event)?;
                if let Err(e) = conn.send(&bytes).await {
                    tracing::debug!(%conn_id, error = %e, "event delivery failed");
                    break;
                }
            }
        }
    }

    // _guard drops here → implicit leave + channel teardown.
    Ok(())
}

/// Routes one request to the coordinator and shapes the reply.
///
/// Failures come back as error responses, never as handler errors: every
/// code in [`quizroom_room::RoomError`] is caller-recoverable.
async fn dispatch<C: Codec>(
    state: &ServerState<C>,
    conn_id: ConnectionId,
    request: Request,
) -> Response {
    match request {
        Request::CreateRoom {
            deck_ref,
            host_name,
        } => match state.coordinator.create_room(conn_id, &deck_ref, &host_name).await {
            Ok(room) => Response::RoomCreated {
                room_code: room.code,
                room,
            },
            Err(e) => Response::error(e.code(), e.to_string()),
        },

        Request::JoinRoom {
            room_code,
            player_name,
        } => match state
            .coordinator
            .join_room(conn_id, &room_code, &player_name)
            .await
        {
            Ok((player, room)) => Response::RoomJoined { player, room },
            Err(e) => Response::error(e.code(), e.to_string()),
        },

        Request::StartGame => match state.coordinator.start_game(conn_id).await {
            Ok(room) => Response::GameStarted { room },
            Err(e) => Response::error(e.code(), e.to_string()),
        },

        Request::LeaveRoom => {
            state.coordinator.leave_room(conn_id).await;
            Response::Ack
        }

        Request::SendAction {
            action_name,
            payload,
        } => {
            state.coordinator.send_action(conn_id, &action_name, payload).await;
            Response::Ack
        }
    }
}
