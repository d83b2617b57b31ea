//! Websocket upgrade handler and per-connection event loop.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::assembler::{MessageAssembler, RawUserInput};
use crate::error::ChatError;
use crate::handlers::{dispatch, HandlerContext};
use crate::models::message::Source;
use crate::models::room::Room;
use crate::AppState;

use super::delivery::SendMode;
use super::frames::InboundFrame;
use super::hub::OutboundPayload;
use super::sender::ChatSender;
use super::session::ChatSession;

/// Close codes (4000-range for application-level).
const CLOSE_POLICY: u16 = 4000;
const CLOSE_AUTH_FAILED: u16 = 4004;

#[derive(Debug, Deserialize)]
struct ConnectParams {
    token: String,
    #[serde(default = "default_version")]
    version: i32,
}

fn default_version() -> i32 {
    1
}

pub fn router() -> Router<AppState> {
    Router::new().route("/chat/{room_id}", get(ws_upgrade))
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Path(room_id): Path<i64>,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state, room_id, params))
}

async fn handle_connection(socket: WebSocket, state: AppState, room_id: i64, params: ConnectParams) {
    let (mut ws_tx, ws_rx) = socket.split();

    // Connecting: authenticate and load the room before any group joins.
    // Every failure here is fatal to the connection attempt.
    let user_id = match state.identity.current_user(&params.token).await {
        Ok(Some(id)) => id,
        Ok(None) => {
            let _ = send_close(&mut ws_tx, CLOSE_AUTH_FAILED, "Invalid token").await;
            return;
        }
        Err(err) => {
            tracing::error!(?err, "identity lookup failed");
            let _ = send_close(&mut ws_tx, CLOSE_POLICY, "Identity unavailable").await;
            return;
        }
    };

    let room = match state.rooms.find(room_id).await {
        Ok(Some(room)) if room.active => room,
        Ok(Some(_)) => {
            let _ = send_close(&mut ws_tx, CLOSE_POLICY, "Room is not active").await;
            return;
        }
        Ok(None) => {
            let _ = send_close(&mut ws_tx, CLOSE_POLICY, "Room not found").await;
            return;
        }
        Err(err) => {
            tracing::error!(?err, room_id, "room lookup failed");
            let _ = send_close(&mut ws_tx, CLOSE_POLICY, "Room unavailable").await;
            return;
        }
    };

    // Joined: register with all three address groups.
    let session = Arc::new(ChatSession::new(room_id, user_id, params.version));
    let (member_tx, member_rx) = mpsc::channel::<OutboundPayload>(state.config.member_buffer);
    session.join(&state.hub, member_tx.clone());

    tracing::info!(
        session_id = %session.session_id,
        room_id,
        user_id,
        version = params.version,
        "chat session joined"
    );

    let sender = Arc::new(ChatSender::new(
        state.delivery.clone(),
        state.rooms.clone(),
        room_id,
        session.session_id.clone(),
        member_tx,
    ));

    run_session(&state, &session, &room, &sender, ws_tx, ws_rx, member_rx).await;

    // Closed: leave every joined group. Outstanding sends to this session
    // report the member gone once the receiver drops with this scope.
    session.close(&state.hub);
    tracing::info!(session_id = %session.session_id, room_id, "chat session ended");
}

/// Main session loop: decode inbound frames, forward group payloads out.
async fn run_session(
    state: &AppState,
    session: &Arc<ChatSession>,
    room: &Room,
    sender: &Arc<ChatSender>,
    mut ws_tx: SplitSink<WebSocket, WsMessage>,
    mut ws_rx: SplitStream<WebSocket>,
    mut member_rx: mpsc::Receiver<OutboundPayload>,
) {
    loop {
        tokio::select! {
            // Client sends us a frame.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        let frame: InboundFrame = match serde_json::from_str(&text) {
                            Ok(frame) => frame,
                            Err(_) => {
                                let _ = sender.send_error("unrecognized frame").await;
                                continue;
                            }
                        };
                        spawn_frame_task(state, session, room, sender, frame);
                    }
                    Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => continue,
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!(?err, session_id = %session.session_id, "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }

            // A group (or reply-channel) payload for this session.
            payload = member_rx.recv() => {
                match payload {
                    Some(OutboundPayload::Frame(json)) => {
                        if ws_tx.send(WsMessage::Text(json.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                    Some(OutboundPayload::Close) => {
                        let _ = send_close(&mut ws_tx, CLOSE_POLICY, "Closed by server").await;
                        break;
                    }
                    None => break,
                }
            }
        }
    }
}

/// Frame work runs on its own task so a backing-off delivery never stalls
/// this session's event loop.
fn spawn_frame_task(
    state: &AppState,
    session: &Arc<ChatSession>,
    room: &Room,
    sender: &Arc<ChatSender>,
    frame: InboundFrame,
) {
    let state = state.clone();
    let session = session.clone();
    let room = room.clone();
    let sender = sender.clone();
    tokio::spawn(async move {
        let result = match frame {
            InboundFrame::Message { message } => {
                handle_inbound_message(&state, &session, &room, &sender, message).await
            }
            InboundFrame::Status(status) => {
                sender.send_status_update(status, SendMode::BestEffort).await
            }
        };
        if let Err(err) = result {
            tracing::warn!(
                session_id = %session.session_id,
                room_id = session.room_id,
                error = %err,
                "inbound frame failed"
            );
            let _ = sender.send_error(&err.user_message()).await;
        }
    });
}

/// Assemble, dispatch, deliver. The user's message goes out first; handler
/// follow-ups ride behind it. All content sends are guaranteed-attempt.
async fn handle_inbound_message(
    state: &AppState,
    session: &ChatSession,
    room: &Room,
    sender: &ChatSender,
    input: RawUserInput,
) -> Result<(), ChatError> {
    let assembler = MessageAssembler::new(state.messages.clone(), state.snowflake.clone());
    let message = assembler
        .assemble(
            input,
            room,
            Source::User {
                id: session.user_id,
            },
            Some(session.handler_version),
        )
        .await?;

    sender.deliver_message(&message, SendMode::MustAttempt).await?;

    let ctx = HandlerContext {
        room: room.clone(),
        user_id: session.user_id,
        handler_version: session.handler_version,
        messages: state.messages.clone(),
        ids: state.snowflake.clone(),
    };
    let follow_ups = dispatch::dispatch(&state.handlers, &state.guard, &message, &ctx).await?;
    if !follow_ups.is_empty() {
        sender
            .deliver_messages(&follow_ups, SendMode::MustAttempt)
            .await?;
    }
    Ok(())
}

/// Send a websocket close frame with a code and reason.
async fn send_close(
    ws_tx: &mut SplitSink<WebSocket, WsMessage>,
    code: u16,
    reason: &str,
) -> Result<(), axum::Error> {
    let close_msg = WsMessage::Close(Some(CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}
