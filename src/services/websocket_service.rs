//! WebSocket connection lifecycle for challenge participants.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ClientMessage, ServerMessage},
    services::coordinator,
    state::SharedState,
};

/// How long a fresh connection may stay silent before it must have joined.
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle the full lifecycle for an individual challenge WebSocket connection.
///
/// The first text frame must be a `join_challenge` message; everything else
/// closes the connection. After a successful join the loop dispatches on the
/// tagged message type, and the participant is detached from the session
/// when the connection winds down for any reason.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(JOIN_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket join timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let inbound = match ClientMessage::from_json_str(&initial_message) {
        Ok(message) => message,
        Err(err) => {
            warn!(error = %err, "failed to parse first websocket message");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let ClientMessage::JoinChallenge {
        user_id,
        challenge_id,
        username,
    } = inbound
    else {
        warn!("first message was not join_challenge");
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    };

    if let Err(err) = coordinator::join(
        &state,
        challenge_id,
        user_id,
        username,
        outbound_tx.clone(),
    )
    .await
    {
        warn!(%challenge_id, %user_id, error = %err, "join rejected");
        send_error(&outbound_tx, format!("join rejected: {err}"));
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    }

    info!(%challenge_id, %user_id, "challenge connection established");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientMessage::from_json_str(&text) {
                Ok(inbound) => {
                    if dispatch(&state, challenge_id, user_id, inbound).await.is_break() {
                        break;
                    }
                }
                Err(err) => {
                    debug!(%challenge_id, %user_id, error = %err, "dropping malformed message");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(%challenge_id, %user_id, "client closed connection");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(%challenge_id, %user_id, error = %err, "websocket error");
                break;
            }
        }
    }

    coordinator::leave(&state, challenge_id, user_id).await;
    info!(%challenge_id, %user_id, "challenge connection closed");

    finalize(writer_task, outbound_tx).await;
}

/// Route one parsed message to the coordinator. Per-message failures are
/// logged and the session keeps running; a session fault must never take
/// down the connection loop for unrelated events.
async fn dispatch(
    state: &SharedState,
    challenge_id: Uuid,
    user_id: Uuid,
    message: ClientMessage,
) -> std::ops::ControlFlow<()> {
    match message {
        ClientMessage::ChallengeSubmitAnswer {
            challenge_id: target,
            user_id: sender,
            question_id,
            answer,
            time_taken,
            current_question_index,
        } => {
            if target != challenge_id || sender != user_id {
                debug!(%challenge_id, %user_id, "submission for foreign challenge dropped");
                return std::ops::ControlFlow::Continue(());
            }
            if let Err(err) = coordinator::submit_answer(
                state,
                challenge_id,
                user_id,
                question_id,
                answer,
                time_taken,
                current_question_index,
            )
            .await
            {
                warn!(%challenge_id, %user_id, error = %err, "submit_answer failed");
            }
        }
        ClientMessage::ChallengeComplete {
            challenge_id: target,
            user_id: sender,
            total_time,
        } => {
            if target != challenge_id || sender != user_id {
                debug!(%challenge_id, %user_id, "completion for foreign challenge dropped");
                return std::ops::ControlFlow::Continue(());
            }
            if let Err(err) = coordinator::complete(state, challenge_id, user_id, total_time).await
            {
                warn!(%challenge_id, %user_id, error = %err, "challenge_complete failed");
            }
        }
        ClientMessage::LeaveChallenge {
            challenge_id: target,
        } => {
            if target == challenge_id {
                return std::ops::ControlFlow::Break(());
            }
        }
        ClientMessage::JoinChallenge { .. } => {
            debug!(%challenge_id, %user_id, "ignoring duplicate join message");
        }
        ClientMessage::Unknown => {
            debug!(%challenge_id, %user_id, "ignoring message with unknown type");
        }
    }

    std::ops::ControlFlow::Continue(())
}

fn send_error(tx: &mpsc::UnboundedSender<Message>, message: String) {
    if let Ok(payload) = serde_json::to_string(&ServerMessage::Error { message }) {
        let _ = tx.send(Message::Text(payload.into()));
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
