//! Challenge coordinator: join/leave, answer scoring, and race-free
//! completion resolution for 1v1 matches.
//!
//! Every mutation of a session happens under that session's mutex, so the
//! two participants' events are serialized per challenge while distinct
//! challenges never contend. Events are pushed to per-connection FIFO
//! channels while the lock is held, which gives each live connection the
//! per-session ordering the clients rely on (`opponent_joined`, then
//! `both_players_ready`, then `challenge_start`, then progress events).

use std::{sync::Arc, time::SystemTime};

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{ChallengeStatus, OutcomeEntity},
    dto::ws::{MatchResult, ParticipantResult, ServerMessage},
    error::ServiceError,
    services::results::{AttemptAnswer, QuizAttempt},
    state::{
        SharedState,
        session::{
            AttemptRecord, ChallengeSession, FinishRecord, Participant, SessionEvent,
            SessionPhase, SessionState,
        },
    },
};

/// Machine-readable reason attached to a grace-period force-end.
const FORCE_END_REASON: &str = "grace_period_expired";

/// Register a connection in the challenge session, creating it on first join.
///
/// Validates that the challenge exists, has been accepted, and that the user
/// is one of its two participants. A rejoin replaces the previous connection
/// handle without duplicating progress and resyncs only the rejoining client
/// to the current phase, so a flapping connection never re-fires the ready
/// transition.
pub async fn join(
    state: &SharedState,
    challenge_id: Uuid,
    user_id: Uuid,
    username: String,
    tx: mpsc::UnboundedSender<Message>,
) -> Result<(), ServiceError> {
    let store = state.require_challenge_store().await?;
    let Some(challenge) = store.find_challenge(challenge_id).await? else {
        return Err(ServiceError::NotFound(format!(
            "challenge `{challenge_id}` not found"
        )));
    };

    if !challenge.involves(user_id) {
        return Err(ServiceError::Unauthorized(
            "user is not a participant of this challenge".into(),
        ));
    }

    match challenge.status {
        ChallengeStatus::Active => {}
        other => {
            return Err(ServiceError::InvalidState(format!(
                "challenge cannot be joined while {other:?}"
            )));
        }
    }

    // Load the quiz before touching the registry so the session snapshot is
    // complete from the moment it becomes visible to the other participant.
    let Some(quiz) = store.find_quiz(challenge.quiz_id).await? else {
        return Err(ServiceError::NotFound(format!(
            "quiz `{}` not found",
            challenge.quiz_id
        )));
    };

    let session = state
        .sessions()
        .entry(challenge_id)
        .or_insert_with(|| Arc::new(ChallengeSession::new(challenge_id, Arc::new(quiz))))
        .clone();

    let mut guard = session.lock().await;

    if let Some(existing) = guard.participants.get_mut(&user_id) {
        existing.tx = Some(tx);
        existing.username = username;
        info!(%challenge_id, %user_id, "participant reconnected");
        // Replay the current phase so the rejoining client can resync;
        // the opponent sees nothing.
        let snapshot = match guard.phase {
            SessionPhase::WaitingForOpponent => Some(ServerMessage::WaitingForOpponent),
            SessionPhase::Countdown => Some(ServerMessage::BothPlayersReady),
            SessionPhase::InProgress => Some(ServerMessage::ChallengeStart),
            SessionPhase::Completed => None,
        };
        if let Some(message) = snapshot {
            send_to_user(&guard, user_id, &message);
        }
        return Ok(());
    }

    guard.participants.insert(user_id, Participant::new(username, tx));
    info!(%challenge_id, %user_id, "participant joined");

    if guard.participants.len() == 1 {
        send_to_user(&guard, user_id, &ServerMessage::WaitingForOpponent);
        return Ok(());
    }

    // Second distinct participant: this transition is only valid once per
    // session, which guards against duplicate ready broadcasts.
    guard.transition(SessionEvent::OpponentJoined)?;
    broadcast_except(&guard, user_id, &ServerMessage::OpponentJoined { user_id });
    broadcast(&guard, &ServerMessage::BothPlayersReady);

    let countdown = state.config().countdown();
    let task_state = state.clone();
    guard.countdown_task = Some(tokio::spawn(async move {
        tokio::time::sleep(countdown).await;
        countdown_elapsed(&task_state, challenge_id).await;
    }));

    Ok(())
}

/// Countdown timer callback: emit the single authoritative start signal.
async fn countdown_elapsed(state: &SharedState, challenge_id: Uuid) {
    let Some(session) = lookup(state, challenge_id) else {
        return;
    };
    let mut guard = session.lock().await;
    if guard.phase != SessionPhase::Countdown {
        return;
    }
    if guard.transition(SessionEvent::CountdownElapsed).is_ok() {
        guard.countdown_task = None;
        broadcast(&guard, &ServerMessage::ChallengeStart);
        info!(%challenge_id, "challenge started");
    }
}

/// Remove or park a participant's connection.
///
/// Before both participants are ready the session simply dissolves when it
/// empties; from the countdown onward the match survives a disconnect and
/// the grace/force-end policy takes over.
pub async fn leave(state: &SharedState, challenge_id: Uuid, user_id: Uuid) {
    let Some(session) = lookup(state, challenge_id) else {
        return;
    };
    let mut guard = session.lock().await;

    match guard.phase {
        SessionPhase::WaitingForOpponent => {
            guard.participants.shift_remove(&user_id);
            if guard.connected_count() == 0 {
                drop(guard);
                state.sessions().remove(&challenge_id);
                info!(%challenge_id, "session cancelled before opponent joined");
            }
        }
        SessionPhase::Completed => {}
        SessionPhase::Countdown | SessionPhase::InProgress => {
            if let Some(participant) = guard.participants.get_mut(&user_id) {
                participant.tx = None;
            }
            info!(%challenge_id, %user_id, "participant disconnected mid-match");

            // Keep the session while a grace timer is pending: it will
            // resolve the match from last-known scores (a disconnect during
            // grace is treated exactly like grace expiry).
            if guard.connected_count() == 0 && guard.grace_task.is_none() {
                drop(guard);
                state.sessions().remove(&challenge_id);
                info!(%challenge_id, "session discarded, both participants gone");
            }
        }
    }
}

/// Score one answer submission and broadcast opponent progress.
///
/// Stale or duplicate submissions (mismatched index or question id) are
/// dropped silently so retransmitted events are never double-scored. An
/// empty answer records the question as unattempted (client-side window
/// expiry) and advances the index without private feedback.
pub async fn submit_answer(
    state: &SharedState,
    challenge_id: Uuid,
    user_id: Uuid,
    question_id: Uuid,
    answer: String,
    time_taken: u32,
    current_question_index: usize,
) -> Result<(), ServiceError> {
    let Some(session) = lookup(state, challenge_id) else {
        debug!(%challenge_id, "submission for unknown session dropped");
        return Ok(());
    };

    let finish_time = {
        let mut guard = session.lock().await;
        if guard.phase != SessionPhase::InProgress {
            debug!(%challenge_id, phase = ?guard.phase, "submission outside in-progress dropped");
            return Ok(());
        }

        let quiz = guard.quiz.clone();
        let points = state.config().points_per_correct();

        let Some(participant) = guard.participants.get_mut(&user_id) else {
            return Ok(());
        };
        if participant.is_finished() || participant.persisting {
            return Ok(());
        }
        if participant.current_question != current_question_index {
            debug!(
                %challenge_id, %user_id,
                expected = participant.current_question,
                got = current_question_index,
                "stale submission dropped"
            );
            return Ok(());
        }
        let Some(question) = quiz.questions.get(current_question_index) else {
            return Ok(());
        };
        if question.id != question_id {
            debug!(%challenge_id, %user_id, "submission question id mismatch dropped");
            return Ok(());
        }

        let attempted = !answer.is_empty();
        let correct = attempted && question.is_correct(&answer);
        if correct {
            participant.score += points;
        }
        participant.current_question += 1;
        participant.attempts.push(AttemptRecord {
            question_id,
            answer: attempted.then(|| answer.clone()),
            correct,
            time_taken_secs: time_taken,
        });

        let new_score = participant.score;
        let new_index = participant.current_question;
        let elapsed = participant.elapsed_secs();

        if attempted {
            send_to_user(
                &guard,
                user_id,
                &ServerMessage::ChallengeAnswerResult {
                    correct,
                    correct_answer: question.correct_answer.clone(),
                    new_score,
                },
            );
        }

        // The opponent learns the index, score, and correctness flag, never
        // the answer text.
        broadcast_except(
            &guard,
            user_id,
            &ServerMessage::OpponentProgress {
                user_id,
                current_question: new_index,
                score: new_score,
                is_correct: correct,
            },
        );

        (new_index == quiz.questions.len()).then_some(elapsed)
    };

    if let Some(total_time) = finish_time {
        finish_participant(state, challenge_id, session, user_id, total_time).await?;
    }

    Ok(())
}

/// Handle the explicit `challenge_complete` finish signal from a client.
///
/// Remaining unanswered questions are recorded as 0-point misses. Also the
/// retry path after a failed result persistence.
pub async fn complete(
    state: &SharedState,
    challenge_id: Uuid,
    user_id: Uuid,
    total_time: u32,
) -> Result<(), ServiceError> {
    let Some(session) = lookup(state, challenge_id) else {
        return Ok(());
    };

    {
        let mut guard = session.lock().await;
        if guard.phase != SessionPhase::InProgress {
            return Ok(());
        }
        let quiz = guard.quiz.clone();
        let Some(participant) = guard.participants.get_mut(&user_id) else {
            return Ok(());
        };
        if participant.is_finished() || participant.persisting {
            return Ok(());
        }
        while participant.current_question < quiz.questions.len() {
            let question = &quiz.questions[participant.current_question];
            participant.attempts.push(AttemptRecord {
                question_id: question.id,
                answer: None,
                correct: false,
                time_taken_secs: 0,
            });
            participant.current_question += 1;
        }
    }

    finish_participant(state, challenge_id, session, user_id, total_time).await
}

/// Record one participant's finish: persist their Result, then either
/// resolve the match or open the grace window for the opponent.
///
/// The Result API call runs without the session lock so the opponent's
/// submissions keep flowing. The `persisting` latch makes the call
/// at-most-once per participant; a failure clears the latch and surfaces a
/// retryable error to that client while the match stays active.
async fn finish_participant(
    state: &SharedState,
    challenge_id: Uuid,
    session: Arc<ChallengeSession>,
    user_id: Uuid,
    total_time: u32,
) -> Result<(), ServiceError> {
    let attempt = {
        let mut guard = session.lock().await;
        let quiz_id = guard.quiz.id;
        let question_count = guard.quiz.questions.len();
        let Some(participant) = guard.participants.get_mut(&user_id) else {
            return Ok(());
        };
        if participant.is_finished() || participant.persisting {
            debug!(%challenge_id, %user_id, "duplicate finish signal ignored");
            return Ok(());
        }
        participant.persisting = true;

        let correct_count = participant.attempts.iter().filter(|a| a.correct).count();
        let percentage = if question_count == 0 {
            0.0
        } else {
            (correct_count as f32 / question_count as f32) * 100.0
        };

        QuizAttempt {
            quiz_id,
            user_id,
            score: participant.score,
            percentage,
            answers: participant
                .attempts
                .iter()
                .map(|a| AttemptAnswer {
                    question_id: a.question_id,
                    answer: a.answer.clone(),
                    correct: a.correct,
                    time_taken: a.time_taken_secs,
                })
                .collect(),
        }
    };

    let persisted = state.result_sink().persist(attempt).await;

    let mut guard = session.lock().await;
    if guard.phase == SessionPhase::Completed {
        // Grace expiry resolved the match while this persist was in
        // flight. The resolution has already been broadcast and is final;
        // the late result must not reopen it.
        debug!(%challenge_id, %user_id, "persist landed after resolution, dropping");
        return Ok(());
    }
    let result_id = match persisted {
        Ok(result_id) => result_id,
        Err(err) => {
            warn!(%challenge_id, %user_id, error = %err, "result persistence failed");
            if let Some(participant) = guard.participants.get_mut(&user_id) {
                participant.persisting = false;
            }
            send_to_user(
                &guard,
                user_id,
                &ServerMessage::Error {
                    message: "Could not save your result, please retry".into(),
                },
            );
            return Err(err.into());
        }
    };

    let score = match guard.participants.get_mut(&user_id) {
        Some(participant) => {
            participant.finish = Some(FinishRecord {
                score: participant.score,
                time_secs: total_time,
                result_id: Some(result_id),
            });
            participant.score
        }
        None => return Ok(()),
    };
    info!(%challenge_id, %user_id, score, time_secs = total_time, "participant finished");

    let all_finished = guard.participants.values().all(|p| p.is_finished());
    if all_finished {
        resolve(state, challenge_id, &mut guard).await;
        drop(guard);
        state.sessions().remove(&challenge_id);
        return Ok(());
    }

    broadcast_except(
        &guard,
        user_id,
        &ServerMessage::OpponentFinished {
            user_id,
            score,
            time: total_time,
        },
    );

    let grace = state.config().grace_period();
    let task_state = state.clone();
    guard.cancel_grace();
    guard.grace_task = Some(tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        grace_elapsed(&task_state, challenge_id).await;
    }));

    Ok(())
}

/// Grace timer callback: force-end unfinished participants and resolve.
///
/// Force-ended participants keep whatever score they accumulated; their
/// Result is not persisted (bounded data loss accepted for liveness), so
/// the recorded outcome carries no result id.
async fn grace_elapsed(state: &SharedState, challenge_id: Uuid) {
    let Some(session) = lookup(state, challenge_id) else {
        return;
    };
    let mut guard = session.lock().await;
    if guard.phase == SessionPhase::Completed {
        return;
    }
    guard.grace_task = None;

    let laggards: Vec<Uuid> = guard
        .participants
        .iter()
        .filter(|(_, p)| !p.is_finished())
        .map(|(id, _)| *id)
        .collect();

    for user_id in laggards {
        send_to_user(
            &guard,
            user_id,
            &ServerMessage::ForceChallengeEnd {
                reason: FORCE_END_REASON.into(),
                message: "Your opponent finished and the grace period expired; \
                          the match was ended with your current score."
                    .into(),
            },
        );
        if let Some(participant) = guard.participants.get_mut(&user_id) {
            participant.finish = Some(FinishRecord {
                score: participant.score,
                time_secs: participant.elapsed_secs(),
                result_id: None,
            });
            warn!(
                %challenge_id, %user_id,
                score = participant.score,
                "participant force-ended after grace period"
            );
        }
    }

    resolve(state, challenge_id, &mut guard).await;
    drop(guard);
    state.sessions().remove(&challenge_id);
}

/// Apply the tie-break rule: higher score wins, equal scores fall back to
/// the faster completion time, a full tie is a draw.
pub fn decide_winner(a: (Uuid, u32, u32), b: (Uuid, u32, u32)) -> Option<Uuid> {
    let (a_id, a_score, a_time) = a;
    let (b_id, b_score, b_time) = b;
    match (a_score.cmp(&b_score), a_time.cmp(&b_time)) {
        (std::cmp::Ordering::Greater, _) => Some(a_id),
        (std::cmp::Ordering::Less, _) => Some(b_id),
        (std::cmp::Ordering::Equal, std::cmp::Ordering::Less) => Some(a_id),
        (std::cmp::Ordering::Equal, std::cmp::Ordering::Greater) => Some(b_id),
        (std::cmp::Ordering::Equal, std::cmp::Ordering::Equal) => None,
    }
}

/// Terminal step: compute the winner, persist the completed challenge, and
/// broadcast `challenge_finished`. Runs exactly once per session; callers
/// hold the session lock and remove the registry entry afterwards.
async fn resolve(state: &SharedState, challenge_id: Uuid, guard: &mut SessionState) {
    let results: Vec<(Uuid, String, FinishRecord)> = guard
        .participants
        .iter()
        .filter_map(|(id, p)| p.finish.map(|record| (*id, p.username.clone(), record)))
        .collect();

    let winner = match results.as_slice() {
        [a, b] => decide_winner((a.0, a.2.score, a.2.time_secs), (b.0, b.2.score, b.2.time_secs)),
        // A solo resolution (opponent never progressed past countdown)
        // cannot have a meaningful winner comparison; the finisher wins.
        [only] => Some(only.0),
        _ => None,
    };

    persist_outcome(state, challenge_id, &results, winner).await;

    let participants = results
        .iter()
        .map(|(id, username, record)| ParticipantResult {
            user_id: *id,
            username: username.clone(),
            score: record.score,
            time: record.time_secs,
            result_id: record.result_id,
        })
        .collect();

    broadcast(
        guard,
        &ServerMessage::ChallengeFinished {
            winner_id: winner,
            result: MatchResult {
                challenge_id,
                quiz_id: guard.quiz.id,
                draw: winner.is_none() && results.len() == 2,
            },
            participants,
        },
    );

    if let Err(err) = guard.transition(SessionEvent::MatchResolved) {
        warn!(%challenge_id, error = %err, "resolution from unexpected phase");
        guard.phase = SessionPhase::Completed;
    }
    guard.cancel_countdown();
    guard.cancel_grace();
    info!(%challenge_id, winner = ?winner, "challenge resolved");
}

/// Write the resolved outcome back to the challenge record. Failures are
/// logged but do not block resolution: the broadcast must reach the clients
/// even when storage is degraded.
async fn persist_outcome(
    state: &SharedState,
    challenge_id: Uuid,
    results: &[(Uuid, String, FinishRecord)],
    winner: Option<Uuid>,
) {
    let Some(store) = state.challenge_store().await else {
        warn!(%challenge_id, "cannot persist outcome, storage degraded");
        return;
    };

    let mut challenge = match store.find_challenge(challenge_id).await {
        Ok(Some(challenge)) => challenge,
        Ok(None) => {
            warn!(%challenge_id, "challenge record vanished before resolution");
            return;
        }
        Err(err) => {
            warn!(%challenge_id, error = %err, "failed to load challenge for resolution");
            return;
        }
    };

    for (user_id, _, record) in results {
        if let Some(slot) = challenge.outcome_mut(*user_id) {
            *slot = Some(OutcomeEntity {
                score: record.score,
                time_secs: record.time_secs,
                result_id: record.result_id,
            });
        }
    }
    challenge.status = ChallengeStatus::Completed;
    challenge.winner = winner;
    challenge.updated_at = SystemTime::now();

    if let Err(err) = store.save_challenge(challenge).await {
        warn!(%challenge_id, error = %err, "failed to persist resolved challenge");
    }
}

fn lookup(state: &SharedState, challenge_id: Uuid) -> Option<Arc<ChallengeSession>> {
    state
        .sessions()
        .get(&challenge_id)
        .map(|entry| entry.value().clone())
}

/// Serialize a payload and push it onto one participant's writer channel.
/// Delivery failures mean the connection is gone; the disconnect path will
/// notice, so they are not treated as errors here.
fn send_to_user(session: &SessionState, user_id: Uuid, message: &ServerMessage) {
    if let Some(tx) = session
        .participants
        .get(&user_id)
        .and_then(|p| p.tx.as_ref())
    {
        send_message(tx, message);
    }
}

fn broadcast(session: &SessionState, message: &ServerMessage) {
    for participant in session.participants.values() {
        if let Some(tx) = participant.tx.as_ref() {
            send_message(tx, message);
        }
    }
}

fn broadcast_except(session: &SessionState, user_id: Uuid, message: &ServerMessage) {
    for (id, participant) in session.participants.iter() {
        if *id == user_id {
            continue;
        }
        if let Some(tx) = participant.tx.as_ref() {
            send_message(tx, message);
        }
    }
}

fn send_message(tx: &mpsc::UnboundedSender<Message>, message: &ServerMessage) {
    match serde_json::to_string(message) {
        Ok(payload) => {
            let _ = tx.send(Message::Text(payload.into()));
        }
        Err(err) => warn!(error = %err, "failed to serialize server message"),
    }
}
