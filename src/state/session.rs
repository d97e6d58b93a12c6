//! In-memory coordination state for one active challenge.

use std::sync::Arc;

use axum::extract::ws::Message;
use indexmap::IndexMap;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::dao::models::QuizEntity;

/// Phases a challenge session moves through.
///
/// `OpponentJoined` is the only way out of `WaitingForOpponent`, so the
/// ready broadcast fires exactly once per session even when a connection
/// flaps; a rejoin replaces the participant's sender without re-entering the
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// One participant is connected, the other has not joined yet.
    WaitingForOpponent,
    /// Both participants joined; the server-side countdown is running.
    Countdown,
    /// Both clients received the start signal and are answering questions.
    InProgress,
    /// The outcome has been resolved and broadcast. Terminal.
    Completed,
}

/// Events that can be applied to the session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The second distinct participant connected.
    OpponentJoined,
    /// The countdown timer elapsed; gameplay starts now.
    CountdownElapsed,
    /// Both outcomes are known (naturally or by force-end) and the winner is set.
    MatchResolved,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the session was in when the invalid event was received.
    pub from: SessionPhase,
    /// The event that cannot be applied from this phase.
    pub event: SessionEvent,
}

impl SessionPhase {
    /// Compute the next phase for an event, rejecting invalid pairs.
    pub fn apply(self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = match (self, event) {
            (SessionPhase::WaitingForOpponent, SessionEvent::OpponentJoined) => {
                SessionPhase::Countdown
            }
            (SessionPhase::Countdown, SessionEvent::CountdownElapsed) => SessionPhase::InProgress,
            (SessionPhase::Countdown | SessionPhase::InProgress, SessionEvent::MatchResolved) => {
                SessionPhase::Completed
            }
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

/// One answered (or timed-out) question, kept for the persisted Result.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    /// Question this attempt belongs to.
    pub question_id: Uuid,
    /// Submitted answer text. None when the answer window expired unanswered.
    pub answer: Option<String>,
    /// Whether the answer matched the stored correct one.
    pub correct: bool,
    /// Seconds the participant spent on this question.
    pub time_taken_secs: u32,
}

/// Figures recorded when a participant finishes, after their Result persisted.
#[derive(Debug, Clone, Copy)]
pub struct FinishRecord {
    /// Final score.
    pub score: u32,
    /// Total completion time in seconds.
    pub time_secs: u32,
    /// Persisted Result id; None when the match was force-resolved without one.
    pub result_id: Option<Uuid>,
}

/// Transient per-participant state inside a session.
#[derive(Debug)]
pub struct Participant {
    /// Display name carried in the join event.
    pub username: String,
    /// Outbound writer for this participant's connection; None while disconnected.
    pub tx: Option<mpsc::UnboundedSender<Message>>,
    /// Index of the question the participant should answer next.
    pub current_question: usize,
    /// Running score.
    pub score: u32,
    /// Per-question attempts in play order.
    pub attempts: Vec<AttemptRecord>,
    /// Latch guarding the at-most-once Result Persistence API call. Set while
    /// a persist is in flight; cleared again only if the persist fails.
    pub persisting: bool,
    /// Populated once this participant's finish has been recorded.
    pub finish: Option<FinishRecord>,
}

impl Participant {
    /// Fresh participant with an open connection and no progress.
    pub fn new(username: String, tx: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            username,
            tx: Some(tx),
            current_question: 0,
            score: 0,
            attempts: Vec::new(),
            persisting: false,
            finish: None,
        }
    }

    /// Whether this participant's finish has been recorded.
    pub fn is_finished(&self) -> bool {
        self.finish.is_some()
    }

    /// Seconds spent across all recorded attempts.
    pub fn elapsed_secs(&self) -> u32 {
        self.attempts.iter().map(|a| a.time_taken_secs).sum()
    }
}

/// Mutable session state, always accessed through the session mutex.
#[derive(Debug)]
pub struct SessionState {
    /// Challenge this session coordinates.
    pub challenge_id: Uuid,
    /// Quiz content snapshot taken when the session was created.
    pub quiz: Arc<QuizEntity>,
    /// Current phase.
    pub phase: SessionPhase,
    /// Participants keyed by user id, in join order.
    pub participants: IndexMap<Uuid, Participant>,
    /// Running countdown task, if any.
    pub countdown_task: Option<JoinHandle<()>>,
    /// Running grace-period task, if any.
    pub grace_task: Option<JoinHandle<()>>,
}

impl SessionState {
    fn new(challenge_id: Uuid, quiz: Arc<QuizEntity>) -> Self {
        Self {
            challenge_id,
            quiz,
            phase: SessionPhase::WaitingForOpponent,
            participants: IndexMap::new(),
            countdown_task: None,
            grace_task: None,
        }
    }

    /// Apply `event` to the current phase, advancing it on success.
    pub fn transition(&mut self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        self.phase = self.phase.apply(event)?;
        Ok(self.phase)
    }

    /// Number of participants with an open connection.
    pub fn connected_count(&self) -> usize {
        self.participants
            .values()
            .filter(|p| p.tx.is_some())
            .count()
    }

    /// Cancel the grace timer if one is pending.
    pub fn cancel_grace(&mut self) {
        if let Some(task) = self.grace_task.take() {
            task.abort();
        }
    }

    /// Cancel the countdown timer if one is pending.
    pub fn cancel_countdown(&mut self) {
        if let Some(task) = self.countdown_task.take() {
            task.abort();
        }
    }
}

impl Drop for SessionState {
    fn drop(&mut self) {
        // A discarded session must not leave timers firing against it.
        self.cancel_countdown();
        self.cancel_grace();
    }
}

/// Per-challenge session handle.
///
/// The mutex serializes every mutation for one session, so concurrent events
/// from the two participants are applied one at a time. Sessions for
/// different challenges hold independent locks and never contend.
pub struct ChallengeSession {
    state: Mutex<SessionState>,
}

impl ChallengeSession {
    /// Create a session in the waiting phase with a quiz snapshot.
    pub fn new(challenge_id: Uuid, quiz: Arc<QuizEntity>) -> Self {
        Self {
            state: Mutex::new(SessionState::new(challenge_id, quiz)),
        }
    }

    /// Acquire the session lock.
    pub async fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_through_session_phases() {
        let phase = SessionPhase::WaitingForOpponent;
        let phase = phase.apply(SessionEvent::OpponentJoined).unwrap();
        assert_eq!(phase, SessionPhase::Countdown);
        let phase = phase.apply(SessionEvent::CountdownElapsed).unwrap();
        assert_eq!(phase, SessionPhase::InProgress);
        let phase = phase.apply(SessionEvent::MatchResolved).unwrap();
        assert_eq!(phase, SessionPhase::Completed);
    }

    #[test]
    fn opponent_joined_fires_only_from_waiting() {
        for from in [
            SessionPhase::Countdown,
            SessionPhase::InProgress,
            SessionPhase::Completed,
        ] {
            let err = from.apply(SessionEvent::OpponentJoined).unwrap_err();
            assert_eq!(err.from, from);
            assert_eq!(err.event, SessionEvent::OpponentJoined);
        }
    }

    #[test]
    fn force_end_can_resolve_from_countdown() {
        // A disconnect during countdown leaves the survivor finishing alone;
        // resolution must still be reachable without passing through InProgress.
        let phase = SessionPhase::Countdown;
        assert_eq!(
            phase.apply(SessionEvent::MatchResolved).unwrap(),
            SessionPhase::Completed
        );
    }

    #[test]
    fn completed_is_terminal() {
        for event in [
            SessionEvent::OpponentJoined,
            SessionEvent::CountdownElapsed,
            SessionEvent::MatchResolved,
        ] {
            assert!(SessionPhase::Completed.apply(event).is_err());
        }
    }

    #[test]
    fn elapsed_time_sums_attempts() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut participant = Participant::new("alice".into(), tx);
        for secs in [5, 12, 8] {
            participant.attempts.push(AttemptRecord {
                question_id: Uuid::new_v4(),
                answer: Some("x".into()),
                correct: false,
                time_taken_secs: secs,
            });
        }
        assert_eq!(participant.elapsed_secs(), 25);
    }
}
