//! Tagged-union protocol spoken over the challenge WebSocket.
//!
//! Event tags are snake_case and payload fields camelCase, matching the
//! client contract. Every message carries a `type` discriminator so the
//! handler can dispatch with a single `match` instead of stringly-typed
//! listener registration.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Messages accepted from challenge WebSocket clients.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Enter the challenge room; must be the first frame on a connection.
    #[serde(rename_all = "camelCase")]
    JoinChallenge {
        /// Joining user.
        user_id: Uuid,
        /// Challenge to join.
        challenge_id: Uuid,
        /// Display name shown to the opponent.
        username: String,
    },
    /// Leave the challenge room ahead of closing the connection.
    #[serde(rename_all = "camelCase")]
    LeaveChallenge {
        /// Challenge to leave.
        challenge_id: Uuid,
    },
    /// One answer submission. An empty `answer` marks an unattempted
    /// question whose 30-second window expired client-side.
    #[serde(rename_all = "camelCase")]
    ChallengeSubmitAnswer {
        /// Challenge being played.
        challenge_id: Uuid,
        /// Submitting user.
        user_id: Uuid,
        /// Question being answered.
        question_id: Uuid,
        /// Submitted answer text.
        #[serde(default)]
        answer: String,
        /// Seconds spent on this question.
        time_taken: u32,
        /// Index the client believes it is on; stale values are dropped.
        current_question_index: usize,
    },
    /// Explicit finish signal carrying the client-measured total time.
    #[serde(rename_all = "camelCase")]
    ChallengeComplete {
        /// Challenge being finished.
        challenge_id: Uuid,
        /// Finishing user.
        user_id: Uuid,
        /// Total completion time in seconds.
        total_time: u32,
    },
    /// Anything with an unrecognized `type` tag; dropped by the handler.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse a raw text frame into a protocol message.
    pub fn from_json_str(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// Snapshot of one participant inside a `challenge_finished` broadcast.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantResult {
    /// Participant user id.
    pub user_id: Uuid,
    /// Display name.
    pub username: String,
    /// Final score.
    pub score: u32,
    /// Completion time in seconds.
    pub time: u32,
    /// Persisted Result id, when one exists.
    pub result_id: Option<Uuid>,
}

/// Identity of the resolved match inside a `challenge_finished` broadcast.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// Challenge that was resolved.
    pub challenge_id: Uuid,
    /// Quiz that was played.
    pub quiz_id: Uuid,
    /// True when scores and times were both equal.
    pub draw: bool,
}

/// Messages pushed by the server to challenge WebSocket clients.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The second participant connected to the room.
    #[serde(rename_all = "camelCase")]
    OpponentJoined {
        /// User who just joined.
        user_id: Uuid,
    },
    /// Both participants are connected; the countdown starts now.
    BothPlayersReady,
    /// Countdown elapsed; both clients start question 1 from this instant.
    ChallengeStart,
    /// The participant is alone in the session.
    WaitingForOpponent,
    /// Private scoring feedback for the submitter only.
    #[serde(rename_all = "camelCase")]
    ChallengeAnswerResult {
        /// Whether the submitted answer was correct.
        correct: bool,
        /// Stored correct answer, for display.
        correct_answer: String,
        /// New cumulative score.
        new_score: u32,
    },
    /// Opponent advanced a question. Never carries the answer text.
    #[serde(rename_all = "camelCase")]
    OpponentProgress {
        /// User who submitted.
        user_id: Uuid,
        /// Their new question index.
        current_question: usize,
        /// Their cumulative score.
        score: u32,
        /// Whether their last answer was correct.
        is_correct: bool,
    },
    /// The opponent finished; the grace period is running.
    #[serde(rename_all = "camelCase")]
    OpponentFinished {
        /// User who finished first.
        user_id: Uuid,
        /// Their final score.
        score: u32,
        /// Their completion time in seconds.
        time: u32,
    },
    /// Grace period elapsed; the match is being resolved from partial data.
    #[serde(rename_all = "camelCase")]
    ForceChallengeEnd {
        /// Machine-readable reason (`grace_period_expired`).
        reason: String,
        /// Human-readable explanation for the player.
        message: String,
    },
    /// Terminal broadcast carrying the resolved outcome.
    #[serde(rename_all = "camelCase")]
    ChallengeFinished {
        /// Winning user id; None on a true draw.
        winner_id: Option<Uuid>,
        /// Identity of the resolved match.
        result: MatchResult,
        /// Both participants' final figures.
        participants: Vec<ParticipantResult>,
    },
    /// Recoverable error surfaced to one client (e.g. result persistence failed).
    #[serde(rename_all = "camelCase")]
    Error {
        /// Human-readable description.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_frame_round_trips_with_camel_case_payload() {
        let raw = r#"{
            "type": "join_challenge",
            "userId": "6f4f0c1a-58c9-4f2b-9b6e-6f63a4b1f8d2",
            "challengeId": "b7e2a5d4-8e61-4a5d-9a3e-2f0f5f4c9e11",
            "username": "alice"
        }"#;
        let message = ClientMessage::from_json_str(raw).unwrap();
        match message {
            ClientMessage::JoinChallenge { username, .. } => assert_eq!(username, "alice"),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn unrecognized_type_maps_to_unknown() {
        let message = ClientMessage::from_json_str(r#"{"type": "spectate"}"#).unwrap();
        assert!(matches!(message, ClientMessage::Unknown));
    }

    #[test]
    fn missing_answer_defaults_to_empty() {
        let raw = r#"{
            "type": "challenge_submit_answer",
            "challengeId": "b7e2a5d4-8e61-4a5d-9a3e-2f0f5f4c9e11",
            "userId": "6f4f0c1a-58c9-4f2b-9b6e-6f63a4b1f8d2",
            "questionId": "0e8a6c7b-1d2e-4f3a-8b9c-0d1e2f3a4b5c",
            "timeTaken": 30,
            "currentQuestionIndex": 2
        }"#;
        let message = ClientMessage::from_json_str(raw).unwrap();
        match message {
            ClientMessage::ChallengeSubmitAnswer { answer, .. } => assert!(answer.is_empty()),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn server_events_use_snake_case_tags() {
        let encoded = serde_json::to_string(&ServerMessage::BothPlayersReady).unwrap();
        assert_eq!(encoded, r#"{"type":"both_players_ready"}"#);

        let encoded = serde_json::to_string(&ServerMessage::OpponentProgress {
            user_id: Uuid::nil(),
            current_question: 3,
            score: 20,
            is_correct: true,
        })
        .unwrap();
        assert!(encoded.contains(r#""type":"opponent_progress""#));
        assert!(encoded.contains(r#""currentQuestion":3"#));
        assert!(encoded.contains(r#""isCorrect":true"#));
    }
}
