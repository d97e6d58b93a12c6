//! Entities persisted by the challenge store and shared across layers.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle status of a 1v1 challenge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    /// Invitation sent, not yet accepted by the opponent.
    Pending,
    /// Accepted; match in progress or ready to start.
    Active,
    /// Both sides finished and the outcome is resolved.
    Completed,
    /// Opponent turned the invitation down.
    Declined,
    /// Creator withdrew the invitation before it was accepted.
    Cancelled,
}

/// Identity of one side of a challenge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantRefEntity {
    /// Stable user identifier.
    pub user_id: Uuid,
    /// Display name captured at challenge creation.
    pub username: String,
}

/// Final figures recorded for one participant once they finish.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutcomeEntity {
    /// Sum of per-question point awards.
    pub score: u32,
    /// Completion time in seconds, used only for tie-breaking and display.
    pub time_secs: u32,
    /// Reference to the persisted Result record. None when the match was
    /// force-ended before this participant's result could be persisted.
    pub result_id: Option<Uuid>,
}

/// A 1v1 match persisted by the storage layer. Never deleted; retained for
/// history and statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChallengeEntity {
    /// Primary key of the challenge.
    pub id: Uuid,
    /// Quiz both participants play.
    pub quiz_id: Uuid,
    /// User who issued the challenge.
    pub creator: ParticipantRefEntity,
    /// User who was challenged.
    pub opponent: ParticipantRefEntity,
    /// Current lifecycle status.
    pub status: ChallengeStatus,
    /// Creator's outcome, populated once the creator finishes.
    pub creator_outcome: Option<OutcomeEntity>,
    /// Opponent's outcome, populated once the opponent finishes.
    pub opponent_outcome: Option<OutcomeEntity>,
    /// Winning user id. None while unresolved, or on a true draw
    /// (equal score and equal completion time).
    pub winner: Option<Uuid>,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
    /// Last time the challenge entity was updated.
    pub updated_at: SystemTime,
}

impl ChallengeEntity {
    /// Whether `user_id` is one of the two participants.
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.creator.user_id == user_id || self.opponent.user_id == user_id
    }

    /// Outcome slot for `user_id`, if the user participates in this challenge.
    pub fn outcome_mut(&mut self, user_id: Uuid) -> Option<&mut Option<OutcomeEntity>> {
        if self.creator.user_id == user_id {
            Some(&mut self.creator_outcome)
        } else if self.opponent.user_id == user_id {
            Some(&mut self.opponent_outcome)
        } else {
            None
        }
    }
}

/// Distinguishes how a question is answered and scored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum QuestionKind {
    /// Fixed set of options; correctness is an exact string match.
    MultipleChoice {
        /// Answer options shown to the player.
        options: Vec<String>,
    },
    /// True/false question; correctness is a case-insensitive match.
    Boolean,
}

/// One question of a quiz.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct QuestionEntity {
    /// Stable identifier for the question.
    pub id: Uuid,
    /// Question text shown to the player.
    pub text: String,
    /// Answer mode for this question.
    #[serde(flatten)]
    pub kind: QuestionKind,
    /// Stored correct answer.
    pub correct_answer: String,
}

impl QuestionEntity {
    /// Compare a submitted answer against the stored correct one.
    ///
    /// Multiple-choice answers must match exactly; boolean answers match
    /// `true`/`false` regardless of case.
    pub fn is_correct(&self, answer: &str) -> bool {
        match self.kind {
            QuestionKind::MultipleChoice { .. } => answer == self.correct_answer,
            QuestionKind::Boolean => answer.eq_ignore_ascii_case(&self.correct_answer),
        }
    }
}

/// Quiz content consumed by the coordinator; owned by the CRUD layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizEntity {
    /// Primary key of the quiz.
    pub id: Uuid,
    /// Display title of the quiz.
    pub title: String,
    /// Ordered questions; both participants play them in this order.
    pub questions: Vec<QuestionEntity>,
}

/// Subset of [`ChallengeEntity`] returned by list queries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChallengeListItemEntity {
    /// Primary key of the challenge.
    pub id: Uuid,
    /// Quiz both participants play.
    pub quiz_id: Uuid,
    /// User who issued the challenge.
    pub creator: ParticipantRefEntity,
    /// User who was challenged.
    pub opponent: ParticipantRefEntity,
    /// Current lifecycle status.
    pub status: ChallengeStatus,
    /// Winning user id, if resolved.
    pub winner: Option<Uuid>,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

impl From<ChallengeEntity> for ChallengeListItemEntity {
    fn from(value: ChallengeEntity) -> Self {
        Self {
            id: value.id,
            quiz_id: value.quiz_id,
            creator: value.creator,
            opponent: value.opponent,
            status: value.status,
            winner: value.winner,
            created_at: value.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(kind: QuestionKind, correct: &str) -> QuestionEntity {
        QuestionEntity {
            id: Uuid::new_v4(),
            text: "q".into(),
            kind,
            correct_answer: correct.into(),
        }
    }

    #[test]
    fn multiple_choice_requires_exact_match() {
        let q = question(
            QuestionKind::MultipleChoice {
                options: vec!["Paris".into(), "London".into()],
            },
            "Paris",
        );
        assert!(q.is_correct("Paris"));
        assert!(!q.is_correct("paris"));
        assert!(!q.is_correct("London"));
    }

    #[test]
    fn boolean_match_is_case_insensitive() {
        let q = question(QuestionKind::Boolean, "true");
        assert!(q.is_correct("true"));
        assert!(q.is_correct("TRUE"));
        assert!(!q.is_correct("false"));
    }
}
