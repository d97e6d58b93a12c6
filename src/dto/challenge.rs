//! REST payloads for the challenge lifecycle surface.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{
        ChallengeEntity, ChallengeListItemEntity, ChallengeStatus, OutcomeEntity,
        ParticipantRefEntity,
    },
    dto::{format_system_time, validation::validate_username},
};

/// Payload used to issue a new challenge invitation.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateChallengeRequest {
    /// Quiz both participants will play.
    pub quiz_id: Uuid,
    /// User issuing the challenge.
    pub creator_id: Uuid,
    /// Creator display name.
    #[validate(custom(function = "validate_username"))]
    pub creator_username: String,
    /// User being challenged.
    pub opponent_id: Uuid,
    /// Opponent display name, as entered by the creator.
    #[validate(custom(function = "validate_username"))]
    pub opponent_username: String,
}

/// Identifies the acting user for accept/decline/cancel actions.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RespondRequest {
    /// User performing the action.
    pub user_id: Uuid,
}

/// One side of a challenge in REST responses.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDto {
    /// Stable user identifier.
    pub user_id: Uuid,
    /// Display name.
    pub username: String,
    /// Final figures, once this participant finished.
    pub outcome: Option<OutcomeDto>,
}

/// Final figures for one participant.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeDto {
    /// Final score.
    pub score: u32,
    /// Completion time in seconds.
    pub time_secs: u32,
    /// Persisted Result id, when one exists.
    pub result_id: Option<Uuid>,
}

impl From<OutcomeEntity> for OutcomeDto {
    fn from(value: OutcomeEntity) -> Self {
        Self {
            score: value.score,
            time_secs: value.time_secs,
            result_id: value.result_id,
        }
    }
}

fn participant_dto(reference: ParticipantRefEntity, outcome: Option<OutcomeEntity>) -> ParticipantDto {
    ParticipantDto {
        user_id: reference.user_id,
        username: reference.username,
        outcome: outcome.map(Into::into),
    }
}

/// Full challenge record returned by `GET /challenges/{id}`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeDetail {
    /// Challenge identifier.
    pub id: Uuid,
    /// Quiz both participants play.
    pub quiz_id: Uuid,
    /// Lifecycle status.
    pub status: ChallengeStatus,
    /// Challenge issuer.
    pub creator: ParticipantDto,
    /// Challenged user.
    pub opponent: ParticipantDto,
    /// Winning user id; None while unresolved or on a draw.
    pub winner: Option<Uuid>,
    /// RFC3339 creation timestamp.
    pub created_at: String,
    /// RFC3339 last-update timestamp.
    pub updated_at: String,
}

impl From<ChallengeEntity> for ChallengeDetail {
    fn from(value: ChallengeEntity) -> Self {
        Self {
            id: value.id,
            quiz_id: value.quiz_id,
            status: value.status,
            creator: participant_dto(value.creator, value.creator_outcome),
            opponent: participant_dto(value.opponent, value.opponent_outcome),
            winner: value.winner,
            created_at: format_system_time(value.created_at),
            updated_at: format_system_time(value.updated_at),
        }
    }
}

/// Compact challenge row returned by the list endpoint.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeSummary {
    /// Challenge identifier.
    pub id: Uuid,
    /// Quiz both participants play.
    pub quiz_id: Uuid,
    /// Lifecycle status.
    pub status: ChallengeStatus,
    /// Creator display name.
    pub creator_username: String,
    /// Opponent display name.
    pub opponent_username: String,
    /// Winning user id, if resolved.
    pub winner: Option<Uuid>,
    /// RFC3339 creation timestamp.
    pub created_at: String,
}

impl From<ChallengeListItemEntity> for ChallengeSummary {
    fn from(value: ChallengeListItemEntity) -> Self {
        Self {
            id: value.id,
            quiz_id: value.quiz_id,
            status: value.status,
            creator_username: value.creator.username,
            opponent_username: value.opponent.username,
            winner: value.winner,
            created_at: format_system_time(value.created_at),
        }
    }
}
