use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{ChallengeEntity, ChallengeStatus, OutcomeEntity, ParticipantRefEntity};

/// On-disk shape of a challenge document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoChallengeDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    quiz_id: Uuid,
    creator: ParticipantRefEntity,
    opponent: ParticipantRefEntity,
    status: ChallengeStatus,
    #[serde(default)]
    creator_outcome: Option<OutcomeEntity>,
    #[serde(default)]
    opponent_outcome: Option<OutcomeEntity>,
    #[serde(default)]
    winner: Option<Uuid>,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<ChallengeEntity> for MongoChallengeDocument {
    fn from(value: ChallengeEntity) -> Self {
        Self {
            id: value.id,
            quiz_id: value.quiz_id,
            creator: value.creator,
            opponent: value.opponent,
            status: value.status,
            creator_outcome: value.creator_outcome,
            opponent_outcome: value.opponent_outcome,
            winner: value.winner,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoChallengeDocument> for ChallengeEntity {
    fn from(value: MongoChallengeDocument) -> Self {
        Self {
            id: value.id,
            quiz_id: value.quiz_id,
            creator: value.creator,
            opponent: value.opponent,
            status: value.status,
            creator_outcome: value.creator_outcome,
            opponent_outcome: value.opponent_outcome,
            winner: value.winner,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}
