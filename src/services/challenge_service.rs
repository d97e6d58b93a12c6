//! Challenge lifecycle operations backing the REST surface.

use std::time::SystemTime;

use uuid::Uuid;

use crate::{
    dao::models::{ChallengeEntity, ChallengeStatus, ParticipantRefEntity, QuizEntity},
    dto::{
        challenge::{ChallengeDetail, ChallengeSummary, CreateChallengeRequest},
        quiz::{CreateQuizRequest, QuizDetail},
    },
    error::ServiceError,
    state::SharedState,
};

/// Issue a new challenge invitation in the `Pending` state.
pub async fn create_challenge(
    state: &SharedState,
    request: CreateChallengeRequest,
) -> Result<ChallengeDetail, ServiceError> {
    if request.creator_id == request.opponent_id {
        return Err(ServiceError::InvalidInput(
            "a challenge requires two distinct participants".into(),
        ));
    }

    let store = state.require_challenge_store().await?;
    if store.find_quiz(request.quiz_id).await?.is_none() {
        return Err(ServiceError::NotFound(format!(
            "quiz `{}` not found",
            request.quiz_id
        )));
    }

    let now = SystemTime::now();
    let challenge = ChallengeEntity {
        id: Uuid::new_v4(),
        quiz_id: request.quiz_id,
        creator: ParticipantRefEntity {
            user_id: request.creator_id,
            username: request.creator_username,
        },
        opponent: ParticipantRefEntity {
            user_id: request.opponent_id,
            username: request.opponent_username,
        },
        status: ChallengeStatus::Pending,
        creator_outcome: None,
        opponent_outcome: None,
        winner: None,
        created_at: now,
        updated_at: now,
    };

    store.save_challenge(challenge.clone()).await?;
    Ok(challenge.into())
}

/// Actions the two sides can take on a pending invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvitationAction {
    /// Opponent accepts; the challenge becomes `Active`.
    Accept,
    /// Opponent declines; terminal.
    Decline,
    /// Creator withdraws; terminal.
    Cancel,
}

/// Apply an accept/decline/cancel action to a pending challenge.
///
/// Only the opponent may accept or decline and only the creator may cancel;
/// every action is valid from `Pending` alone.
pub async fn respond(
    state: &SharedState,
    challenge_id: Uuid,
    user_id: Uuid,
    action: InvitationAction,
) -> Result<ChallengeDetail, ServiceError> {
    let store = state.require_challenge_store().await?;
    let Some(mut challenge) = store.find_challenge(challenge_id).await? else {
        return Err(ServiceError::NotFound(format!(
            "challenge `{challenge_id}` not found"
        )));
    };

    if challenge.status != ChallengeStatus::Pending {
        return Err(ServiceError::InvalidState(format!(
            "challenge is {:?}, not pending",
            challenge.status
        )));
    }

    let (allowed, next_status) = match action {
        InvitationAction::Accept => (challenge.opponent.user_id, ChallengeStatus::Active),
        InvitationAction::Decline => (challenge.opponent.user_id, ChallengeStatus::Declined),
        InvitationAction::Cancel => (challenge.creator.user_id, ChallengeStatus::Cancelled),
    };
    if user_id != allowed {
        return Err(ServiceError::Unauthorized(format!(
            "user is not allowed to {action:?} this challenge"
        )));
    }

    challenge.status = next_status;
    challenge.updated_at = SystemTime::now();
    store.save_challenge(challenge.clone()).await?;
    Ok(challenge.into())
}

/// Full challenge record for the post-match detail screen.
pub async fn get_challenge(
    state: &SharedState,
    challenge_id: Uuid,
) -> Result<ChallengeDetail, ServiceError> {
    let store = state.require_challenge_store().await?;
    let Some(challenge) = store.find_challenge(challenge_id).await? else {
        return Err(ServiceError::NotFound(format!(
            "challenge `{challenge_id}` not found"
        )));
    };
    Ok(challenge.into())
}

/// Every challenge the user participates in, newest first.
pub async fn list_challenges(
    state: &SharedState,
    user_id: Uuid,
) -> Result<Vec<ChallengeSummary>, ServiceError> {
    let store = state.require_challenge_store().await?;
    let items = store.list_challenges_for_user(user_id).await?;
    Ok(items.into_iter().map(Into::into).collect())
}

/// Seed quiz content for challenges to reference.
pub async fn create_quiz(
    state: &SharedState,
    request: CreateQuizRequest,
) -> Result<QuizDetail, ServiceError> {
    let store = state.require_challenge_store().await?;
    let quiz = QuizEntity {
        id: Uuid::new_v4(),
        title: request.title,
        questions: request.questions.into_iter().map(Into::into).collect(),
    };
    store.save_quiz(quiz.clone()).await?;
    Ok(quiz.into())
}

/// Player-facing quiz content (correct answers stripped).
pub async fn get_quiz(state: &SharedState, quiz_id: Uuid) -> Result<QuizDetail, ServiceError> {
    let store = state.require_challenge_store().await?;
    let Some(quiz) = store.find_quiz(quiz_id).await? else {
        return Err(ServiceError::NotFound(format!("quiz `{quiz_id}` not found")));
    };
    Ok(quiz.into())
}
