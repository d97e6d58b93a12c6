use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::challenge::{ChallengeDetail, ChallengeSummary, CreateChallengeRequest, RespondRequest},
    error::AppError,
    services::challenge_service::{self, InvitationAction},
    state::SharedState,
};

/// Routes handling the challenge invitation lifecycle.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/challenges", post(create_challenge).get(list_challenges))
        .route("/challenges/{id}", get(get_challenge))
        .route("/challenges/{id}/accept", post(accept_challenge))
        .route("/challenges/{id}/decline", post(decline_challenge))
        .route("/challenges/{id}/cancel", post(cancel_challenge))
}

/// Issue a new challenge invitation.
#[utoipa::path(
    post,
    path = "/challenges",
    tag = "challenges",
    request_body = CreateChallengeRequest,
    responses(
        (status = 200, description = "Challenge created", body = ChallengeDetail)
    )
)]
pub async fn create_challenge(
    State(state): State<SharedState>,
    Json(payload): Json<CreateChallengeRequest>,
) -> Result<Json<ChallengeDetail>, AppError> {
    payload.validate()?;
    let detail = challenge_service::create_challenge(&state, payload).await?;
    Ok(Json(detail))
}

/// Accept a pending invitation; only the invited opponent may do this.
#[utoipa::path(
    post,
    path = "/challenges/{id}/accept",
    tag = "challenges",
    params(("id" = Uuid, Path, description = "Identifier of the challenge")),
    request_body = RespondRequest,
    responses(
        (status = 200, description = "Challenge accepted", body = ChallengeDetail)
    )
)]
pub async fn accept_challenge(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RespondRequest>,
) -> Result<Json<ChallengeDetail>, AppError> {
    let detail =
        challenge_service::respond(&state, id, payload.user_id, InvitationAction::Accept).await?;
    Ok(Json(detail))
}

/// Decline a pending invitation; only the invited opponent may do this.
#[utoipa::path(
    post,
    path = "/challenges/{id}/decline",
    tag = "challenges",
    params(("id" = Uuid, Path, description = "Identifier of the challenge")),
    request_body = RespondRequest,
    responses(
        (status = 200, description = "Challenge declined", body = ChallengeDetail)
    )
)]
pub async fn decline_challenge(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RespondRequest>,
) -> Result<Json<ChallengeDetail>, AppError> {
    let detail =
        challenge_service::respond(&state, id, payload.user_id, InvitationAction::Decline).await?;
    Ok(Json(detail))
}

/// Cancel a pending invitation; only the creator may do this.
#[utoipa::path(
    post,
    path = "/challenges/{id}/cancel",
    tag = "challenges",
    params(("id" = Uuid, Path, description = "Identifier of the challenge")),
    request_body = RespondRequest,
    responses(
        (status = 200, description = "Challenge cancelled", body = ChallengeDetail)
    )
)]
pub async fn cancel_challenge(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RespondRequest>,
) -> Result<Json<ChallengeDetail>, AppError> {
    let detail =
        challenge_service::respond(&state, id, payload.user_id, InvitationAction::Cancel).await?;
    Ok(Json(detail))
}

/// Fetch a single challenge with its outcome, if any.
#[utoipa::path(
    get,
    path = "/challenges/{id}",
    tag = "challenges",
    params(("id" = Uuid, Path, description = "Identifier of the challenge")),
    responses(
        (status = 200, description = "Challenge detail", body = ChallengeDetail),
        (status = 404, description = "Challenge not found")
    )
)]
pub async fn get_challenge(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ChallengeDetail>, AppError> {
    let detail = challenge_service::get_challenge(&state, id).await?;
    Ok(Json(detail))
}

/// Query parameters for the challenge listing endpoint.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListChallengesQuery {
    /// Only challenges this user participates in are returned.
    pub user_id: Uuid,
}

/// List every challenge the user participates in, newest first.
#[utoipa::path(
    get,
    path = "/challenges",
    tag = "challenges",
    params(ListChallengesQuery),
    responses(
        (status = 200, description = "Challenges for the user", body = [ChallengeSummary])
    )
)]
pub async fn list_challenges(
    State(state): State<SharedState>,
    Query(query): Query<ListChallengesQuery>,
) -> Result<Json<Vec<ChallengeSummary>>, AppError> {
    let summaries = challenge_service::list_challenges(&state, query.user_id).await?;
    Ok(Json(summaries))
}
