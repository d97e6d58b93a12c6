use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::quiz::{CreateQuizRequest, QuizDetail},
    error::AppError,
    services::challenge_service,
    state::SharedState,
};

/// Routes handling quiz authoring and retrieval.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/quizzes", post(create_quiz))
        .route("/quizzes/{id}", get(get_quiz))
}

/// Create a quiz for challenges to reference.
#[utoipa::path(
    post,
    path = "/quizzes",
    tag = "quizzes",
    request_body = CreateQuizRequest,
    responses(
        (status = 200, description = "Quiz created", body = QuizDetail)
    )
)]
pub async fn create_quiz(
    State(state): State<SharedState>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<Json<QuizDetail>, AppError> {
    payload.validate()?;
    let detail = challenge_service::create_quiz(&state, payload).await?;
    Ok(Json(detail))
}

/// Fetch a quiz with its correct answers stripped.
#[utoipa::path(
    get,
    path = "/quizzes/{id}",
    tag = "quizzes",
    params(("id" = Uuid, Path, description = "Identifier of the quiz")),
    responses(
        (status = 200, description = "Quiz detail", body = QuizDetail),
        (status = 404, description = "Quiz not found")
    )
)]
pub async fn get_quiz(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<QuizDetail>, AppError> {
    let detail = challenge_service::get_quiz(&state, id).await?;
    Ok(Json(detail))
}
