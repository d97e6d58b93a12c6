use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Quiz Duel Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
        crate::routes::challenge::create_challenge,
        crate::routes::challenge::accept_challenge,
        crate::routes::challenge::decline_challenge,
        crate::routes::challenge::cancel_challenge,
        crate::routes::challenge::get_challenge,
        crate::routes::challenge::list_challenges,
        crate::routes::quiz::create_quiz,
        crate::routes::quiz::get_quiz,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::challenge::CreateChallengeRequest,
            crate::dto::challenge::RespondRequest,
            crate::dto::challenge::ChallengeDetail,
            crate::dto::challenge::ChallengeSummary,
            crate::dto::quiz::CreateQuizRequest,
            crate::dto::quiz::QuizDetail,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
            crate::dao::models::ChallengeStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "challenges", description = "Challenge invitation lifecycle"),
        (name = "quizzes", description = "Quiz authoring and retrieval"),
        (name = "duel", description = "WebSocket operations for live duels"),
    )
)]
pub struct ApiDoc;
