use axum::Router;

use crate::state::SharedState;

pub mod challenge;
pub mod docs;
pub mod health;
pub mod quiz;
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(websocket::router())
        .merge(challenge::router())
        .merge(quiz::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
