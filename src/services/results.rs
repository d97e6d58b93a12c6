//! Client for the external Result Persistence API.
//!
//! The coordinator treats results as a write-once sink returning an opaque
//! id. The HTTP implementation is hidden behind [`ResultSink`] so tests can
//! substitute recording or failing sinks.

use futures::future::BoxFuture;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// One per-question attempt inside a persisted Result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptAnswer {
    /// Question this attempt belongs to.
    pub question_id: Uuid,
    /// Submitted answer; None when the question timed out unanswered.
    pub answer: Option<String>,
    /// Whether the answer was correct.
    pub correct: bool,
    /// Seconds spent on the question.
    pub time_taken: u32,
}

/// Completed quiz attempt for one participant.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    /// Quiz that was played.
    pub quiz_id: Uuid,
    /// Participant the attempt belongs to.
    pub user_id: Uuid,
    /// Final score.
    pub score: u32,
    /// Share of questions answered correctly, 0–100.
    pub percentage: f32,
    /// Per-question records in play order.
    pub answers: Vec<AttemptAnswer>,
}

/// Errors raised while persisting an attempt.
#[derive(Debug, Error)]
pub enum ResultSinkError {
    /// The API could not be reached.
    #[error("result API unreachable")]
    Transport(#[source] reqwest::Error),
    /// The API answered with a non-success status.
    #[error("result API rejected the attempt with status {status}")]
    Rejected {
        /// HTTP status returned by the API.
        status: StatusCode,
    },
    /// The API answered 2xx but the body was not the expected shape.
    #[error("result API returned an unreadable response")]
    InvalidResponse(#[source] reqwest::Error),
}

/// Write-once sink durably recording a completed quiz attempt.
pub trait ResultSink: Send + Sync {
    /// Persist one attempt, returning the opaque Result id.
    fn persist(&self, attempt: QuizAttempt) -> BoxFuture<'static, Result<Uuid, ResultSinkError>>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistResponse {
    result_id: Uuid,
}

/// [`ResultSink`] implementation posting to `POST {base}/results`.
pub struct HttpResultSink {
    client: reqwest::Client,
    base_url: String,
}

impl HttpResultSink {
    /// Build a sink for the given API base URL (no trailing slash required).
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }
}

impl ResultSink for HttpResultSink {
    fn persist(&self, attempt: QuizAttempt) -> BoxFuture<'static, Result<Uuid, ResultSinkError>> {
        let client = self.client.clone();
        let url = format!("{}/results", self.base_url);
        Box::pin(async move {
            let response = client
                .post(&url)
                .json(&attempt)
                .send()
                .await
                .map_err(ResultSinkError::Transport)?;

            let status = response.status();
            if !status.is_success() {
                return Err(ResultSinkError::Rejected { status });
            }

            let body: PersistResponse = response
                .json()
                .await
                .map_err(ResultSinkError::InvalidResponse)?;
            Ok(body.result_id)
        })
    }
}
