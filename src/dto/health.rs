use serde::Serialize;
use utoipa::ToSchema;

/// Coarse availability of the backend as seen by load balancers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Challenge store reachable, duels can be persisted.
    Ok,
    /// Storage lost; live duels continue but results may not persist.
    Degraded,
}

/// Payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Current availability.
    pub status: HealthStatus,
}

impl HealthResponse {
    /// Report the backend as fully operational.
    pub fn ok() -> Self {
        Self {
            status: HealthStatus::Ok,
        }
    }

    /// Report the backend as running without its challenge store.
    pub fn degraded() -> Self {
        Self {
            status: HealthStatus::Degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        let ok = serde_json::to_string(&HealthResponse::ok()).unwrap();
        assert_eq!(ok, r#"{"status":"ok"}"#);

        let degraded = serde_json::to_string(&HealthResponse::degraded()).unwrap();
        assert_eq!(degraded, r#"{"status":"degraded"}"#);
    }
}
