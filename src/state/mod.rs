//! Shared application state: the session registry, store slot, and degraded flag.

pub mod session;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{RwLock, watch};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::challenge_store::ChallengeStore,
    error::ServiceError,
    services::results::ResultSink,
    state::session::ChallengeSession,
};

/// Cheaply cloneable handle to the application state.
pub type SharedState = Arc<AppState>;

/// Central application state storing the session registry and database handles.
pub struct AppState {
    config: Arc<AppConfig>,
    challenge_store: RwLock<Option<Arc<dyn ChallengeStore>>>,
    result_sink: Arc<dyn ResultSink>,
    /// Session registry: one entry per challenge with at least one connection.
    /// Process-local by design; multi-process deployments need sticky routing.
    sessions: DashMap<Uuid, Arc<ChallengeSession>>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a challenge store is installed.
    pub fn new(config: AppConfig, result_sink: Arc<dyn ResultSink>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config: Arc::new(config),
            challenge_store: RwLock::new(None),
            result_sink,
            sessions: DashMap::new(),
            degraded: degraded_tx,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Sink used to persist completed quiz attempts.
    pub fn result_sink(&self) -> Arc<dyn ResultSink> {
        self.result_sink.clone()
    }

    /// Obtain a handle to the current challenge store, if one is installed.
    pub async fn challenge_store(&self) -> Option<Arc<dyn ChallengeStore>> {
        let guard = self.challenge_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the challenge store or fail with a degraded-mode error.
    pub async fn require_challenge_store(&self) -> Result<Arc<dyn ChallengeStore>, ServiceError> {
        self.challenge_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new challenge store implementation and leave degraded mode.
    pub async fn install_challenge_store(&self, store: Arc<dyn ChallengeStore>) {
        {
            let mut guard = self.challenge_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current challenge store and enter degraded mode.
    pub async fn clear_challenge_store(&self) {
        {
            let mut guard = self.challenge_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }

    /// Registry of active challenge sessions keyed by challenge id.
    pub fn sessions(&self) -> &DashMap<Uuid, Arc<ChallengeSession>> {
        &self.sessions
    }
}
