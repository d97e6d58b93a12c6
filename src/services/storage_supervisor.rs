//! Owns the challenge store connection and the degraded flag.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{challenge_store::ChallengeStore, storage::StorageError},
    state::SharedState,
};

/// Delay before the first retry; doubled up to [`MAX_RETRY_DELAY`].
const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);
/// Cap applied to the connect and reconnect backoff.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);
/// Interval between health probes while a store is installed.
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Reconnect attempts against a failing store before it is uninstalled.
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Supervise the challenge store for the lifetime of the process.
///
/// Runs `connect` with capped exponential backoff, installs the store on
/// success, then watches its health until the connection is lost beyond
/// recovery, at which point the store is uninstalled and the cycle starts
/// over. Every transition is mirrored into the degraded flag so the health
/// endpoint and the service layer stay truthful.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn ChallengeStore>, StorageError>> + Send,
{
    let mut retry_delay = INITIAL_RETRY_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_challenge_store(store.clone()).await;
                info!("challenge store connected");
                retry_delay = INITIAL_RETRY_DELAY;

                watch_store(&state, store.as_ref()).await;

                warn!("challenge store lost; uninstalling and reconnecting");
                state.clear_challenge_store().await;
            }
            Err(err) => {
                warn!(error = %err, "challenge store connection failed");
            }
        }

        sleep(retry_delay).await;
        retry_delay = (retry_delay * 2).min(MAX_RETRY_DELAY);
    }
}

/// Poll the installed store until it fails beyond recovery.
async fn watch_store(state: &SharedState, store: &dyn ChallengeStore) {
    loop {
        sleep(HEALTH_POLL_INTERVAL).await;

        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded() {
                    info!("challenge store healthy again; leaving degraded mode");
                    state.update_degraded(false);
                }
            }
            Err(err) => {
                warn!(error = %err, "challenge store health check failed; entering degraded mode");
                state.update_degraded(true);

                if !try_recover(store).await {
                    return;
                }
                info!("challenge store connection recovered");
                state.update_degraded(false);
            }
        }
    }
}

/// Bounded reconnect loop; true when the store answers again.
async fn try_recover(store: &dyn ChallengeStore) -> bool {
    let mut delay = INITIAL_RETRY_DELAY;

    for attempt in 1..=MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => return true,
            Err(err) => {
                warn!(attempt, error = %err, "challenge store reconnect attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_RETRY_DELAY);
            }
        }
    }

    false
}
