//! Store abstraction over challenge and quiz persistence.

pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{ChallengeEntity, ChallengeListItemEntity, QuizEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the persistence layer for challenges and quiz content.
pub trait ChallengeStore: Send + Sync {
    /// Insert or replace a challenge record.
    fn save_challenge(&self, challenge: ChallengeEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Look up a challenge by id.
    fn find_challenge(&self, id: Uuid)
    -> BoxFuture<'static, StorageResult<Option<ChallengeEntity>>>;
    /// List every challenge the user is involved in, newest first.
    fn list_challenges_for_user(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ChallengeListItemEntity>>>;
    /// Insert or replace quiz content.
    fn save_quiz(&self, quiz: QuizEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Look up quiz content by id.
    fn find_quiz(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>>;
    /// Cheap liveness probe against the backend.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Attempt to re-establish a dropped backend connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
