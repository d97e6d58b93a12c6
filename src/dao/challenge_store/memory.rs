//! In-memory [`ChallengeStore`] used for tests and database-less deployments.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    challenge_store::ChallengeStore,
    models::{ChallengeEntity, ChallengeListItemEntity, QuizEntity},
    storage::StorageResult,
};

/// Challenge store backed by process-local maps. Contents are lost on restart.
#[derive(Clone, Default)]
pub struct InMemoryChallengeStore {
    challenges: Arc<DashMap<Uuid, ChallengeEntity>>,
    quizzes: Arc<DashMap<Uuid, QuizEntity>>,
}

impl InMemoryChallengeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChallengeStore for InMemoryChallengeStore {
    fn save_challenge(&self, challenge: ChallengeEntity) -> BoxFuture<'static, StorageResult<()>> {
        let challenges = self.challenges.clone();
        Box::pin(async move {
            challenges.insert(challenge.id, challenge);
            Ok(())
        })
    }

    fn find_challenge(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ChallengeEntity>>> {
        let challenges = self.challenges.clone();
        Box::pin(async move { Ok(challenges.get(&id).map(|entry| entry.value().clone())) })
    }

    fn list_challenges_for_user(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ChallengeListItemEntity>>> {
        let challenges = self.challenges.clone();
        Box::pin(async move {
            let mut items: Vec<ChallengeListItemEntity> = challenges
                .iter()
                .filter(|entry| entry.value().involves(user_id))
                .map(|entry| entry.value().clone().into())
                .collect();
            items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(items)
        })
    }

    fn save_quiz(&self, quiz: QuizEntity) -> BoxFuture<'static, StorageResult<()>> {
        let quizzes = self.quizzes.clone();
        Box::pin(async move {
            quizzes.insert(quiz.id, quiz);
            Ok(())
        })
    }

    fn find_quiz(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>> {
        let quizzes = self.quizzes.clone();
        Box::pin(async move { Ok(quizzes.get(&id).map(|entry| entry.value().clone())) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
