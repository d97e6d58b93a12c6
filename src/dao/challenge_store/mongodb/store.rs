use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Client, Collection, Database, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoChallengeDocument, doc_id, uuid_as_binary},
};
use crate::dao::{
    challenge_store::ChallengeStore,
    models::{ChallengeEntity, ChallengeListItemEntity, QuizEntity},
    storage::StorageResult,
};

const CHALLENGE_COLLECTION_NAME: &str = "challenges";
const QUIZ_COLLECTION_NAME: &str = "quizzes";

/// Challenge store backed by a MongoDB database.
#[derive(Clone)]
pub struct MongoChallengeStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let client = {
            let guard = self.state.read().await;
            guard.client.clone()
        };

        client
            .database(&self.config.database_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoChallengeStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;
        let collection =
            database.collection::<mongodb::bson::Document>(CHALLENGE_COLLECTION_NAME);

        // List queries filter by either side of the match.
        for (index_name, key) in [
            ("challenge_creator_idx", "creator.user_id"),
            ("challenge_opponent_idx", "opponent.user_id"),
        ] {
            let index = mongodb::IndexModel::builder()
                .keys(doc! {key: 1})
                .options(
                    IndexOptions::builder()
                        .name(Some(index_name.to_owned()))
                        .build(),
                )
                .build();

            collection
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection: CHALLENGE_COLLECTION_NAME,
                    index: index_name,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn challenge_collection(&self) -> Collection<MongoChallengeDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoChallengeDocument>(CHALLENGE_COLLECTION_NAME)
    }

    async fn quiz_collection(&self) -> Collection<QuizEntity> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<QuizEntity>(QUIZ_COLLECTION_NAME)
    }

    async fn save_challenge(&self, challenge: ChallengeEntity) -> MongoResult<()> {
        let id = challenge.id;
        let document: MongoChallengeDocument = challenge.into();
        let collection = self.challenge_collection().await;
        collection
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveChallenge { id, source })?;

        Ok(())
    }

    async fn find_challenge(&self, id: Uuid) -> MongoResult<Option<ChallengeEntity>> {
        let collection = self.challenge_collection().await;

        let document = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadChallenge { id, source })?;

        Ok(document.map(Into::into))
    }

    async fn list_challenges_for_user(
        &self,
        user_id: Uuid,
    ) -> MongoResult<Vec<ChallengeListItemEntity>> {
        let collection = self.challenge_collection().await;
        let user = uuid_as_binary(user_id);

        let documents: Vec<MongoChallengeDocument> = collection
            .find(doc! {
                "$or": [
                    { "creator.user_id": user.clone() },
                    { "opponent.user_id": user },
                ]
            })
            .sort(doc! { "created_at": -1 })
            .await
            .map_err(|source| MongoDaoError::ListChallenges { user_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListChallenges { user_id, source })?;

        Ok(documents
            .into_iter()
            .map(|document| {
                let entity: ChallengeEntity = document.into();
                entity.into()
            })
            .collect())
    }

    async fn save_quiz(&self, quiz: QuizEntity) -> MongoResult<()> {
        let collection = self.quiz_collection().await;

        collection
            .replace_one(doc_id(quiz.id), &quiz)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveQuiz {
                id: quiz.id,
                source,
            })?;

        Ok(())
    }

    async fn find_quiz(&self, id: Uuid) -> MongoResult<Option<QuizEntity>> {
        let collection = self.quiz_collection().await;

        collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadQuiz { id, source })
    }
}

impl ChallengeStore for MongoChallengeStore {
    fn save_challenge(&self, challenge: ChallengeEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_challenge(challenge).await.map_err(Into::into) })
    }

    fn find_challenge(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ChallengeEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_challenge(id).await.map_err(Into::into) })
    }

    fn list_challenges_for_user(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ChallengeListItemEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_challenges_for_user(user_id)
                .await
                .map_err(Into::into)
        })
    }

    fn save_quiz(&self, quiz: QuizEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_quiz(quiz).await.map_err(Into::into) })
    }

    fn find_quiz(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_quiz(id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
