use thiserror::Error;
use uuid::Uuid;

/// Result alias for MongoDB DAO operations.
pub type MongoResult<T> = Result<T, MongoDaoError>;

/// Errors raised by the MongoDB challenge store.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The provided connection string could not be parsed.
    #[error("invalid MongoDB URI `{uri}`")]
    InvalidUri {
        /// The rejected connection string.
        uri: String,
        /// Driver-level parse error.
        #[source]
        source: mongodb::error::Error,
    },
    /// The driver client could not be constructed.
    #[error("failed to build MongoDB client")]
    ClientConstruction {
        /// Driver-level construction error.
        #[source]
        source: mongodb::error::Error,
    },
    /// Initial connectivity check never succeeded.
    #[error("initial MongoDB ping failed after {attempts} attempts")]
    InitialPing {
        /// How many pings were attempted before giving up.
        attempts: u32,
        /// Last ping error.
        #[source]
        source: mongodb::error::Error,
    },
    /// Index creation failed at startup.
    #[error("failed to ensure index `{index}` on `{collection}`")]
    EnsureIndex {
        /// Collection the index belongs to.
        collection: &'static str,
        /// Index description.
        index: &'static str,
        /// Driver-level error.
        #[source]
        source: mongodb::error::Error,
    },
    /// A challenge write was rejected.
    #[error("failed to save challenge `{id}`")]
    SaveChallenge {
        /// Challenge identifier.
        id: Uuid,
        /// Driver-level error.
        #[source]
        source: mongodb::error::Error,
    },
    /// A challenge read failed.
    #[error("failed to load challenge `{id}`")]
    LoadChallenge {
        /// Challenge identifier.
        id: Uuid,
        /// Driver-level error.
        #[source]
        source: mongodb::error::Error,
    },
    /// The per-user challenge listing failed.
    #[error("failed to list challenges for user `{user_id}`")]
    ListChallenges {
        /// User whose challenges were requested.
        user_id: Uuid,
        /// Driver-level error.
        #[source]
        source: mongodb::error::Error,
    },
    /// A quiz write was rejected.
    #[error("failed to save quiz `{id}`")]
    SaveQuiz {
        /// Quiz identifier.
        id: Uuid,
        /// Driver-level error.
        #[source]
        source: mongodb::error::Error,
    },
    /// A quiz read failed.
    #[error("failed to load quiz `{id}`")]
    LoadQuiz {
        /// Quiz identifier.
        id: Uuid,
        /// Driver-level error.
        #[source]
        source: mongodb::error::Error,
    },
    /// Liveness ping failed.
    #[error("MongoDB health ping failed")]
    HealthPing {
        /// Driver-level error.
        #[source]
        source: mongodb::error::Error,
    },
}
