use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

/// Default database name when `MONGO_DB` is not set.
const DEFAULT_DATABASE: &str = "quiz_duel";
/// Default connection string when `MONGO_URI` is not set.
const DEFAULT_URI: &str = "mongodb://localhost:27017";

/// Parsed MongoDB connection settings.
#[derive(Clone)]
pub struct MongoConfig {
    /// Driver client options parsed from the connection string.
    pub options: ClientOptions,
    /// Database holding the challenge and quiz collections.
    pub database_name: String,
}

impl MongoConfig {
    /// Parse a connection string into a config, with an optional database override.
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let database_name = db_name.unwrap_or(DEFAULT_DATABASE).to_owned();
        let options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;

        Ok(Self {
            options,
            database_name,
        })
    }

    /// Build a config from `MONGO_URI`/`MONGO_DB`, defaulting to a local instance.
    pub async fn from_env_or_default() -> MongoResult<Self> {
        let uri = std::env::var("MONGO_URI").unwrap_or_else(|_| DEFAULT_URI.to_owned());
        let db = std::env::var("MONGO_DB").ok();
        Self::from_uri(&uri, db.as_deref()).await
    }
}
