use std::time::Duration;

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tokio::time::sleep;

use super::error::{MongoDaoError, MongoResult};

/// Pings issued before the connection attempt is abandoned.
const PING_ATTEMPTS: u32 = 10;
/// Delay after the first failed ping; doubled up to [`PING_MAX_DELAY`].
const PING_INITIAL_DELAY: Duration = Duration::from_millis(250);
/// Cap applied to the ping backoff.
const PING_MAX_DELAY: Duration = Duration::from_secs(5);

/// Open a client and verify connectivity with a bounded ping loop.
pub async fn establish_connection(
    options: &ClientOptions,
    database_name: &str,
) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(database_name);

    let mut attempt = 0;
    let mut delay = PING_INITIAL_DELAY;

    loop {
        attempt += 1;
        match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => return Ok((client, database)),
            Err(source) if attempt >= PING_ATTEMPTS => {
                return Err(MongoDaoError::InitialPing {
                    attempts: attempt,
                    source,
                });
            }
            Err(_) => {
                sleep(delay).await;
                delay = (delay * 2).min(PING_MAX_DELAY);
            }
        }
    }
}
