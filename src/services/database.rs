//! Connecting to the destination store
//!
//! At startup the database may still be booting (container ordering), so the first
//! connection is retried a fixed number of times with a fixed delay.

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tracing::{info, warn};

use crate::config::{DatabaseConfig, RetryConfig};
use crate::error::PipelineError;

/// Upper bound for a single attempt; the pool would otherwise keep retrying internally
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect and ping, retrying per `retry`. Exhaustion is a `Connectivity` error.
pub async fn connect_with_retry(
    database: &DatabaseConfig,
    retry: &RetryConfig,
) -> Result<DatabaseConnection, PipelineError> {
    let mut last_error = String::new();

    for attempt in 1..=retry.attempts {
        match try_connect(database).await {
            Ok(db) => {
                info!(db = %database.redacted(), attempt, "Database available");
                return Ok(db);
            }
            Err(e) => {
                last_error = e.to_string();
                warn!(
                    db = %database.redacted(),
                    attempt,
                    max_attempts = retry.attempts,
                    error = %e,
                    "Waiting for database..."
                );
                if attempt < retry.attempts {
                    tokio::time::sleep(retry.delay).await;
                }
            }
        }
    }

    Err(PipelineError::Connectivity {
        attempts: retry.attempts,
        message: last_error,
    })
}

async fn try_connect(database: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database.url());
    options
        .connect_timeout(ATTEMPT_TIMEOUT)
        .acquire_timeout(ATTEMPT_TIMEOUT)
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    db.ping().await?;
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_gives_up_after_configured_attempts() {
        // An unsupported scheme fails every attempt without touching the network
        let database = DatabaseConfig {
            host: "db".to_string(),
            port: 5432,
            user: "appuser".to_string(),
            password: "apppass".to_string(),
            name: "appdb".to_string(),
            url_override: Some("nosuchdb://localhost/appdb".to_string()),
        };
        let retry = RetryConfig {
            attempts: 2,
            delay: Duration::from_millis(10),
        };

        match connect_with_retry(&database, &retry).await {
            Err(PipelineError::Connectivity { attempts, message }) => {
                assert_eq!(attempts, 2);
                assert!(!message.is_empty());
            }
            other => panic!("expected connectivity error, got {:?}", other.map(|_| ())),
        }
    }
}
