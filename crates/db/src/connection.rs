use std::str::FromStr;
use std::time::Duration;

use festa_core::config::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::debug;

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30).await
}

pub async fn connect_with_config(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    debug!(
        event_name = "db.connect",
        max_connections,
        timeout_secs,
        "opening sqlite pool"
    );
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                // Reservation, review and delivery rows reference their parents.
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect_with(options)
        .await
}

#[cfg(test)]
mod tests {
    use festa_core::config::DatabaseConfig;

    use super::{connect, connect_with_config};
    use crate::migrations::run_pending;

    #[tokio::test]
    async fn plain_file_url_creates_the_database() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("fresh.db");
        assert!(!path.exists());

        let pool = connect(&format!("sqlite://{}", path.display())).await.expect("connect");
        run_pending(&pool).await.expect("migrations");
        pool.close().await;

        assert!(path.exists());
    }

    #[tokio::test]
    async fn file_database_keeps_schema_across_reconnects() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", dir.path().join("festa.db").display()),
            max_connections: 2,
            timeout_secs: 5,
        };

        let pool = connect_with_config(&config).await.expect("first connect");
        run_pending(&pool).await.expect("migrations");
        pool.close().await;

        let pool = connect_with_config(&config).await.expect("second connect");
        let foreign_keys: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .expect("pragma");
        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'reservation'",
        )
        .fetch_one(&pool)
        .await
        .expect("schema query");

        assert_eq!(foreign_keys, 1);
        assert_eq!(tables, 1);
        pool.close().await;
    }
}
