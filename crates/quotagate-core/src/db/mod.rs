//! Database module - SQLx with SQLite
//!
//! The database file is the shared atomic counter store: every process that
//! opens the same file observes and mutates the same quota records.

use crate::error::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::time::Duration;

/// How long a writer waits on a locked database before giving up
const BUSY_TIMEOUT_SECS: u64 = 10;

/// Database state
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    /// Create a new database connection with a specific path
    pub async fn open(db_path: PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        log::info!("Connecting to database: {}", db_path.display());

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        log::info!("Running database migrations...");

        // One row per provider; rows are created lazily and never deleted.
        // `last_debit` is written by the consume statement itself so the
        // pre-debit balance and the grant decision come back from the same
        // atomic UPDATE.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS quota_records (
                provider TEXT PRIMARY KEY,
                limit_credits INTEGER NOT NULL,
                remaining INTEGER NOT NULL CHECK (remaining >= 0),
                window_type TEXT NOT NULL,
                reset_at_ms INTEGER NOT NULL,
                last_debit INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        log::info!("Database migrations completed");
        Ok(())
    }
}

/// Get the database path
pub fn get_db_path() -> Result<PathBuf> {
    // Check for environment variable override
    if let Ok(path) = std::env::var("QUOTAGATE_DB_PATH") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).into_owned()));
    }

    // Default: use app data directory
    let dirs = directories::ProjectDirs::from("com", "quotagate", "Quotagate")
        .ok_or_else(|| Error::config("Could not determine project directories"))?;

    Ok(dirs.data_dir().join("quotagate.db"))
}

/// Serializes tests that touch process environment variables
#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_db_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        std::env::remove_var("QUOTAGATE_DB_PATH");
        let path = get_db_path().unwrap();
        assert!(path.to_string_lossy().contains("quotagate.db"));
    }

    #[test]
    fn test_get_db_path_env_override() {
        let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let test_path = "/tmp/test_quotagate.db";
        std::env::set_var("QUOTAGATE_DB_PATH", test_path);
        let path = get_db_path().unwrap();
        assert_eq!(path.to_string_lossy(), test_path);
        std::env::remove_var("QUOTAGATE_DB_PATH");
    }

    #[tokio::test]
    async fn test_open_creates_schema() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = Database::open(dir.path().join("nested").join("q.db"))
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quota_records")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_migrations_are_repeatable() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("q.db");
        Database::open(path.clone()).await.unwrap();
        assert!(Database::open(path).await.is_ok());
    }
}
