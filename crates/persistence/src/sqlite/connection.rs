//! Database connection and initialization

use jobquest_core::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// Database wrapper for SQLite operations
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to database at the given path, creating if necessary
    pub async fn connect(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::DatabaseError(e.to_string()))?;
        }

        let path_str = path.to_string_lossy();
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path_str))
            .map_err(|e| Error::DatabaseError(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Connect to in-memory database (for testing)
    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                password TEXT NOT NULL,
                points INTEGER NOT NULL DEFAULT 0 CHECK (points >= 0),
                level INTEGER NOT NULL DEFAULT 1,
                profile_completion INTEGER NOT NULL DEFAULT 0,
                reviews_today INTEGER NOT NULL DEFAULT 0,
                last_review_date TEXT,
                created_at TIMESTAMP,
                UNIQUE(email)
            );

            CREATE TABLE IF NOT EXISTS streaks (
                account_id INTEGER PRIMARY KEY,
                current_streak INTEGER NOT NULL DEFAULT 0,
                best_streak INTEGER NOT NULL DEFAULT 0,
                last_login TIMESTAMP,
                streak_started_at TIMESTAMP,
                best_streak_at TIMESTAMP,
                total_days INTEGER NOT NULL DEFAULT 0,
                notifications_enabled INTEGER NOT NULL DEFAULT 0,
                notification_time TEXT NOT NULL DEFAULT '20:00',
                version INTEGER NOT NULL DEFAULT 0,
                CHECK (best_streak >= current_streak),
                FOREIGN KEY (account_id) REFERENCES accounts(id)
            );

            CREATE TABLE IF NOT EXISTS point_transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER NOT NULL,
                delta INTEGER NOT NULL,
                source TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL,
                FOREIGN KEY (account_id) REFERENCES accounts(id)
            );

            CREATE TABLE IF NOT EXISTS badges (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER NOT NULL,
                badge_type TEXT NOT NULL,
                description TEXT NOT NULL,
                icon TEXT NOT NULL,
                obtained INTEGER NOT NULL DEFAULT 0,
                obtained_at TIMESTAMP,
                notification_sent INTEGER NOT NULL DEFAULT 0,
                UNIQUE(account_id, badge_type),
                FOREIGN KEY (account_id) REFERENCES accounts(id)
            );

            CREATE TABLE IF NOT EXISTS job_applications (
                account_id INTEGER NOT NULL,
                job_id TEXT NOT NULL,
                applied_at TIMESTAMP NOT NULL,
                PRIMARY KEY (account_id, job_id),
                FOREIGN KEY (account_id) REFERENCES accounts(id)
            );

            CREATE TABLE IF NOT EXISTS profile_steps (
                account_id INTEGER NOT NULL,
                step TEXT NOT NULL,
                completed_at TIMESTAMP NOT NULL,
                PRIMARY KEY (account_id, step),
                FOREIGN KEY (account_id) REFERENCES accounts(id)
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_point_transactions_account ON point_transactions (account_id, created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
