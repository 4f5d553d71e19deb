//! Job applications and completed profile steps
//!
//! Both tables key on (account, item) so a repeated submission is a no-op
//! and the reward tied to it is granted once.

use chrono::{DateTime, Utc};
use jobquest_core::{Error, Result};
use sqlx::SqlitePool;

/// Record an application; returns false if it was already recorded
pub async fn insert_job_application(
    pool: &SqlitePool,
    account_id: i64,
    job_id: &str,
    at: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO job_applications (account_id, job_id, applied_at)
        VALUES (?, ?, ?)
        ON CONFLICT(account_id, job_id) DO NOTHING
        "#,
    )
    .bind(account_id)
    .bind(job_id)
    .bind(at)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.rows_affected() == 1)
}

/// Record a completed profile step; returns false if already completed
pub async fn insert_profile_step(
    pool: &SqlitePool,
    account_id: i64,
    step: &str,
    at: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO profile_steps (account_id, step, completed_at)
        VALUES (?, ?, ?)
        ON CONFLICT(account_id, step) DO NOTHING
        "#,
    )
    .bind(account_id)
    .bind(step)
    .bind(at)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.rows_affected() == 1)
}

pub async fn list_profile_steps(pool: &SqlitePool, account_id: i64) -> Result<Vec<String>> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT step FROM profile_steps WHERE account_id = ? ORDER BY completed_at")
            .bind(account_id)
            .fetch_all(pool)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(rows.into_iter().map(|r| r.0).collect())
}
