//! Badge records
//!
//! `(account_id, badge_type)` is unique. The false -> true transition of
//! `obtained` is a single conditional update; its row count tells the caller
//! whether this call was the one that awarded it. The bonus credit shares
//! that update's transaction.

use chrono::{DateTime, Utc};
use jobquest_core::{BadgeDescriptor, BadgeRecord, Error, Result};
use sqlx::SqlitePool;

use super::accounts::add_points_in;

#[derive(Debug, sqlx::FromRow)]
struct BadgeRow {
    id: i64,
    account_id: i64,
    badge_type: String,
    description: String,
    icon: String,
    obtained: bool,
    obtained_at: Option<DateTime<Utc>>,
    notification_sent: bool,
}

impl From<BadgeRow> for BadgeRecord {
    fn from(row: BadgeRow) -> Self {
        BadgeRecord {
            id: row.id,
            account_id: row.account_id,
            badge_type: row.badge_type,
            description: row.description,
            icon: row.icon,
            obtained: row.obtained,
            obtained_at: row.obtained_at,
            notification_sent: row.notification_sent,
        }
    }
}

const BADGE_COLUMNS: &str =
    "id, account_id, badge_type, description, icon, obtained, obtained_at, notification_sent";

/// Create the unobtained placeholder if there is no row yet
pub async fn ensure_badge_row(
    pool: &SqlitePool,
    account_id: i64,
    descriptor: &BadgeDescriptor,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO badges (account_id, badge_type, description, icon)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(account_id, badge_type) DO NOTHING
        "#,
    )
    .bind(account_id)
    .bind(descriptor.badge_type.as_str())
    .bind(descriptor.description)
    .bind(descriptor.icon)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(())
}

/// Flip `obtained` and credit `bonus` in one transaction.
///
/// Returns the new point total for the call that performed the transition,
/// `None` when the badge was already obtained. If the credit fails the flip
/// is rolled back, so a badge is never held without its bonus.
pub async fn award_badge(
    pool: &SqlitePool,
    account_id: i64,
    badge_type: &str,
    bonus: i64,
    at: DateTime<Utc>,
) -> Result<Option<i64>> {
    if bonus <= 0 {
        return Err(Error::Validation(format!("badge bonus must be positive, got {}", bonus)));
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    let result = sqlx::query(
        r#"
        UPDATE badges
        SET obtained = 1, obtained_at = ?
        WHERE account_id = ? AND badge_type = ? AND obtained = 0
        "#,
    )
    .bind(at)
    .bind(account_id)
    .bind(badge_type)
    .execute(&mut *tx)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    if result.rows_affected() != 1 {
        return Ok(None);
    }

    let total = add_points_in(&mut *tx, account_id, bonus, "badge", at).await?;

    tx.commit()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(Some(total))
}

pub async fn get_badge(
    pool: &SqlitePool,
    account_id: i64,
    badge_type: &str,
) -> Result<Option<BadgeRecord>> {
    let row: Option<BadgeRow> = sqlx::query_as(&format!(
        "SELECT {} FROM badges WHERE account_id = ? AND badge_type = ?",
        BADGE_COLUMNS
    ))
    .bind(account_id)
    .bind(badge_type)
    .fetch_optional(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(row.map(BadgeRecord::from))
}

/// All badge rows (placeholders included) for an account
pub async fn list_badges(pool: &SqlitePool, account_id: i64) -> Result<Vec<BadgeRecord>> {
    let rows: Vec<BadgeRow> = sqlx::query_as(&format!(
        "SELECT {} FROM badges WHERE account_id = ? ORDER BY id",
        BADGE_COLUMNS
    ))
    .bind(account_id)
    .fetch_all(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(rows.into_iter().map(BadgeRecord::from).collect())
}

/// Obtained badges the client has not been told about yet
pub async fn list_unnotified_badges(pool: &SqlitePool, account_id: i64) -> Result<Vec<BadgeRecord>> {
    let rows: Vec<BadgeRow> = sqlx::query_as(&format!(
        "SELECT {} FROM badges WHERE account_id = ? AND obtained = 1 AND notification_sent = 0 ORDER BY obtained_at",
        BADGE_COLUMNS
    ))
    .bind(account_id)
    .fetch_all(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(rows.into_iter().map(BadgeRecord::from).collect())
}

/// Set `notification_sent`; returns true only for the call that flipped it
pub async fn mark_badge_notified(pool: &SqlitePool, badge_id: i64) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE badges SET notification_sent = 1 WHERE id = ? AND notification_sent = 0",
    )
    .bind(badge_id)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.rows_affected() == 1)
}

pub async fn count_badge_rows(pool: &SqlitePool, account_id: i64, badge_type: &str) -> Result<u32> {
    let count: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM badges WHERE account_id = ? AND badge_type = ?")
            .bind(account_id)
            .bind(badge_type)
            .fetch_one(pool)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(count.0 as u32)
}
