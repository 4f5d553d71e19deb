//! Streak record persistence
//!
//! Writes go through `update_streak_if_version`, a compare-and-set on the
//! `version` column, so two logins racing on the same account cannot both
//! apply their read-modify-write.

use chrono::{DateTime, Utc};
use jobquest_core::{Error, Result, StreakRecord};
use sqlx::SqlitePool;

#[derive(Debug, sqlx::FromRow)]
struct StreakRow {
    account_id: i64,
    current_streak: i64,
    best_streak: i64,
    last_login: Option<DateTime<Utc>>,
    streak_started_at: Option<DateTime<Utc>>,
    best_streak_at: Option<DateTime<Utc>>,
    total_days: i64,
    notifications_enabled: bool,
    notification_time: String,
    version: i64,
}

impl From<StreakRow> for StreakRecord {
    fn from(row: StreakRow) -> Self {
        StreakRecord {
            account_id: row.account_id,
            current_streak: row.current_streak.max(0) as u32,
            best_streak: row.best_streak.max(0) as u32,
            last_login: row.last_login,
            streak_started_at: row.streak_started_at,
            best_streak_at: row.best_streak_at,
            total_days: row.total_days.max(0) as u32,
            notifications_enabled: row.notifications_enabled,
            notification_time: row.notification_time,
            version: row.version,
        }
    }
}

pub async fn get_streak(pool: &SqlitePool, account_id: i64) -> Result<Option<StreakRecord>> {
    let row: Option<StreakRow> = sqlx::query_as(
        r#"
        SELECT account_id, current_streak, best_streak, last_login, streak_started_at,
               best_streak_at, total_days, notifications_enabled, notification_time, version
        FROM streaks
        WHERE account_id = ?
        "#,
    )
    .bind(account_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(row.map(StreakRecord::from))
}

/// Insert a fresh record. Returns false if one already existed.
pub async fn insert_streak(pool: &SqlitePool, record: &StreakRecord) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO streaks (account_id, current_streak, best_streak, last_login, streak_started_at,
                             best_streak_at, total_days, notifications_enabled, notification_time, version)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
        ON CONFLICT(account_id) DO NOTHING
        "#,
    )
    .bind(record.account_id)
    .bind(record.current_streak as i64)
    .bind(record.best_streak as i64)
    .bind(record.last_login)
    .bind(record.streak_started_at)
    .bind(record.best_streak_at)
    .bind(record.total_days as i64)
    .bind(record.notifications_enabled)
    .bind(&record.notification_time)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.rows_affected() == 1)
}

/// Overwrite the counters if nobody else wrote since `record.version` was read.
///
/// Returns false when the version moved on (another request won the race).
pub async fn update_streak_if_version(pool: &SqlitePool, record: &StreakRecord) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE streaks
        SET current_streak = ?,
            best_streak = ?,
            last_login = ?,
            streak_started_at = ?,
            best_streak_at = ?,
            total_days = ?,
            version = version + 1
        WHERE account_id = ? AND version = ?
        "#,
    )
    .bind(record.current_streak as i64)
    .bind(record.best_streak as i64)
    .bind(record.last_login)
    .bind(record.streak_started_at)
    .bind(record.best_streak_at)
    .bind(record.total_days as i64)
    .bind(record.account_id)
    .bind(record.version)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.rows_affected() == 1)
}

/// Save reminder preferences, creating an empty record if needed
pub async fn upsert_notification_prefs(
    pool: &SqlitePool,
    account_id: i64,
    enabled: bool,
    time: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO streaks (account_id, notifications_enabled, notification_time)
        VALUES (?, ?, ?)
        ON CONFLICT(account_id) DO UPDATE SET
            notifications_enabled = excluded.notifications_enabled,
            notification_time = excluded.notification_time,
            version = version + 1
        "#,
    )
    .bind(account_id)
    .bind(enabled)
    .bind(time)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::create_account;
    use crate::Database;
    use jobquest_core::NewAccount;

    async fn setup() -> (Database, i64) {
        let db = Database::connect_in_memory().await.unwrap();
        let id = create_account(
            db.pool(),
            &NewAccount {
                name: "Marco".into(),
                email: "marco@example.com".into(),
                password: "x".into(),
            },
        )
        .await
        .unwrap();
        (db, id)
    }

    #[tokio::test]
    async fn test_insert_is_first_writer_wins() {
        let (db, id) = setup().await;
        let mut record = StreakRecord::empty(id);
        record.current_streak = 1;
        record.best_streak = 1;

        assert!(insert_streak(db.pool(), &record).await.unwrap());
        assert!(!insert_streak(db.pool(), &record).await.unwrap());
    }

    #[tokio::test]
    async fn test_stale_version_is_rejected() {
        let (db, id) = setup().await;
        insert_streak(db.pool(), &StreakRecord::empty(id)).await.unwrap();

        let mut first = get_streak(db.pool(), id).await.unwrap().unwrap();
        let mut second = first.clone();

        first.current_streak = 1;
        first.best_streak = 1;
        assert!(update_streak_if_version(db.pool(), &first).await.unwrap());

        second.current_streak = 7;
        second.best_streak = 7;
        assert!(!update_streak_if_version(db.pool(), &second).await.unwrap());

        let stored = get_streak(db.pool(), id).await.unwrap().unwrap();
        assert_eq!(stored.current_streak, 1);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_notification_prefs_create_then_update() {
        let (db, id) = setup().await;
        upsert_notification_prefs(db.pool(), id, true, "08:15").await.unwrap();

        let stored = get_streak(db.pool(), id).await.unwrap().unwrap();
        assert!(stored.notifications_enabled);
        assert_eq!(stored.notification_time, "08:15");
        assert_eq!(stored.current_streak, 0);
        assert!(stored.last_login.is_none());

        upsert_notification_prefs(db.pool(), id, false, "21:00").await.unwrap();
        let stored = get_streak(db.pool(), id).await.unwrap().unwrap();
        assert!(!stored.notifications_enabled);
        assert_eq!(stored.notification_time, "21:00");
    }
}
