//! Account rows, point balance and the append-only point ledger

use chrono::{DateTime, NaiveDate, Utc};
use jobquest_core::{Account, Error, NewAccount, PointTransaction, Result};
use sqlx::{SqliteConnection, SqlitePool};

/// Database row for account
#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: i64,
    name: String,
    email: String,
    password: String,
    points: i64,
    level: i64,
    profile_completion: i64,
    reviews_today: i64,
    last_review_date: Option<NaiveDate>,
    created_at: Option<DateTime<Utc>>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: row.id,
            name: row.name,
            email: row.email,
            password: row.password,
            points: row.points,
            level: row.level.max(1) as u32,
            profile_completion: row.profile_completion.clamp(0, 100) as u8,
            reviews_today: row.reviews_today.max(0) as u32,
            last_review_date: row.last_review_date,
            created_at: row.created_at,
        }
    }
}

/// Ledger row
#[derive(Debug, sqlx::FromRow)]
struct PointTransactionRow {
    id: i64,
    account_id: i64,
    delta: i64,
    source: String,
    created_at: DateTime<Utc>,
}

impl From<PointTransactionRow> for PointTransaction {
    fn from(row: PointTransactionRow) -> Self {
        PointTransaction {
            id: row.id,
            account_id: row.account_id,
            delta: row.delta,
            source: row.source,
            created_at: row.created_at,
        }
    }
}

/// Create a new account with zero points at level 1
pub async fn create_account(pool: &SqlitePool, account: &NewAccount) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO accounts (name, email, password, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(account.name.trim())
    .bind(account.email.trim())
    .bind(&account.password)
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Error::Validation(format!("email '{}' is already registered", account.email))
        }
        other => Error::DatabaseError(other.to_string()),
    })?;

    Ok(result.last_insert_rowid())
}

/// Get a specific account by ID
pub async fn get_account(pool: &SqlitePool, id: i64) -> Result<Option<Account>> {
    let row: Option<AccountRow> = sqlx::query_as(
        r#"
        SELECT id, name, email, password, points, level, profile_completion,
               reviews_today, last_review_date, created_at
        FROM accounts
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(row.map(Account::from))
}

/// Like `get_account` but a missing row is an error
pub async fn require_account(pool: &SqlitePool, id: i64) -> Result<Account> {
    get_account(pool, id)
        .await?
        .ok_or(Error::AccountNotFound(id))
}

/// Add `delta` to the balance and append a ledger entry, atomically.
///
/// Returns the new total.
pub async fn add_points(
    pool: &SqlitePool,
    account_id: i64,
    delta: i64,
    source: &str,
    at: DateTime<Utc>,
) -> Result<i64> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    let total = add_points_in(&mut *tx, account_id, delta, source, at).await?;

    tx.commit()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(total)
}

/// Balance update plus ledger row on a connection the caller owns.
///
/// Callers run it inside their own transaction; an error leaves the
/// transaction to roll back when dropped.
pub(crate) async fn add_points_in(
    conn: &mut SqliteConnection,
    account_id: i64,
    delta: i64,
    source: &str,
    at: DateTime<Utc>,
) -> Result<i64> {
    let total: Option<(i64,)> =
        sqlx::query_as("UPDATE accounts SET points = points + ? WHERE id = ? RETURNING points")
            .bind(delta)
            .bind(account_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

    let Some((total,)) = total else {
        return Err(Error::AccountNotFound(account_id));
    };

    sqlx::query(
        r#"
        INSERT INTO point_transactions (account_id, delta, source, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(account_id)
    .bind(delta)
    .bind(source)
    .bind(at)
    .execute(&mut *conn)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(total)
}

/// Store `new_level` only if the row still holds `expected_level`.
///
/// Returns whether the row was changed.
pub async fn set_level_if(
    pool: &SqlitePool,
    account_id: i64,
    expected_level: u32,
    new_level: u32,
) -> Result<bool> {
    let result = sqlx::query("UPDATE accounts SET level = ? WHERE id = ? AND level = ?")
        .bind(new_level as i64)
        .bind(account_id)
        .bind(expected_level as i64)
        .execute(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.rows_affected() == 1)
}

/// Count one review for `today` unless the daily cap is reached.
///
/// The counter restarts at 1 on the first review of a new day. The check
/// and the increment are one statement, so concurrent reviews cannot
/// overshoot the cap. Returns the new count, or `None` when capped.
pub async fn try_count_review(
    pool: &SqlitePool,
    account_id: i64,
    today: NaiveDate,
    daily_cap: u32,
) -> Result<Option<u32>> {
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        UPDATE accounts
        SET reviews_today = CASE WHEN last_review_date = ? THEN reviews_today + 1 ELSE 1 END,
            last_review_date = ?
        WHERE id = ?
          AND (last_review_date IS NOT ? OR reviews_today < ?)
        RETURNING reviews_today
        "#,
    )
    .bind(today)
    .bind(today)
    .bind(account_id)
    .bind(today)
    .bind(daily_cap as i64)
    .fetch_optional(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(row.map(|(count,)| count as u32))
}

/// Update the profile completion percentage
pub async fn set_profile_completion(pool: &SqlitePool, account_id: i64, percent: u8) -> Result<()> {
    sqlx::query("UPDATE accounts SET profile_completion = ? WHERE id = ?")
        .bind(percent.min(100) as i64)
        .bind(account_id)
        .execute(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(())
}

/// Most recent ledger entries for an account
pub async fn list_point_transactions(
    pool: &SqlitePool,
    account_id: i64,
    limit: u32,
) -> Result<Vec<PointTransaction>> {
    let rows: Vec<PointTransactionRow> = sqlx::query_as(
        r#"
        SELECT id, account_id, delta, source, created_at
        FROM point_transactions
        WHERE account_id = ?
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(account_id)
    .bind(limit as i64)
    .fetch_all(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(rows.into_iter().map(PointTransaction::from).collect())
}

/// Sum of all ledger entries; equals the balance when nothing bypassed the ledger
pub async fn sum_point_transactions(pool: &SqlitePool, account_id: i64) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(delta), 0) FROM point_transactions WHERE account_id = ?",
    )
    .bind(account_id)
    .fetch_one(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(row.0)
}
