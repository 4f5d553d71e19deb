//! Key/value settings table holding JSON blobs

use jobquest_core::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::SqlitePool;

/// Load and deserialize a setting, `None` if the key is absent
pub async fn get_setting<T: DeserializeOwned>(pool: &SqlitePool, key: &str) -> Result<Option<T>> {
    let json = sqlx::query_scalar::<sqlx::Sqlite, String>("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    match json {
        Some(j) => Ok(Some(serde_json::from_str(&j)?)),
        None => Ok(None),
    }
}

/// Serialize and store a setting, replacing any previous value
pub async fn set_setting<T: Serialize>(pool: &SqlitePool, key: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;

    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(&json)
        .execute(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(())
}
