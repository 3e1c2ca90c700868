//! Refresh token storage.
//!
//! Exactly one refresh token is live per subject. Sign-in overwrites it,
//! reissue rotates it with a conditional update, logout deletes it.

use sqlx::sqlite::SqlitePool;

/// The refresh token currently bound to a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub subject: String,
    pub value: String,
    /// Unix timestamp, used only for cleanup
    pub expires_at: u64,
}

/// SQLite integers are signed; timestamps past `i64::MAX` are stored as `i64::MAX`.
fn to_sql_timestamp(ts: u64) -> i64 {
    i64::try_from(ts).unwrap_or(i64::MAX)
}

/// Store for managing refresh tokens.
#[derive(Clone)]
pub struct RefreshTokenStore {
    pool: SqlitePool,
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the refresh token bound to a subject.
    pub async fn get(&self, subject: &str) -> Result<Option<RefreshTokenRecord>, sqlx::Error> {
        let row: Option<(String, String, i64)> = sqlx::query_as(
            "SELECT subject, value, expires_at FROM refresh_tokens WHERE subject = ?",
        )
        .bind(subject)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(subject, value, expires_at)| RefreshTokenRecord {
            subject,
            value,
            expires_at: u64::try_from(expires_at).unwrap_or(0),
        }))
    }

    /// Insert or replace the refresh token for a subject.
    pub async fn put(&self, record: &RefreshTokenRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO refresh_tokens (subject, value, expires_at) VALUES (?, ?, ?)
             ON CONFLICT(subject) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at,
                updated_at = datetime('now')",
        )
        .bind(&record.subject)
        .bind(&record.value)
        .bind(to_sql_timestamp(record.expires_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Replace `expected` with `new_value` for `subject` in a single statement.
    ///
    /// Returns false if the stored value is no longer `expected` (or the
    /// record is gone), in which case nothing is written.
    pub async fn compare_and_rotate(
        &self,
        subject: &str,
        expected: &str,
        new_value: &str,
        new_expires_at: u64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET value = ?, expires_at = ?, updated_at = datetime('now')
             WHERE subject = ? AND value = ?",
        )
        .bind(new_value)
        .bind(to_sql_timestamp(new_expires_at))
        .bind(subject)
        .bind(expected)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Delete the refresh token for a subject (logout).
    pub async fn delete(&self, subject: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE subject = ?")
            .bind(subject)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete all records whose expiry is at or before `now`.
    pub async fn delete_expired(&self, now: u64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= ?")
            .bind(to_sql_timestamp(now))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
