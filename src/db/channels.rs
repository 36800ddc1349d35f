//! Channel repository: joined channels and the relay's level in each.

use super::DbError;
use crate::scheduler::PrivilegeLevel;
use sqlx::SqlitePool;
use tracing::warn;

/// A persisted channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRecord {
    pub name: String,
    pub user_id: Option<String>,
    pub level: PrivilegeLevel,
}

/// Repository for channel operations.
pub struct ChannelRepository<'a> {
    pool: &'a SqlitePool,
}

fn level_from_column(name: &str, value: i64) -> PrivilegeLevel {
    PrivilegeLevel::from_i64(value).unwrap_or_else(|| {
        warn!(channel = %name, bot_permission = value, "Unknown stored privilege level, using Write");
        PrivilegeLevel::Write
    })
}

impl<'a> ChannelRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Every persisted channel, ordered by name.
    pub async fn load_all(&self) -> Result<Vec<ChannelRecord>, DbError> {
        let rows = sqlx::query_as::<_, (String, Option<String>, i64)>(
            r#"
            SELECT name, user_id, bot_permission
            FROM channels
            ORDER BY name
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(name, user_id, level)| ChannelRecord {
                level: level_from_column(&name, level),
                name,
                user_id,
            })
            .collect())
    }

    pub async fn find_level(&self, name: &str) -> Result<Option<PrivilegeLevel>, DbError> {
        let row = sqlx::query_scalar::<_, i64>(
            "SELECT bot_permission FROM channels WHERE name = ? COLLATE NOCASE",
        )
        .bind(name)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|value| level_from_column(name, value)))
    }

    /// Update the stored level. Returns false if the channel has no record.
    pub async fn set_level(&self, name: &str, level: PrivilegeLevel) -> Result<bool, DbError> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            UPDATE channels
            SET bot_permission = ?, updated_at = ?
            WHERE name = ? COLLATE NOCASE
            "#,
        )
        .bind(level.as_i64())
        .bind(now)
        .bind(name)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Insert a channel, or overwrite its user id and level if present.
    pub async fn upsert(
        &self,
        name: &str,
        user_id: Option<&str>,
        level: PrivilegeLevel,
    ) -> Result<(), DbError> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO channels (name, user_id, bot_permission, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                user_id = excluded.user_id,
                bot_permission = excluded.bot_permission,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(name)
        .bind(user_id)
        .bind(level.as_i64())
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}
