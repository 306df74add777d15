use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::{db::Database, ids::UserId};

/// Mirrored profile fields for a user. Every identity-provider event carries
/// the full profile, so writes overwrite all mirrored fields at once.
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    pub email: Option<String>,
    pub name: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: UserId,
    pub email: Option<String>,
    pub name: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Clone)]
pub struct UserStore {
    pool: Pool<Sqlite>,
}

impl UserStore {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool().clone(),
        }
    }

    /// Insert a user row keyed by the provider-issued id. A redelivered
    /// event hits the primary-key constraint; the caller decides whether
    /// that is benign.
    pub async fn create(&self, id: &UserId, profile: &UserProfile) -> Result<UserRecord> {
        let now = Utc::now().timestamp();

        sqlx::query(
            "INSERT INTO users (id, email, name, username, avatar_url, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(profile.email.as_deref())
        .bind(profile.name.as_deref())
        .bind(profile.username.as_deref())
        .bind(profile.avatar_url.as_deref())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert user {id}"))?;

        Ok(UserRecord {
            id: id.clone(),
            email: profile.email.clone(),
            name: profile.name.clone(),
            username: profile.username.clone(),
            avatar_url: profile.avatar_url.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Overwrite the mirrored profile fields. Returns false when no row with
    /// this id exists.
    pub async fn update(&self, id: &UserId, profile: &UserProfile) -> Result<bool> {
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            "UPDATE users SET email = ?, name = ?, username = ?, avatar_url = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(profile.email.as_deref())
        .bind(profile.name.as_deref())
        .bind(profile.username.as_deref())
        .bind(profile.avatar_url.as_deref())
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to update user {id}"))?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove the row. Membership rows cascade at the store level; owned
    /// workspaces keep their (now dangling) owner reference.
    pub async fn delete(&self, id: &UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete user {id}"))?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>> {
        let row = sqlx::query(
            "SELECT id, email, name, username, avatar_url, created_at, updated_at \
             FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Self::map_row))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query(
            "SELECT id, email, name, username, avatar_url, created_at, updated_at \
             FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Self::map_row))
    }

    fn map_row(row: SqliteRow) -> UserRecord {
        UserRecord {
            id: UserId::from(row.get::<String, _>("id")),
            email: row.get::<Option<String>, _>("email"),
            name: row.get::<Option<String>, _>("name"),
            username: row.get::<Option<String>, _>("username"),
            avatar_url: row.get::<Option<String>, _>("avatar_url"),
            created_at: row.get::<i64, _>("created_at"),
            updated_at: row.get::<i64, _>("updated_at"),
        }
    }
}
