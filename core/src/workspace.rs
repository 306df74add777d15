use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, QueryBuilder, Row, Sqlite, sqlite::SqliteRow};

use crate::{
    db::Database,
    ids::{UserId, WorkspaceId},
    workspace_member::{
        UserWorkspaceMembership, WorkspaceMemberRecord, WorkspaceMemberWithUser, WorkspaceRole,
    },
};

#[derive(Debug, Clone)]
pub struct WorkspaceRecord {
    pub id: WorkspaceId,
    pub name: String,
    pub slug: Option<String>,
    pub owner_id: UserId,
    pub avatar_url: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct CreateWorkspaceParams {
    pub id: WorkspaceId,
    pub name: String,
    pub slug: Option<String>,
    pub owner_id: UserId,
    pub avatar_url: Option<String>,
}

#[derive(Clone)]
pub struct WorkspaceStore {
    pool: Pool<Sqlite>,
}

impl WorkspaceStore {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool().clone(),
        }
    }

    /// Insert a workspace keyed by the provider-issued organization id.
    /// `owner_id` is not constrained against the users table: the owner's
    /// user event may not have arrived yet.
    pub async fn create(&self, params: CreateWorkspaceParams) -> Result<WorkspaceRecord> {
        let CreateWorkspaceParams {
            id,
            name,
            slug,
            owner_id,
            avatar_url,
        } = params;
        let now = Utc::now().timestamp();

        sqlx::query(
            "INSERT INTO workspaces (id, name, slug, owner_id, avatar_url, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&name)
        .bind(slug.as_deref())
        .bind(&owner_id)
        .bind(avatar_url.as_deref())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert workspace {id}"))?;

        Ok(WorkspaceRecord {
            id,
            name,
            slug,
            owner_id,
            avatar_url,
            created_at: now,
            updated_at: now,
        })
    }

    /// Update the mutable profile fields. Fields passed as `None` keep their
    /// stored value; ownership is never touched here. Returns false when no
    /// row with this id exists.
    pub async fn update_profile(
        &self,
        id: &WorkspaceId,
        name: Option<&str>,
        slug: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<bool> {
        let mut builder = QueryBuilder::new("UPDATE workspaces SET ");
        let mut has_updates = false;

        if let Some(name) = name {
            builder.push("name = ");
            builder.push_bind(name);
            has_updates = true;
        }
        if let Some(slug) = slug {
            if has_updates {
                builder.push(", ");
            }
            builder.push("slug = ");
            builder.push_bind(slug);
            has_updates = true;
        }
        if let Some(avatar_url) = avatar_url {
            if has_updates {
                builder.push(", ");
            }
            builder.push("avatar_url = ");
            builder.push_bind(avatar_url);
            has_updates = true;
        }

        if !has_updates {
            return Ok(self.find_by_id(id).await?.is_some());
        }

        builder.push(", updated_at = ");
        builder.push_bind(Utc::now().timestamp());
        builder.push(" WHERE id = ");
        builder.push_bind(id);

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_id(&self, id: &WorkspaceId) -> Result<Option<WorkspaceRecord>> {
        let row = sqlx::query(
            "SELECT id, name, slug, owner_id, avatar_url, created_at, updated_at \
             FROM workspaces WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Self::map_workspace_row))
    }

    /// Delete the workspace row. Member rows cascade via the foreign key.
    pub async fn delete(&self, id: &WorkspaceId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM workspaces WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete workspace {id}"))?;

        Ok(result.rows_affected() > 0)
    }

    /// Insert a member row. Hits the composite primary key on redelivery and
    /// the foreign keys when the user or workspace mirror row is missing;
    /// the caller classifies those failures.
    pub async fn create_member(
        &self,
        workspace_id: &WorkspaceId,
        user_id: &UserId,
        role: WorkspaceRole,
        message: Option<&str>,
    ) -> Result<WorkspaceMemberRecord> {
        let now = Utc::now().timestamp();

        sqlx::query(
            "INSERT INTO workspace_members (workspace_id, user_id, role, message, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(workspace_id)
        .bind(user_id)
        .bind(role)
        .bind(message)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert member {user_id} into {workspace_id}"))?;

        Ok(WorkspaceMemberRecord {
            workspace_id: workspace_id.clone(),
            user_id: user_id.clone(),
            role,
            message: message.map(ToOwned::to_owned),
            created_at: now,
        })
    }

    pub async fn get_member(
        &self,
        workspace_id: &WorkspaceId,
        user_id: &UserId,
    ) -> Result<Option<WorkspaceMemberRecord>> {
        let row = sqlx::query(
            "SELECT workspace_id, user_id, role, message, created_at \
             FROM workspace_members WHERE workspace_id = ? AND user_id = ?",
        )
        .bind(workspace_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Self::map_member_row))
    }

    /// Update only the role of an existing member. Returns false when the
    /// member row does not exist.
    pub async fn set_member_role(
        &self,
        workspace_id: &WorkspaceId,
        user_id: &UserId,
        role: WorkspaceRole,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE workspace_members SET role = ? WHERE workspace_id = ? AND user_id = ?",
        )
        .bind(role)
        .bind(workspace_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn remove_member(
        &self,
        workspace_id: &WorkspaceId,
        user_id: &UserId,
    ) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM workspace_members WHERE workspace_id = ? AND user_id = ?")
                .bind(workspace_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_members_with_users(
        &self,
        workspace_id: &WorkspaceId,
    ) -> Result<Vec<WorkspaceMemberWithUser>> {
        let rows = sqlx::query(
            "SELECT m.workspace_id, m.user_id, m.role, m.message, \
                    u.email, u.name, u.username, u.avatar_url \
             FROM workspace_members m \
             JOIN users u ON u.id = m.user_id \
             WHERE m.workspace_id = ? \
             ORDER BY m.created_at ASC, m.user_id ASC",
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Self::map_member_with_user_row).collect())
    }

    pub async fn list_memberships_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<UserWorkspaceMembership>> {
        let rows = sqlx::query(
            "SELECT w.id AS workspace_id, w.name, w.slug, w.owner_id, w.avatar_url, m.role \
             FROM workspace_members m \
             JOIN workspaces w ON w.id = m.workspace_id \
             WHERE m.user_id = ? \
             ORDER BY w.created_at DESC, w.id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(UserWorkspaceMembership {
                    workspace_id: WorkspaceId::from(row.get::<String, _>("workspace_id")),
                    workspace_name: row.get("name"),
                    workspace_slug: row.get("slug"),
                    workspace_owner_id: UserId::from(row.get::<String, _>("owner_id")),
                    workspace_avatar_url: row.get("avatar_url"),
                    role: row.try_get("role")?,
                })
            })
            .collect()
    }

    fn map_workspace_row(row: SqliteRow) -> WorkspaceRecord {
        WorkspaceRecord {
            id: WorkspaceId::from(row.get::<String, _>("id")),
            name: row.get("name"),
            slug: row.get("slug"),
            owner_id: UserId::from(row.get::<String, _>("owner_id")),
            avatar_url: row.get("avatar_url"),
            created_at: row.get::<i64, _>("created_at"),
            updated_at: row.get::<i64, _>("updated_at"),
        }
    }

    fn map_member_row(row: SqliteRow) -> WorkspaceMemberRecord {
        WorkspaceMemberRecord {
            workspace_id: WorkspaceId::from(row.get::<String, _>("workspace_id")),
            user_id: UserId::from(row.get::<String, _>("user_id")),
            role: row.get("role"),
            message: row.get("message"),
            created_at: row.get::<i64, _>("created_at"),
        }
    }

    fn map_member_with_user_row(row: SqliteRow) -> WorkspaceMemberWithUser {
        WorkspaceMemberWithUser {
            workspace_id: WorkspaceId::from(row.get::<String, _>("workspace_id")),
            user_id: UserId::from(row.get::<String, _>("user_id")),
            role: row.get("role"),
            message: row.get("message"),
            email: row.get("email"),
            name: row.get("name"),
            username: row.get("username"),
            avatar_url: row.get("avatar_url"),
        }
    }
}
