use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::{Database, Decode, Encode, Type};

use crate::ids::{UserId, WorkspaceId};

/// Closed role enumeration for workspace membership. Anything the identity
/// provider sends is normalized through [`WorkspaceRole::parse`] before it
/// reaches the store; unrecognized values never persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkspaceRole {
    Admin,
    Member,
}

impl WorkspaceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Member => "MEMBER",
        }
    }

    /// Normalize a provider-sent role string. Trims whitespace, strips the
    /// provider's optional `org:` prefix, and matches case-insensitively.
    /// Returns `None` for anything outside the closed set.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let stripped = trimmed
            .strip_prefix("org:")
            .or_else(|| trimmed.strip_prefix("ORG:"))
            .unwrap_or(trimmed);

        if stripped.eq_ignore_ascii_case("admin") {
            Some(Self::Admin)
        } else if stripped.eq_ignore_ascii_case("member") {
            Some(Self::Member)
        } else {
            None
        }
    }
}

impl fmt::Display for WorkspaceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<DB> Type<DB> for WorkspaceRole
where
    DB: Database,
    String: Type<DB>,
{
    fn type_info() -> DB::TypeInfo {
        <String as Type<DB>>::type_info()
    }

    fn compatible(ty: &DB::TypeInfo) -> bool {
        <String as Type<DB>>::compatible(ty)
    }
}

impl<'q, DB> Encode<'q, DB> for WorkspaceRole
where
    DB: Database,
    String: Encode<'q, DB>,
{
    fn encode_by_ref(
        &self,
        buf: &mut <DB as Database>::ArgumentBuffer<'q>,
    ) -> std::result::Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        self.as_str().to_owned().encode_by_ref(buf)
    }
}

impl<'r, DB> Decode<'r, DB> for WorkspaceRole
where
    DB: Database,
    String: Decode<'r, DB>,
{
    fn decode(
        value: <DB as Database>::ValueRef<'r>,
    ) -> std::result::Result<Self, sqlx::error::BoxDynError> {
        let inner = <String as Decode<DB>>::decode(value)?;
        Self::parse(&inner).ok_or_else(|| format!("invalid workspace role: {inner}").into())
    }
}

#[derive(Debug, Clone)]
pub struct WorkspaceMemberRecord {
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    pub role: WorkspaceRole,
    pub message: Option<String>,
    pub created_at: i64,
}

/// Member row joined with the user's mirrored profile, as returned by the
/// workspace listing endpoint.
#[derive(Debug, Clone)]
pub struct WorkspaceMemberWithUser {
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    pub role: WorkspaceRole,
    pub message: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UserWorkspaceMembership {
    pub workspace_id: WorkspaceId,
    pub workspace_name: String,
    pub workspace_slug: Option<String>,
    pub workspace_owner_id: UserId,
    pub workspace_avatar_url: Option<String>,
    pub role: WorkspaceRole,
}
