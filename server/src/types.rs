// Request and response types for REST API handlers

use serde::{Deserialize, Serialize};

use huddle_core::{
    user::UserRecord,
    workspace_member::{WorkspaceMemberRecord, WorkspaceMemberWithUser, WorkspaceRole},
};

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddMemberRequest {
    pub(crate) email: String,
    pub(crate) role: String,
    pub(crate) workspace_id: String,
    #[serde(default)]
    pub(crate) message: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserPayload {
    pub(crate) id: String,
    pub(crate) email: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) username: Option<String>,
    pub(crate) avatar_url: Option<String>,
}

impl From<UserRecord> for UserPayload {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id.into_inner(),
            email: record.email,
            name: record.name,
            username: record.username,
            avatar_url: record.avatar_url,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MemberPayload {
    pub(crate) user_id: String,
    pub(crate) workspace_id: String,
    pub(crate) role: WorkspaceRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) user: Option<UserPayload>,
}

impl From<WorkspaceMemberRecord> for MemberPayload {
    fn from(record: WorkspaceMemberRecord) -> Self {
        Self {
            user_id: record.user_id.into_inner(),
            workspace_id: record.workspace_id.into_inner(),
            role: record.role,
            message: record.message,
            user: None,
        }
    }
}

impl From<WorkspaceMemberWithUser> for MemberPayload {
    fn from(record: WorkspaceMemberWithUser) -> Self {
        let user = UserPayload {
            id: record.user_id.as_str().to_owned(),
            email: record.email,
            name: record.name,
            username: record.username,
            avatar_url: record.avatar_url,
        };

        Self {
            user_id: record.user_id.into_inner(),
            workspace_id: record.workspace_id.into_inner(),
            role: record.role,
            message: record.message,
            user: Some(user),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WorkspacePayload {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) slug: Option<String>,
    pub(crate) avatar_url: Option<String>,
    pub(crate) role: WorkspaceRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) owner: Option<UserPayload>,
    pub(crate) members: Vec<MemberPayload>,
}

#[derive(Serialize)]
pub(crate) struct WorkspacesResponse {
    pub(crate) workspaces: Vec<WorkspacePayload>,
}

#[derive(Serialize)]
pub(crate) struct AddMemberResponse {
    pub(crate) member: MemberPayload,
    pub(crate) message: &'static str,
}
