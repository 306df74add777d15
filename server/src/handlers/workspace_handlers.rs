// Workspace listing and member management handlers

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

use huddle_core::{
    ids::{UserId, WorkspaceId},
    workspace_member::WorkspaceRole,
};

use crate::{
    auth::AuthenticatedUser,
    error::AppError,
    state::AppState,
    types::{AddMemberRequest, AddMemberResponse, MemberPayload, WorkspacePayload, WorkspacesResponse},
};

pub(crate) async fn list_workspaces_handler(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let memberships = state
        .workspace_store
        .list_memberships_for_user(&user.id)
        .await
        .map_err(AppError::from_anyhow)?;

    let mut workspaces = Vec::with_capacity(memberships.len());
    for membership in memberships {
        let members = state
            .workspace_store
            .list_members_with_users(&membership.workspace_id)
            .await
            .map_err(AppError::from_anyhow)?;

        let owner = state
            .user_store
            .find_by_id(&membership.workspace_owner_id)
            .await
            .map_err(AppError::from_anyhow)?
            .map(Into::into);

        workspaces.push(WorkspacePayload {
            id: membership.workspace_id.into_inner(),
            name: membership.workspace_name,
            slug: membership.workspace_slug,
            avatar_url: membership.workspace_avatar_url,
            role: membership.role,
            owner,
            members: members.into_iter().map(MemberPayload::from).collect(),
        });
    }

    Ok(Json(WorkspacesResponse { workspaces }))
}

pub(crate) async fn add_member_handler(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Json(payload): Json<AddMemberRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.email.trim().is_empty() || payload.workspace_id.trim().is_empty() {
        return Err(AppError::bad_request("email or workspaceId missing"));
    }

    let role =
        WorkspaceRole::parse(&payload.role).ok_or_else(|| AppError::invalid_role(&payload.role))?;

    let target = state
        .user_store
        .find_by_email(payload.email.trim())
        .await
        .map_err(AppError::from_anyhow)?
        .ok_or_else(|| AppError::user_not_found(payload.email.trim()))?;

    let workspace_id = WorkspaceId::from(payload.workspace_id.trim());
    let workspace = state
        .workspace_store
        .find_by_id(&workspace_id)
        .await
        .map_err(AppError::from_anyhow)?
        .ok_or_else(|| AppError::workspace_not_found(&workspace_id))?;

    ensure_caller_is_admin(&state, &workspace.id, &caller.id).await?;

    if state
        .workspace_store
        .get_member(&workspace.id, &target.id)
        .await
        .map_err(AppError::from_anyhow)?
        .is_some()
    {
        return Err(AppError::member_already_exists(&workspace.id, &target.id));
    }

    let member = state
        .workspace_store
        .create_member(&workspace.id, &target.id, role, payload.message.as_deref())
        .await
        .map_err(AppError::from_anyhow)?;

    let response = AddMemberResponse {
        member: member.into(),
        message: "Member added successfully",
    };

    Ok((StatusCode::CREATED, Json(response)))
}

async fn ensure_caller_is_admin(
    state: &AppState,
    workspace_id: &WorkspaceId,
    caller_id: &UserId,
) -> Result<(), AppError> {
    let membership = state
        .workspace_store
        .get_member(workspace_id, caller_id)
        .await
        .map_err(AppError::from_anyhow)?;

    match membership {
        Some(member) if member.role == WorkspaceRole::Admin => Ok(()),
        _ => Err(AppError::forbidden("Only admins can add members")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::response::IntoResponse;

    use crate::test_support::{seed_member, seed_user, seed_workspace, setup_state};

    fn add_member_request(email: &str, role: &str, workspace_id: &str) -> AddMemberRequest {
        AddMemberRequest {
            email: email.to_owned(),
            role: role.to_owned(),
            workspace_id: workspace_id.to_owned(),
            message: Some("welcome aboard".to_owned()),
        }
    }

    #[tokio::test]
    async fn add_member_inserts_row_for_admin_caller() {
        let (_temp_dir, _database, state) = setup_state().await;

        let owner = seed_user(&state, "u1", Some("owner@example.com")).await;
        let target = seed_user(&state, "u2", Some("new@example.com")).await;
        let workspace = seed_workspace(&state, "w1", &owner).await;
        seed_member(&state, &workspace, &owner, WorkspaceRole::Admin).await;

        let response = add_member_handler(
            State(state.clone()),
            AuthenticatedUser(owner),
            Json(add_member_request("new@example.com", "member", "w1")),
        )
        .await
        .expect("member added")
        .into_response();

        assert_eq!(response.status(), StatusCode::CREATED);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["member"]["userId"], "u2");
        assert_eq!(json["member"]["role"], "MEMBER");
        assert_eq!(json["message"], "Member added successfully");

        let stored = state
            .workspace_store
            .get_member(&workspace, &target.id)
            .await
            .unwrap()
            .expect("row inserted");
        assert_eq!(stored.message.as_deref(), Some("welcome aboard"));
    }

    #[tokio::test]
    async fn add_member_rejects_non_admin_caller() {
        let (_temp_dir, _database, state) = setup_state().await;

        let owner = seed_user(&state, "u1", Some("owner@example.com")).await;
        let plain = seed_user(&state, "u2", Some("plain@example.com")).await;
        let _target = seed_user(&state, "u3", Some("new@example.com")).await;
        let workspace = seed_workspace(&state, "w1", &owner).await;
        seed_member(&state, &workspace, &owner, WorkspaceRole::Admin).await;
        seed_member(&state, &workspace, &plain, WorkspaceRole::Member).await;

        let err = add_member_handler(
            State(state),
            AuthenticatedUser(plain),
            Json(add_member_request("new@example.com", "member", "w1")),
        )
        .await
        .err()
        .expect("non-admin is rejected");

        let (status, _) = err.into_payload();
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn add_member_rejects_duplicates_and_unknown_users() {
        let (_temp_dir, _database, state) = setup_state().await;

        let owner = seed_user(&state, "u1", Some("owner@example.com")).await;
        let workspace = seed_workspace(&state, "w1", &owner).await;
        seed_member(&state, &workspace, &owner, WorkspaceRole::Admin).await;

        let err = add_member_handler(
            State(state.clone()),
            AuthenticatedUser(owner.clone()),
            Json(add_member_request("owner@example.com", "member", "w1")),
        )
        .await
        .err()
        .expect("existing member is rejected");
        let (status, payload) = err.into_payload();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(payload.name, "MEMBER_ALREADY_EXISTS");

        let err = add_member_handler(
            State(state),
            AuthenticatedUser(owner),
            Json(add_member_request("ghost@example.com", "member", "w1")),
        )
        .await
        .err()
        .expect("unknown email is rejected");
        let (status, payload) = err.into_payload();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(payload.name, "USER_NOT_FOUND");
    }

    #[tokio::test]
    async fn add_member_rejects_roles_outside_the_enumeration() {
        let (_temp_dir, _database, state) = setup_state().await;

        let owner = seed_user(&state, "u1", Some("owner@example.com")).await;
        let _target = seed_user(&state, "u2", Some("new@example.com")).await;
        let workspace = seed_workspace(&state, "w1", &owner).await;
        seed_member(&state, &workspace, &owner, WorkspaceRole::Admin).await;

        let err = add_member_handler(
            State(state),
            AuthenticatedUser(owner),
            Json(add_member_request("new@example.com", "owner", "w1")),
        )
        .await
        .err()
        .expect("invalid role is rejected");
        let (status, payload) = err.into_payload();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload.name, "INVALID_ROLE");
    }

    #[tokio::test]
    async fn list_workspaces_returns_memberships_with_members_and_owner() {
        let (_temp_dir, _database, state) = setup_state().await;

        let owner = seed_user(&state, "u1", Some("owner@example.com")).await;
        let member = seed_user(&state, "u2", Some("member@example.com")).await;
        let workspace = seed_workspace(&state, "w1", &owner).await;
        seed_member(&state, &workspace, &owner, WorkspaceRole::Admin).await;
        seed_member(&state, &workspace, &member, WorkspaceRole::Member).await;

        let response = list_workspaces_handler(State(state), AuthenticatedUser(member))
            .await
            .expect("listing succeeds")
            .into_response();

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let workspaces = json["workspaces"].as_array().expect("workspaces array");
        assert_eq!(workspaces.len(), 1);
        assert_eq!(workspaces[0]["id"], "w1");
        assert_eq!(workspaces[0]["role"], "MEMBER");
        assert_eq!(workspaces[0]["owner"]["id"], "u1");
        assert_eq!(workspaces[0]["members"].as_array().unwrap().len(), 2);
    }
}
