// Synchronization handlers: one per (entity, lifecycle-phase) pair. Each
// translates a canonical event into mutations against the mirror store.
//
// Every handler is safe to re-apply for an identical payload: the provider
// redelivers after timeouts and never promises at-most-once delivery. The
// store's unique and foreign-key constraints are the only concurrency
// safety net; a duplicate-key failure on redelivery or on a concurrent
// duplicate insert is benign.

use tracing::{debug, info, warn};

use huddle_core::{
    ids::{UserId, WorkspaceId},
    workspace::CreateWorkspaceParams,
    workspace_member::WorkspaceRole,
};

use crate::{
    error::AppError,
    state::AppState,
    utils::db::{is_foreign_key_violation, is_unique_violation},
    webhook::payload::{MembershipEvent, UserEvent, WorkspaceEvent},
};

pub(crate) const DEFAULT_WORKSPACE_NAME: &str = "Untitled Workspace";

pub(crate) async fn apply_user_created(state: &AppState, event: UserEvent) -> Result<(), AppError> {
    match state.user_store.create(&event.id, &event.profile).await {
        Ok(_) => {
            info!(user_id = %event.id, "mirrored new user");
            Ok(())
        }
        Err(err) if is_unique_violation(&err) => {
            debug!(user_id = %event.id, "user already mirrored, redelivery treated as success");
            Ok(())
        }
        Err(err) => Err(AppError::from_anyhow(err)),
    }
}

/// Late-creation ordering is tolerated: an update for an id the mirror has
/// never seen inserts the row instead of failing the delivery forever.
pub(crate) async fn apply_user_updated(state: &AppState, event: UserEvent) -> Result<(), AppError> {
    let updated = state
        .user_store
        .update(&event.id, &event.profile)
        .await
        .map_err(AppError::from_anyhow)?;

    if updated {
        return Ok(());
    }

    match state.user_store.create(&event.id, &event.profile).await {
        Ok(_) => {
            info!(user_id = %event.id, "user update arrived before creation, inserted mirror row");
            Ok(())
        }
        // Lost a race against a concurrent delivery; the row exists now.
        Err(err) if is_unique_violation(&err) => Ok(()),
        Err(err) => Err(AppError::from_anyhow(err)),
    }
}

pub(crate) async fn apply_user_deleted(state: &AppState, id: UserId) -> Result<(), AppError> {
    let deleted = state
        .user_store
        .delete(&id)
        .await
        .map_err(AppError::from_anyhow)?;

    if deleted {
        info!(user_id = %id, "removed mirrored user");
    } else {
        debug!(user_id = %id, "user already absent, redelivery treated as success");
    }

    Ok(())
}

pub(crate) async fn apply_workspace_created(
    state: &AppState,
    event: WorkspaceEvent,
) -> Result<(), AppError> {
    let owner_id = upsert_workspace(state, &event).await?;
    ensure_owner_admin_membership(state, &event.id, &owner_id).await
}

/// The provider sometimes announces a brand-new organization through an
/// `updated` event. An unseen id therefore takes the first-sight insert
/// path (including owner-admin enrollment); an existing row gets its
/// mutable fields updated and its ownership and membership left alone.
pub(crate) async fn apply_workspace_updated(
    state: &AppState,
    event: WorkspaceEvent,
) -> Result<(), AppError> {
    let existing = state
        .workspace_store
        .find_by_id(&event.id)
        .await
        .map_err(AppError::from_anyhow)?;

    if existing.is_some() {
        update_workspace_profile(state, &event).await?;
        return Ok(());
    }

    let owner_id = upsert_workspace(state, &event).await?;
    ensure_owner_admin_membership(state, &event.id, &owner_id).await
}

pub(crate) async fn apply_workspace_deleted(
    state: &AppState,
    id: WorkspaceId,
) -> Result<(), AppError> {
    let deleted = state
        .workspace_store
        .delete(&id)
        .await
        .map_err(AppError::from_anyhow)?;

    if deleted {
        info!(workspace_id = %id, "removed mirrored workspace");
    } else {
        debug!(workspace_id = %id, "workspace already absent, redelivery treated as success");
    }

    Ok(())
}

pub(crate) async fn apply_membership_created(
    state: &AppState,
    event: MembershipEvent,
) -> Result<(), AppError> {
    let role = event.require_role()?;
    insert_member_tolerant(state, &event.workspace_id, &event.user_id, role).await
}

pub(crate) async fn apply_membership_updated(
    state: &AppState,
    event: MembershipEvent,
) -> Result<(), AppError> {
    let role = event.require_role()?;

    let updated = state
        .workspace_store
        .set_member_role(&event.workspace_id, &event.user_id, role)
        .await
        .map_err(AppError::from_anyhow)?;

    if updated {
        return Ok(());
    }

    info!(
        workspace_id = %event.workspace_id,
        user_id = %event.user_id,
        "membership update arrived before creation, inserting member row"
    );
    insert_member_tolerant(state, &event.workspace_id, &event.user_id, role).await
}

pub(crate) async fn apply_membership_deleted(
    state: &AppState,
    event: MembershipEvent,
) -> Result<(), AppError> {
    let removed = state
        .workspace_store
        .remove_member(&event.workspace_id, &event.user_id)
        .await
        .map_err(AppError::from_anyhow)?;

    if !removed {
        debug!(
            workspace_id = %event.workspace_id,
            user_id = %event.user_id,
            "member already absent, redelivery treated as success"
        );
    }

    Ok(())
}

/// Insert the workspace row if it is unseen, otherwise refresh its mutable
/// fields. Returns the owner id the workspace ended up with.
async fn upsert_workspace(state: &AppState, event: &WorkspaceEvent) -> Result<UserId, AppError> {
    if let Some(existing) = state
        .workspace_store
        .find_by_id(&event.id)
        .await
        .map_err(AppError::from_anyhow)?
    {
        update_workspace_profile(state, event).await?;
        return Ok(existing.owner_id);
    }

    let owner_id = event.created_by.clone().ok_or_else(|| {
        AppError::malformed_event("organization event missing created_by on first sight")
    })?;

    let params = CreateWorkspaceParams {
        id: event.id.clone(),
        name: event
            .name
            .clone()
            .unwrap_or_else(|| DEFAULT_WORKSPACE_NAME.to_string()),
        slug: event.slug.clone(),
        owner_id: owner_id.clone(),
        avatar_url: event.avatar_url.clone(),
    };

    match state.workspace_store.create(params).await {
        Ok(_) => {
            info!(workspace_id = %event.id, owner_id = %owner_id, "mirrored new workspace");
            Ok(owner_id)
        }
        Err(err) if is_unique_violation(&err) => {
            // A concurrent delivery inserted it first; converge on an update.
            debug!(workspace_id = %event.id, "workspace already mirrored, refreshing fields");
            update_workspace_profile(state, event).await?;
            let owner = state
                .workspace_store
                .find_by_id(&event.id)
                .await
                .map_err(AppError::from_anyhow)?
                .map(|record| record.owner_id)
                .unwrap_or(owner_id);
            Ok(owner)
        }
        Err(err) => Err(AppError::from_anyhow(err)),
    }
}

async fn update_workspace_profile(state: &AppState, event: &WorkspaceEvent) -> Result<(), AppError> {
    state
        .workspace_store
        .update_profile(
            &event.id,
            event.name.as_deref(),
            event.slug.as_deref(),
            event.avatar_url.as_deref(),
        )
        .await
        .map_err(AppError::from_anyhow)?;

    Ok(())
}

/// Best-effort owner enrollment: the organization event may outrun the
/// owner's own user event, in which case the ADMIN member row is skipped
/// and NOT retried later — there is no reconciliation sweep.
async fn ensure_owner_admin_membership(
    state: &AppState,
    workspace_id: &WorkspaceId,
    owner_id: &UserId,
) -> Result<(), AppError> {
    let existing = state
        .workspace_store
        .get_member(workspace_id, owner_id)
        .await
        .map_err(AppError::from_anyhow)?;

    if existing.is_some() {
        return Ok(());
    }

    let owner_row = state
        .user_store
        .find_by_id(owner_id)
        .await
        .map_err(AppError::from_anyhow)?;

    if owner_row.is_none() {
        warn!(
            workspace_id = %workspace_id,
            owner_id = %owner_id,
            "owner has no mirrored user row yet, admin membership left unestablished"
        );
        return Ok(());
    }

    insert_member_tolerant(state, workspace_id, owner_id, WorkspaceRole::Admin).await
}

/// Shared member insert that treats redelivery and missing-prerequisite
/// failures as non-fatal: a duplicate pair means the member already exists,
/// and a foreign-key failure means a referenced mirror row is absent — the
/// relationship is logged and left unestablished rather than wedging the
/// provider's retry queue.
async fn insert_member_tolerant(
    state: &AppState,
    workspace_id: &WorkspaceId,
    user_id: &UserId,
    role: WorkspaceRole,
) -> Result<(), AppError> {
    match state
        .workspace_store
        .create_member(workspace_id, user_id, role, None)
        .await
    {
        Ok(_) => {
            info!(
                workspace_id = %workspace_id,
                user_id = %user_id,
                role = %role,
                "mirrored membership"
            );
            Ok(())
        }
        Err(err) if is_unique_violation(&err) => {
            debug!(
                workspace_id = %workspace_id,
                user_id = %user_id,
                "member already mirrored, redelivery treated as success"
            );
            Ok(())
        }
        Err(err) if is_foreign_key_violation(&err) => {
            warn!(
                workspace_id = %workspace_id,
                user_id = %user_id,
                "membership prerequisites missing in mirror, relationship left unestablished"
            );
            Ok(())
        }
        Err(err) => Err(AppError::from_anyhow(err)),
    }
}
