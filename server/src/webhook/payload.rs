// Payload normalization for identity-provider events.
//
// The provider is not consistent about where it puts identifiers (the
// membership user id is sometimes nested under `public_user_data`, the
// organization id sometimes under `organization.id`), so every raw payload
// is reduced to one canonical event per entity type before any handler
// logic runs. Handlers never look at raw payloads.

use serde::Deserialize;
use tracing::warn;

use huddle_core::{
    config::MembershipIdPrecedence,
    ids::{UserId, WorkspaceId},
    user::UserProfile,
    workspace_member::WorkspaceRole,
};

use crate::error::AppError;

// ========== Raw provider shapes ==========

#[derive(Debug, Deserialize)]
pub(crate) struct RawUserPayload {
    #[serde(default)]
    pub(crate) id: Option<String>,
    #[serde(default)]
    pub(crate) email_addresses: Vec<RawEmailAddress>,
    #[serde(default)]
    pub(crate) first_name: Option<String>,
    #[serde(default)]
    pub(crate) last_name: Option<String>,
    #[serde(default)]
    pub(crate) username: Option<String>,
    #[serde(default)]
    pub(crate) image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawEmailAddress {
    #[serde(default)]
    pub(crate) email_address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawOrganizationPayload {
    #[serde(default)]
    pub(crate) id: Option<String>,
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) slug: Option<String>,
    #[serde(default)]
    pub(crate) created_by: Option<String>,
    #[serde(default)]
    pub(crate) image_url: Option<String>,
    #[serde(default)]
    pub(crate) logo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawMembershipPayload {
    #[serde(default)]
    pub(crate) user_id: Option<String>,
    #[serde(default)]
    pub(crate) public_user_data: Option<RawPublicUserData>,
    #[serde(default)]
    pub(crate) organization_id: Option<String>,
    #[serde(default)]
    pub(crate) organization: Option<RawOrganizationRef>,
    #[serde(default)]
    pub(crate) role: Option<String>,
    #[serde(default)]
    pub(crate) role_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPublicUserData {
    #[serde(default)]
    pub(crate) user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawOrganizationRef {
    #[serde(default)]
    pub(crate) id: Option<String>,
}

// ========== Canonical events ==========

#[derive(Debug, Clone)]
pub(crate) struct UserEvent {
    pub(crate) id: UserId,
    pub(crate) profile: UserProfile,
}

#[derive(Debug, Clone)]
pub(crate) struct WorkspaceEvent {
    pub(crate) id: WorkspaceId,
    pub(crate) name: Option<String>,
    pub(crate) slug: Option<String>,
    pub(crate) created_by: Option<UserId>,
    pub(crate) avatar_url: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct MembershipEvent {
    pub(crate) user_id: UserId,
    pub(crate) workspace_id: WorkspaceId,
    role: Option<String>,
}

impl MembershipEvent {
    /// Resolve the event's role against the closed enumeration. A missing
    /// role is malformed, an unrecognized role is rejected outright; neither
    /// is ever defaulted.
    pub(crate) fn require_role(&self) -> Result<WorkspaceRole, AppError> {
        let raw = self
            .role
            .as_deref()
            .ok_or_else(|| AppError::malformed_event("membership event missing role"))?;

        WorkspaceRole::parse(raw).ok_or_else(|| AppError::invalid_role(raw))
    }
}

// ========== Normalization ==========

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|inner| !inner.trim().is_empty())
}

fn require_id(value: Option<String>, what: &str) -> Result<String, AppError> {
    non_empty(value).ok_or_else(|| AppError::malformed_event(format!("{what} event missing id")))
}

pub(crate) fn normalize_user(raw: RawUserPayload) -> Result<UserEvent, AppError> {
    let id = require_id(raw.id, "user")?;

    let first_name = non_empty(raw.first_name);
    let last_name = non_empty(raw.last_name);
    let username = non_empty(raw.username);

    let name = match (first_name, last_name) {
        (Some(first), Some(last)) => Some(format!("{first} {last}")),
        _ => username.clone(),
    };

    let email = raw
        .email_addresses
        .into_iter()
        .next()
        .and_then(|entry| non_empty(entry.email_address));

    Ok(UserEvent {
        id: UserId::from(id),
        profile: UserProfile {
            email,
            name,
            username,
            avatar_url: non_empty(raw.image_url),
        },
    })
}

pub(crate) fn normalize_workspace(raw: RawOrganizationPayload) -> Result<WorkspaceEvent, AppError> {
    let id = require_id(raw.id, "organization")?;

    Ok(WorkspaceEvent {
        id: WorkspaceId::from(id),
        name: non_empty(raw.name),
        slug: non_empty(raw.slug),
        created_by: non_empty(raw.created_by).map(UserId::from),
        avatar_url: non_empty(raw.image_url).or_else(|| non_empty(raw.logo_url)),
    })
}

/// Pick one id out of a possibly duplicated (top-level, nested) pair. A
/// disagreement is resolved by the configured precedence and logged; it is
/// never silently preferred.
fn resolve_dual_id(
    top_level: Option<String>,
    nested: Option<String>,
    precedence: MembershipIdPrecedence,
    what: &str,
) -> Result<String, AppError> {
    let top_level = non_empty(top_level);
    let nested = non_empty(nested);

    match (top_level, nested) {
        (Some(top), Some(nested)) if top != nested => {
            let chosen = match precedence {
                MembershipIdPrecedence::TopLevel => top.clone(),
                MembershipIdPrecedence::Nested => nested.clone(),
            };
            warn!(
                top_level = %top,
                nested = %nested,
                chosen = %chosen,
                "membership event carries conflicting {what} ids, using configured precedence"
            );
            Ok(chosen)
        }
        (Some(top), _) => Ok(top),
        (None, Some(nested)) => Ok(nested),
        (None, None) => Err(AppError::malformed_event(format!(
            "membership event missing {what} id"
        ))),
    }
}

pub(crate) fn normalize_membership(
    raw: RawMembershipPayload,
    precedence: MembershipIdPrecedence,
) -> Result<MembershipEvent, AppError> {
    let user_id = resolve_dual_id(
        raw.user_id,
        raw.public_user_data.and_then(|data| data.user_id),
        precedence,
        "user",
    )?;

    let workspace_id = resolve_dual_id(
        raw.organization_id,
        raw.organization.and_then(|org| org.id),
        precedence,
        "organization",
    )?;

    Ok(MembershipEvent {
        user_id: UserId::from(user_id),
        workspace_id: WorkspaceId::from(workspace_id),
        role: non_empty(raw.role).or_else(|| non_empty(raw.role_name)),
    })
}
