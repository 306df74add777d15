// Event ingestion endpoint for identity-provider webhooks.
//
// Deliveries are signed and verified by the provider's infrastructure in
// front of this service; the endpoint itself only enforces an optional
// shared token before dispatching. A 2xx response acknowledges the event;
// any propagated handler error surfaces as a non-2xx status so the
// provider's retry mechanism redelivers.

pub(crate) mod payload;
pub(crate) mod sync;

use axum::{
    Json,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;

use crate::{error::AppError, state::AppState};

pub(crate) const WEBHOOK_TOKEN_HEADER: &str = "x-webhook-token";

/// Closed set of event types this service consumes. Dispatch is a total
/// `match` over this enumeration, so a kind without a handler fails the
/// build rather than the first delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    UserCreated,
    UserUpdated,
    UserDeleted,
    OrganizationCreated,
    OrganizationUpdated,
    OrganizationDeleted,
    MembershipCreated,
    MembershipUpdated,
    MembershipDeleted,
}

impl EventKind {
    pub const ALL: [EventKind; 9] = [
        EventKind::UserCreated,
        EventKind::UserUpdated,
        EventKind::UserDeleted,
        EventKind::OrganizationCreated,
        EventKind::OrganizationUpdated,
        EventKind::OrganizationDeleted,
        EventKind::MembershipCreated,
        EventKind::MembershipUpdated,
        EventKind::MembershipDeleted,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user.created" => Some(Self::UserCreated),
            "user.updated" => Some(Self::UserUpdated),
            "user.deleted" => Some(Self::UserDeleted),
            "organization.created" => Some(Self::OrganizationCreated),
            "organization.updated" => Some(Self::OrganizationUpdated),
            "organization.deleted" => Some(Self::OrganizationDeleted),
            "organizationMembership.created" => Some(Self::MembershipCreated),
            "organizationMembership.updated" => Some(Self::MembershipUpdated),
            "organizationMembership.deleted" => Some(Self::MembershipDeleted),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserCreated => "user.created",
            Self::UserUpdated => "user.updated",
            Self::UserDeleted => "user.deleted",
            Self::OrganizationCreated => "organization.created",
            Self::OrganizationUpdated => "organization.updated",
            Self::OrganizationDeleted => "organization.deleted",
            Self::MembershipCreated => "organizationMembership.created",
            Self::MembershipUpdated => "organizationMembership.updated",
            Self::MembershipDeleted => "organizationMembership.deleted",
        }
    }
}

/// Signed event envelope as delivered by the provider.
#[derive(Debug, Deserialize)]
pub(crate) struct EventEnvelope {
    #[serde(rename = "type")]
    pub(crate) event_type: String,
    #[serde(default)]
    pub(crate) data: JsonValue,
}

#[derive(Debug, Serialize)]
pub(crate) struct EventAck {
    pub(crate) received: bool,
    pub(crate) event: &'static str,
}

pub(crate) async fn identity_webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(envelope): Json<EventEnvelope>,
) -> Result<impl IntoResponse, AppError> {
    verify_webhook_token(&state, &headers)?;

    let kind = EventKind::parse(&envelope.event_type)
        .ok_or_else(|| AppError::unknown_event_type(&envelope.event_type))?;

    dispatch(&state, kind, envelope.data).await?;

    Ok(Json(EventAck {
        received: true,
        event: kind.as_str(),
    }))
}

fn verify_webhook_token(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(expected) = state.config.webhook_token.as_deref() else {
        return Ok(());
    };

    let presented = headers
        .get(WEBHOOK_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());

    if presented == Some(expected) {
        Ok(())
    } else {
        Err(AppError::invalid_webhook_token())
    }
}

/// Route an already-classified event to its synchronization handler.
pub(crate) async fn dispatch(
    state: &AppState,
    kind: EventKind,
    data: JsonValue,
) -> Result<(), AppError> {
    let precedence = state.config.membership_id_precedence;

    match kind {
        EventKind::UserCreated => {
            let event = payload::normalize_user(decode(data)?)?;
            sync::apply_user_created(state, event).await
        }
        EventKind::UserUpdated => {
            let event = payload::normalize_user(decode(data)?)?;
            sync::apply_user_updated(state, event).await
        }
        EventKind::UserDeleted => {
            let event = payload::normalize_user(decode(data)?)?;
            sync::apply_user_deleted(state, event.id).await
        }
        EventKind::OrganizationCreated => {
            let event = payload::normalize_workspace(decode(data)?)?;
            sync::apply_workspace_created(state, event).await
        }
        EventKind::OrganizationUpdated => {
            let event = payload::normalize_workspace(decode(data)?)?;
            sync::apply_workspace_updated(state, event).await
        }
        EventKind::OrganizationDeleted => {
            let event = payload::normalize_workspace(decode(data)?)?;
            sync::apply_workspace_deleted(state, event.id).await
        }
        EventKind::MembershipCreated => {
            let event = payload::normalize_membership(decode(data)?, precedence)?;
            sync::apply_membership_created(state, event).await
        }
        EventKind::MembershipUpdated => {
            let event = payload::normalize_membership(decode(data)?, precedence)?;
            sync::apply_membership_updated(state, event).await
        }
        EventKind::MembershipDeleted => {
            let event = payload::normalize_membership(decode(data)?, precedence)?;
            sync::apply_membership_deleted(state, event).await
        }
    }
}

fn decode<T: DeserializeOwned>(data: JsonValue) -> Result<T, AppError> {
    serde_json::from_value(data)
        .map_err(|err| AppError::malformed_event(format!("invalid event payload: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};
    use serde_json::json;

    use huddle_core::{
        ids::{UserId, WorkspaceId},
        workspace_member::WorkspaceRole,
    };

    use crate::test_support::{setup_state, setup_state_with_token};

    async fn deliver(
        state: &crate::state::AppState,
        event_type: &str,
        data: serde_json::Value,
    ) -> Result<(), AppError> {
        let kind = EventKind::parse(event_type).expect("known event type");
        dispatch(state, kind, data).await
    }

    #[test]
    fn every_event_type_round_trips_through_the_dispatch_table() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::parse("session.created"), None);
    }

    #[tokio::test]
    async fn user_created_event_mirrors_the_user() {
        let (_temp_dir, _database, state) = setup_state().await;

        deliver(
            &state,
            "user.created",
            json!({
                "id": "u1",
                "email_addresses": [{ "email_address": "a@x.com" }],
                "first_name": "A",
                "last_name": "B"
            }),
        )
        .await
        .expect("handler succeeds");

        let user = state
            .user_store
            .find_by_id(&UserId::from("u1"))
            .await
            .unwrap()
            .expect("user mirrored");
        assert_eq!(user.email.as_deref(), Some("a@x.com"));
        assert_eq!(user.name.as_deref(), Some("A B"));
    }

    #[tokio::test]
    async fn user_created_is_idempotent_across_redelivery() {
        let (_temp_dir, database, state) = setup_state().await;

        let payload = json!({
            "id": "u1",
            "email_addresses": [{ "email_address": "a@x.com" }],
            "first_name": "A",
            "last_name": "B"
        });

        deliver(&state, "user.created", payload.clone())
            .await
            .expect("first delivery succeeds");
        deliver(&state, "user.created", payload)
            .await
            .expect("redelivery succeeds");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = 'u1'")
            .fetch_one(database.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn organization_created_enrolls_existing_owner_as_admin() {
        let (_temp_dir, _database, state) = setup_state().await;

        deliver(&state, "user.created", json!({ "id": "u1" }))
            .await
            .unwrap();
        deliver(
            &state,
            "organization.created",
            json!({ "id": "w1", "created_by": "u1", "name": "Team" }),
        )
        .await
        .unwrap();

        let workspace = state
            .workspace_store
            .find_by_id(&WorkspaceId::from("w1"))
            .await
            .unwrap()
            .expect("workspace mirrored");
        assert_eq!(workspace.owner_id.as_str(), "u1");
        assert_eq!(workspace.name, "Team");

        let member = state
            .workspace_store
            .get_member(&WorkspaceId::from("w1"), &UserId::from("u1"))
            .await
            .unwrap()
            .expect("owner enrolled");
        assert_eq!(member.role, WorkspaceRole::Admin);
    }

    #[tokio::test]
    async fn organization_before_owner_skips_admin_row_and_never_heals() {
        let (_temp_dir, _database, state) = setup_state().await;

        deliver(
            &state,
            "organization.created",
            json!({ "id": "w1", "created_by": "u1", "name": "Team" }),
        )
        .await
        .expect("out-of-order organization event still succeeds");

        assert!(
            state
                .workspace_store
                .find_by_id(&WorkspaceId::from("w1"))
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            state
                .workspace_store
                .get_member(&WorkspaceId::from("w1"), &UserId::from("u1"))
                .await
                .unwrap()
                .is_none()
        );

        // The owner's user event arriving later does not retroactively
        // create the admin row: there is no reconciliation step.
        deliver(&state, "user.created", json!({ "id": "u1" }))
            .await
            .unwrap();
        assert!(
            state
                .workspace_store
                .get_member(&WorkspaceId::from("w1"), &UserId::from("u1"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn membership_created_normalizes_lowercase_role() {
        let (_temp_dir, _database, state) = setup_state().await;

        deliver(&state, "user.created", json!({ "id": "u1" }))
            .await
            .unwrap();
        deliver(&state, "user.created", json!({ "id": "u2" }))
            .await
            .unwrap();
        deliver(
            &state,
            "organization.created",
            json!({ "id": "w1", "created_by": "u1", "name": "Team" }),
        )
        .await
        .unwrap();

        deliver(
            &state,
            "organizationMembership.created",
            json!({
                "public_user_data": { "user_id": "u2" },
                "organization": { "id": "w1" },
                "role": "member"
            }),
        )
        .await
        .unwrap();

        let member = state
            .workspace_store
            .get_member(&WorkspaceId::from("w1"), &UserId::from("u2"))
            .await
            .unwrap()
            .expect("member mirrored");
        assert_eq!(member.role, WorkspaceRole::Member);
    }

    #[tokio::test]
    async fn membership_with_unknown_role_is_rejected() {
        let (_temp_dir, _database, state) = setup_state().await;

        let err = deliver(
            &state,
            "organizationMembership.created",
            json!({ "user_id": "u1", "organization_id": "w1", "role": "superuser" }),
        )
        .await
        .expect_err("unknown role must be rejected");

        let (status, payload) = err.into_payload();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload.name, "INVALID_ROLE");
    }

    #[tokio::test]
    async fn organization_deleted_cascades_member_rows() {
        let (_temp_dir, database, state) = setup_state().await;

        deliver(&state, "user.created", json!({ "id": "u1" }))
            .await
            .unwrap();
        deliver(
            &state,
            "organization.created",
            json!({ "id": "w1", "created_by": "u1", "name": "Team" }),
        )
        .await
        .unwrap();
        deliver(
            &state,
            "organization.deleted",
            json!({ "id": "w1" }),
        )
        .await
        .unwrap();

        let members: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM workspace_members WHERE workspace_id = 'w1'")
                .fetch_one(database.pool())
                .await
                .unwrap();
        assert_eq!(members, 0);
    }

    #[tokio::test]
    async fn organization_updated_on_unseen_id_takes_first_sight_path() {
        let (_temp_dir, _database, state) = setup_state().await;

        deliver(&state, "user.created", json!({ "id": "u1" }))
            .await
            .unwrap();
        deliver(
            &state,
            "organization.updated",
            json!({ "id": "w1", "created_by": "u1", "name": "Team", "slug": "team" }),
        )
        .await
        .unwrap();

        let workspace = state
            .workspace_store
            .find_by_id(&WorkspaceId::from("w1"))
            .await
            .unwrap()
            .expect("first sight inserts");
        assert_eq!(workspace.owner_id.as_str(), "u1");

        // A later update must not touch ownership or membership.
        deliver(
            &state,
            "organization.updated",
            json!({ "id": "w1", "created_by": "u_other", "name": "Renamed" }),
        )
        .await
        .unwrap();

        let workspace = state
            .workspace_store
            .find_by_id(&WorkspaceId::from("w1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(workspace.name, "Renamed");
        assert_eq!(workspace.owner_id.as_str(), "u1");
    }

    #[tokio::test]
    async fn user_deleted_keeps_workspace_with_dangling_owner() {
        let (_temp_dir, _database, state) = setup_state().await;

        deliver(&state, "user.created", json!({ "id": "u1" }))
            .await
            .unwrap();
        deliver(
            &state,
            "organization.created",
            json!({ "id": "w1", "created_by": "u1", "name": "Team" }),
        )
        .await
        .unwrap();
        deliver(&state, "user.deleted", json!({ "id": "u1" }))
            .await
            .expect("user deletion succeeds despite references");

        // The mirror keeps the workspace; only membership rows cascade.
        assert!(
            state
                .workspace_store
                .find_by_id(&WorkspaceId::from("w1"))
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            state
                .workspace_store
                .get_member(&WorkspaceId::from("w1"), &UserId::from("u1"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn membership_for_unseen_user_is_logged_and_left_unestablished() {
        let (_temp_dir, _database, state) = setup_state().await;

        deliver(&state, "user.created", json!({ "id": "u1" }))
            .await
            .unwrap();
        deliver(
            &state,
            "organization.created",
            json!({ "id": "w1", "created_by": "u1", "name": "Team" }),
        )
        .await
        .unwrap();

        deliver(
            &state,
            "organizationMembership.created",
            json!({ "user_id": "u_unseen", "organization_id": "w1", "role": "member" }),
        )
        .await
        .expect("missing prerequisite completes without fatal error");

        assert!(
            state
                .workspace_store
                .get_member(&WorkspaceId::from("w1"), &UserId::from("u_unseen"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn membership_updated_changes_role_only() {
        let (_temp_dir, _database, state) = setup_state().await;

        deliver(&state, "user.created", json!({ "id": "u1" }))
            .await
            .unwrap();
        deliver(&state, "user.created", json!({ "id": "u2" }))
            .await
            .unwrap();
        deliver(
            &state,
            "organization.created",
            json!({ "id": "w1", "created_by": "u1", "name": "Team" }),
        )
        .await
        .unwrap();
        deliver(
            &state,
            "organizationMembership.created",
            json!({ "user_id": "u2", "organization_id": "w1", "role": "member" }),
        )
        .await
        .unwrap();

        deliver(
            &state,
            "organizationMembership.updated",
            json!({ "user_id": "u2", "organization_id": "w1", "role": "admin" }),
        )
        .await
        .unwrap();

        let member = state
            .workspace_store
            .get_member(&WorkspaceId::from("w1"), &UserId::from("u2"))
            .await
            .unwrap()
            .expect("member kept");
        assert_eq!(member.role, WorkspaceRole::Admin);
    }

    #[tokio::test]
    async fn membership_deleted_removes_the_pair() {
        let (_temp_dir, _database, state) = setup_state().await;

        deliver(&state, "user.created", json!({ "id": "u1" }))
            .await
            .unwrap();
        deliver(&state, "user.created", json!({ "id": "u2" }))
            .await
            .unwrap();
        deliver(
            &state,
            "organization.created",
            json!({ "id": "w1", "created_by": "u1", "name": "Team" }),
        )
        .await
        .unwrap();
        deliver(
            &state,
            "organizationMembership.created",
            json!({ "user_id": "u2", "organization_id": "w1", "role": "member" }),
        )
        .await
        .unwrap();

        deliver(
            &state,
            "organizationMembership.deleted",
            json!({ "user_id": "u2", "organization_id": "w1" }),
        )
        .await
        .unwrap();

        assert!(
            state
                .workspace_store
                .get_member(&WorkspaceId::from("w1"), &UserId::from("u2"))
                .await
                .unwrap()
                .is_none()
        );

        // Redelivery of the deletion is a no-op success.
        deliver(
            &state,
            "organizationMembership.deleted",
            json!({ "user_id": "u2", "organization_id": "w1" }),
        )
        .await
        .expect("redelivered deletion succeeds");
    }

    #[tokio::test]
    async fn endpoint_rejects_unknown_event_types() {
        let (_temp_dir, _database, state) = setup_state().await;

        let envelope: EventEnvelope =
            serde_json::from_value(json!({ "type": "session.created", "data": {} })).unwrap();

        let err = identity_webhook_handler(State(state), HeaderMap::new(), Json(envelope))
            .await
            .err()
            .expect("unknown type is rejected");
        let (status, payload) = err.into_payload();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload.name, "UNKNOWN_EVENT_TYPE");
    }

    #[tokio::test]
    async fn endpoint_enforces_the_shared_token_when_configured() {
        let (_temp_dir, _database, state) = setup_state_with_token("s3cret").await;

        let envelope = || -> EventEnvelope {
            serde_json::from_value(json!({ "type": "user.created", "data": { "id": "u1" } }))
                .unwrap()
        };

        let err =
            identity_webhook_handler(State(state.clone()), HeaderMap::new(), Json(envelope()))
                .await
                .err()
                .expect("missing token is rejected");
        let (status, _) = err.into_payload();
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let mut headers = HeaderMap::new();
        headers.insert(WEBHOOK_TOKEN_HEADER, HeaderValue::from_static("s3cret"));
        identity_webhook_handler(State(state), headers, Json(envelope()))
            .await
            .expect("matching token is accepted");
    }
}
