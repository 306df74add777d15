// Session verification is delegated to the identity provider's middleware
// at the edge; by the time a request reaches this service the session has
// been validated and the authenticated user id forwarded in a header. This
// module only resolves that id against the mirrored user table.

use axum::{extract::FromRequestParts, http::request::Parts};

use huddle_core::{ids::UserId, user::UserRecord};

use crate::{error::AppError, state::AppState};

pub(crate) const IDENTITY_USER_HEADER: &str = "x-identity-user-id";

/// Extractor for the authenticated caller on REST routes.
pub(crate) struct AuthenticatedUser(pub(crate) UserRecord);

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(IDENTITY_USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::unauthorized("missing authenticated identity"))?;

        let user = state
            .user_store
            .find_by_id(&UserId::from(user_id))
            .await
            .map_err(AppError::from_anyhow)?
            .ok_or_else(|| AppError::unauthorized("unknown authenticated identity"))?;

        Ok(Self(user))
    }
}
