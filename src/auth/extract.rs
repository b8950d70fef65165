//! Authentication extractors
//!
//! `RequireAuth` is the base guard: it verifies the bearer token and loads
//! the user row (credential hash never selected) before the handler runs.
//! `MaybeAuth` performs the same steps but yields `Option<CurrentUser>`
//! instead of rejecting, so callers see "no user" explicitly rather than a
//! swallowed error. Role gates compose on top and reject with 403.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::app::AppState;
use crate::domain::users::Role;
use crate::error::{ApiError, ErrorResponse};

use super::tokens::TokenError;

/// The authenticated user attached to a request.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub full_name: String,
    pub active: bool,
    pub technician_verified: bool,
}

/// Closed set of capabilities a route can demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Client,
    Technician,
    VerifiedTechnician,
}

impl CurrentUser {
    pub fn role(&self) -> Role {
        Role::from_str(&self.role)
    }

    pub fn can(&self, capability: Capability) -> bool {
        match capability {
            Capability::Client => self.role() == Role::Client,
            Capability::Technician => self.role() == Role::Technician,
            Capability::VerifiedTechnician => {
                self.role() == Role::Technician && self.technician_verified
            }
        }
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidFormat,
    ExpiredToken,
    InvalidToken,
    UnknownUser,
    /// The credential could not be checked at all (database failure).
    /// Surfaces as 500, never as 401: the caller's token may be fine.
    Internal(sqlx::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::Internal(_) = self {
            let body = ErrorResponse {
                code: "INTERNAL_ERROR".to_string(),
                message: "An internal error occurred".to_string(),
                request_id: None,
            };
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
        }

        let message = match &self {
            AuthError::MissingToken => "Missing authorization token",
            AuthError::InvalidFormat => "Invalid authorization format",
            AuthError::ExpiredToken => "Token has expired",
            AuthError::InvalidToken => "Invalid token",
            AuthError::UnknownUser | AuthError::Internal(_) => "User no longer exists",
        };

        let body = ErrorResponse {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            request_id: None,
        };

        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        let msg = match e {
            AuthError::MissingToken => "Missing authorization token",
            AuthError::InvalidFormat => "Invalid authorization format",
            AuthError::ExpiredToken => "Token has expired",
            AuthError::InvalidToken => "Invalid token",
            AuthError::UnknownUser => "User no longer exists",
            AuthError::Internal(e) => return ApiError::Database(e),
        };
        ApiError::unauthorized(msg)
    }
}

async fn authenticate(parts: &Parts, state: &AppState) -> Result<CurrentUser, AuthError> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidFormat)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidFormat)?;

    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }

    let claims = state.tokens.verify(token).map_err(|e| {
        tracing::warn!(error = %e, "Token verification failed");
        match e {
            TokenError::Expired => AuthError::ExpiredToken,
            TokenError::Invalid => AuthError::InvalidToken,
        }
    })?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

    // Password hash is deliberately not selected here.
    let user = sqlx::query_as::<_, CurrentUser>(
        r#"
        SELECT u.id, u.email, u.role, u.full_name, u.active,
               COALESCE(tp.verified, false) AS technician_verified
        FROM users u
        LEFT JOIN technician_profiles tp ON tp.user_id = u.id
        WHERE u.id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to load user for auth");
        AuthError::Internal(e)
    })?
    .ok_or(AuthError::UnknownUser)?;

    if !user.active {
        return Err(AuthError::UnknownUser);
    }

    Ok(user)
}

/// Extractor that requires a valid token and an existing, active user.
#[derive(Debug, Clone)]
pub struct RequireAuth(pub CurrentUser);

impl std::ops::Deref for RequireAuth {
    type Target = CurrentUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).await.map(RequireAuth)
    }
}

/// Non-blocking variant: absence or invalidity of the token yields `None`.
/// Database failures still reject with 500 rather than downgrading the
/// request to anonymous.
#[derive(Debug, Clone)]
pub struct MaybeAuth(pub Option<CurrentUser>);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for MaybeAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match authenticate(parts, state).await {
            Ok(user) => Ok(MaybeAuth(Some(user))),
            Err(e @ AuthError::Internal(_)) => Err(e),
            Err(_) => Ok(MaybeAuth(None)),
        }
    }
}

/// Requires an authenticated client.
#[derive(Debug, Clone)]
pub struct RequireClient(pub CurrentUser);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireClient {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, state).await?;
        if !user.can(Capability::Client) {
            return Err(ApiError::forbidden("Client account required"));
        }
        Ok(RequireClient(user))
    }
}

/// Requires an authenticated technician.
#[derive(Debug, Clone)]
pub struct RequireTechnician(pub CurrentUser);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireTechnician {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, state).await?;
        if !user.can(Capability::Technician) {
            return Err(ApiError::forbidden("Technician account required"));
        }
        Ok(RequireTechnician(user))
    }
}

/// Requires a technician whose profile has passed verification.
#[derive(Debug, Clone)]
pub struct RequireVerifiedTechnician(pub CurrentUser);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireVerifiedTechnician {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, state).await?;
        if !user.can(Capability::VerifiedTechnician) {
            return Err(ApiError::forbidden("Verified technician account required"));
        }
        Ok(RequireVerifiedTechnician(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_failures_map_to_unauthorized() {
        for err in [
            AuthError::MissingToken,
            AuthError::InvalidFormat,
            AuthError::ExpiredToken,
            AuthError::InvalidToken,
            AuthError::UnknownUser,
        ] {
            assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn database_failure_is_a_server_error_not_unauthorized() {
        let err = AuthError::Internal(sqlx::Error::PoolTimedOut);
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn database_failure_converts_to_database_api_error() {
        let api: ApiError = AuthError::Internal(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(api, ApiError::Database(_)));
    }
}
