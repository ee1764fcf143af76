use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json, RequestPartsExt,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    typed_header::TypedHeaderRejectionReason,
    TypedHeader,
};
use sqlx::FromRow;
use std::sync::Arc;
use uuid::Uuid;

use super::{claims, CurrentUser};
use crate::app::AppState;
use crate::domain::UserRole;
use crate::error::ErrorResponse;

/// Extractor that requires authentication
/// Use this in route handlers to require a valid JWT
///
/// Example:
/// ```ignore
/// async fn protected_route(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}", user.full_name)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireAuth(pub CurrentUser);

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidFormat,
    InvalidToken,
    UnknownUser,
    Database,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AuthError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Missing authorization token",
            ),
            AuthError::InvalidFormat => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Invalid authorization format",
            ),
            AuthError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Invalid or expired token",
            ),
            AuthError::UnknownUser => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "User no longer exists",
            ),
            AuthError::Database => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred",
            ),
        };

        let body = ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
            request_id: None,
        };

        (status, Json(body)).into_response()
    }
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    using_id: i64,
    full_name: String,
    email: String,
    avatar: Option<String>,
    role: String,
    company_id: Option<Uuid>,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Extract the bearer token
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|rejection| match rejection.reason() {
                TypedHeaderRejectionReason::Missing => AuthError::MissingToken,
                _ => AuthError::InvalidFormat,
            })?;

        // Verify token
        let claims = claims::verify_token(bearer.token(), &state.settings.jwt_secret).map_err(|e| {
            tracing::warn!(error = %e, "JWT verification failed");
            AuthError::InvalidToken
        })?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        // Resolve the user; a valid token for a deleted account is a 401
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, using_id, full_name, email, avatar, role, company_id
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| {
            tracing::error!(error = ?e, "Failed to load user during auth");
            AuthError::Database
        })?
        .ok_or(AuthError::UnknownUser)?;

        Ok(RequireAuth(CurrentUser {
            id: row.id,
            using_id: row.using_id,
            full_name: row.full_name,
            email: row.email,
            avatar: row.avatar,
            role: UserRole::from_db(&row.role),
            company_id: row.company_id,
        }))
    }
}
