use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::{CurrentUser, RequireAuth};
use crate::error::ApiError;

#[derive(Serialize)]
pub struct ActiveGrant {
    pub object_id: Uuid,
    pub object_title: String,
    pub access_expires_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: CurrentUser,
    pub access_grants: Vec<ActiveGrant>,
}

/// Get current authenticated user info with their live site sessions
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<MeResponse>, ApiError> {
    let grants: Vec<(Uuid, String, Option<DateTime<Utc>>)> = sqlx::query_as(
        r#"
        SELECT g.object_id, o.title, g.access_expires_at
        FROM object_access_grants g
        JOIN objects o ON o.id = g.object_id
        WHERE g.user_id = $1
          AND g.is_active
          AND (g.access_expires_at IS NULL OR g.access_expires_at > now())
        ORDER BY g.created_at DESC
        "#,
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(MeResponse {
        user,
        access_grants: grants
            .into_iter()
            .map(|(object_id, object_title, access_expires_at)| ActiveGrant {
                object_id,
                object_title,
                access_expires_at,
            })
            .collect(),
    }))
}
