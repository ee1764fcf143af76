//! Company routes: current company lookup and the dashboard object board.

use axum::extract::{Path, State};
use axum::{response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use super::objects::{self, ResponsibleUserBrief};
use crate::api::response::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::objects::ObjectStatus;
use crate::error::ApiError;

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct CompanyCurrent {
    pub id: Uuid,
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct ProjectStatus {
    pub id: Uuid,
    pub title: String,
    pub city: String,
    pub updated_at: DateTime<Utc>,
    pub status: ObjectStatus,
    pub responsible_user: Option<ResponsibleUserBrief>,
    pub coords: Option<Value>,
}

#[derive(Debug, sqlx::FromRow)]
struct ProjectStatusRow {
    id: Uuid,
    title: String,
    city: String,
    updated_at: DateTime<Utc>,
    status: String,
    responsible_user_id: Option<Uuid>,
    responsible_full_name: Option<String>,
    boundary: Option<Value>,
}

impl From<ProjectStatusRow> for ProjectStatus {
    fn from(row: ProjectStatusRow) -> Self {
        let responsible_user = match (row.responsible_user_id, row.responsible_full_name) {
            (Some(id), Some(full_name)) => Some(ResponsibleUserBrief { id, full_name }),
            _ => None,
        };
        Self {
            id: row.id,
            title: row.title,
            city: row.city,
            updated_at: row.updated_at,
            status: ObjectStatus::from_db(&row.status),
            responsible_user,
            coords: row.boundary,
        }
    }
}

/// GET /api/company/current
///
/// The company the caller belongs to.
pub async fn current_company(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let company_id = user
        .company_id
        .ok_or_else(|| ApiError::not_found("User is not attached to a company"))?;

    let company = sqlx::query_as::<_, CompanyCurrent>(
        "SELECT id, title FROM companies WHERE id = $1",
    )
    .bind(company_id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(DataResponse::new(company)))
}

/// GET /api/company/dashboard/status/:company_id
///
/// Per-object status board for a company's dashboard, most recently
/// updated objects first. Visibility follows the same role scoping as
/// the object listing.
pub async fn dashboard_status(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    Path(company_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM companies WHERE id = $1)")
            .bind(company_id)
            .fetch_one(&state.db)
            .await?;
    if !exists {
        return Err(ApiError::not_found("Company not found"));
    }

    let (company_filter, contractor_filter) = objects::list_scope(&user, Some(company_id))?;

    let rows = sqlx::query_as::<_, ProjectStatusRow>(
        r#"
        SELECT o.id, o.title, o.city, o.updated_at, o.status,
               o.responsible_user_id, u.full_name AS responsible_full_name,
               o.boundary
        FROM objects o
        LEFT JOIN users u ON u.id = o.responsible_user_id
        WHERE ($1::uuid IS NULL OR o.company_id = $1)
          AND ($2::uuid IS NULL OR o.contractor_company_id = $2)
        ORDER BY o.updated_at DESC
        "#,
    )
    .bind(company_filter)
    .bind(contractor_filter)
    .fetch_all(&state.db)
    .await?;

    let data: Vec<ProjectStatus> = rows.into_iter().map(Into::into).collect();
    Ok(Json(DataResponse::new(data)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dashboard_row_maps_status_and_responsible_user() {
        let user_id = Uuid::new_v4();
        let row = ProjectStatusRow {
            id: Uuid::new_v4(),
            title: "School No. 14".to_string(),
            city: "Kazan".to_string(),
            updated_at: Utc::now(),
            status: "PLAN".to_string(),
            responsible_user_id: Some(user_id),
            responsible_full_name: Some("Site Manager".to_string()),
            boundary: Some(json!([[55.79, 49.11], [55.80, 49.12]])),
        };

        let project: ProjectStatus = row.into();
        assert_eq!(project.status, ObjectStatus::Plan);
        let responsible = project.responsible_user.unwrap();
        assert_eq!(responsible.id, user_id);
        assert_eq!(responsible.full_name, "Site Manager");
        assert!(project.coords.is_some());
    }

    #[test]
    fn dashboard_row_without_responsible_user_maps_to_none() {
        let row = ProjectStatusRow {
            id: Uuid::new_v4(),
            title: "Clinic".to_string(),
            city: "Kazan".to_string(),
            updated_at: Utc::now(),
            status: "KNOWN".to_string(),
            responsible_user_id: None,
            responsible_full_name: None,
            boundary: None,
        };

        let project: ProjectStatus = row.into();
        assert!(project.responsible_user.is_none());
        assert!(project.coords.is_none());
    }
}
