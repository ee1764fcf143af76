//! User directory routes.

use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::response::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::UserRole;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct CompanyBrief {
    pub id: Uuid,
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct Contractor {
    pub id: Uuid,
    pub using_id: i64,
    pub full_name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub role: UserRole,
    pub company: Option<CompanyBrief>,
}

#[derive(Debug, sqlx::FromRow)]
struct ContractorRow {
    id: Uuid,
    using_id: i64,
    full_name: String,
    email: String,
    avatar: Option<String>,
    company_id: Option<Uuid>,
    company_title: Option<String>,
}

impl From<ContractorRow> for Contractor {
    fn from(row: ContractorRow) -> Self {
        let company = match (row.company_id, row.company_title) {
            (Some(id), Some(title)) => Some(CompanyBrief { id, title }),
            _ => None,
        };
        Self {
            id: row.id,
            using_id: row.using_id,
            full_name: row.full_name,
            email: row.email,
            avatar: row.avatar,
            role: UserRole::Contractor,
            company,
        }
    }
}

/// GET /api/users/contractors
///
/// Every contractor-role user with their employer; the pick list for
/// assigning a contractor during object activation.
pub async fn list_contractors(
    State(state): State<Arc<AppState>>,
    _auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let rows = sqlx::query_as::<_, ContractorRow>(
        r#"
        SELECT u.id, u.using_id, u.full_name, u.email, u.avatar,
               c.id AS company_id, c.title AS company_title
        FROM users u
        LEFT JOIN companies c ON c.id = u.company_id
        WHERE u.role = $1
        ORDER BY u.full_name
        "#,
    )
    .bind(UserRole::Contractor.as_str())
    .fetch_all(&state.db)
    .await?;

    let data: Vec<Contractor> = rows.into_iter().map(Into::into).collect();
    Ok(Json(DataResponse::new(data)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(company: Option<(Uuid, &str)>) -> ContractorRow {
        ContractorRow {
            id: Uuid::new_v4(),
            using_id: 2042,
            full_name: "Builder Co Foreman".to_string(),
            email: "foreman@builder.example".to_string(),
            avatar: None,
            company_id: company.map(|(id, _)| id),
            company_title: company.map(|(_, title)| title.to_string()),
        }
    }

    #[test]
    fn contractor_carries_employer_when_present() {
        let company_id = Uuid::new_v4();
        let contractor: Contractor = row(Some((company_id, "Builder Co"))).into();
        let company = contractor.company.unwrap();
        assert_eq!(company.id, company_id);
        assert_eq!(company.title, "Builder Co");
        assert_eq!(contractor.role, UserRole::Contractor);
    }

    #[test]
    fn contractor_without_company_maps_to_none() {
        let contractor: Contractor = row(None).into();
        assert!(contractor.company.is_none());
    }
}
