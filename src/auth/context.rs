use serde::Serialize;
use uuid::Uuid;

use crate::domain::UserRole;

/// Authenticated user for the current request, loaded from the users
/// table after the token checks out.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: Uuid,

    /// Human-facing personnel number
    pub using_id: i64,

    pub full_name: String,

    pub email: String,

    pub avatar: Option<String>,

    pub role: UserRole,

    /// Employer; inspection staff may have none
    pub company_id: Option<Uuid>,
}
