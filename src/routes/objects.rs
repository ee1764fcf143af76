//! Construction object routes
//!
//! Object registry, activation checklist flow, act upload and
//! geofence checks.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::response::{Created, DataResponse};
use crate::app::AppState;
use crate::auth::{CurrentUser, RequireAuth};
use crate::domain::geofence::Boundary;
use crate::domain::objects::{
    checklist_review_transition, generate_using_id, ActivationAction, ActivationDocStatus,
    ChecklistItemStatus, ObjectStatus, ObjectType, ObjectTypeFilter, ACT_UPLOADED_STATE,
    CHECKLIST_REQUESTED_STATE, NEW_OBJECT_STATE,
};
use crate::domain::nfc::{generate_tag_uid, sequential_label};
use crate::domain::UserRole;
use crate::error::ApiError;
use crate::routes::coordinate_headers;

#[derive(Debug, Deserialize)]
pub struct CreateObjectRequest {
    pub title: String,
    pub city: String,
    #[serde(default)]
    pub general_info: String,
    pub start_date: Option<NaiveDate>,
    pub date_delivery_verification: Option<NaiveDate>,
    /// Boundary rings: one ring `[[lon, lat], …]` or a list of rings.
    pub coords: Value,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ObjectCreated {
    pub id: Uuid,
    pub using_id: String,
    pub status: ObjectStatus,
    pub object_type: ObjectType,
    pub title: String,
    pub city: String,
    pub general_info: String,
    pub start_date: Option<NaiveDate>,
    pub date_delivery_verification: Option<NaiveDate>,
    pub coords: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ResponsibleUser {
    pub id: Uuid,
    pub using_id: i64,
    pub full_name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub role: UserRole,
}

#[derive(Debug, Serialize)]
pub struct ObjectDetail {
    pub id: Uuid,
    pub using_id: String,
    pub status: ObjectStatus,
    pub object_type: ObjectType,
    pub title: String,
    pub city: String,
    pub general_info: String,
    pub start_date: Option<NaiveDate>,
    pub date_delivery_verification: Option<NaiveDate>,
    pub coords: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub responsible_user: Option<ResponsibleUser>,
}

/// Database row for object detail
#[derive(Debug, sqlx::FromRow)]
struct ObjectDetailRow {
    id: Uuid,
    using_id: String,
    status: String,
    object_type: String,
    title: String,
    city: String,
    general_info: String,
    boundary: Option<Value>,
    start_date: Option<NaiveDate>,
    date_delivery_verification: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    responsible_user_id: Option<Uuid>,
    responsible_using_id: Option<i64>,
    responsible_full_name: Option<String>,
    responsible_email: Option<String>,
    responsible_avatar: Option<String>,
    responsible_role: Option<String>,
}

impl From<ObjectDetailRow> for ObjectDetail {
    fn from(row: ObjectDetailRow) -> Self {
        let responsible_user = match (row.responsible_user_id, row.responsible_full_name) {
            (Some(id), Some(full_name)) => Some(ResponsibleUser {
                id,
                using_id: row.responsible_using_id.unwrap_or_default(),
                full_name,
                email: row.responsible_email.unwrap_or_default(),
                avatar: row.responsible_avatar,
                role: UserRole::from_db(row.responsible_role.as_deref().unwrap_or_default()),
            }),
            _ => None,
        };

        Self {
            id: row.id,
            using_id: row.using_id,
            status: ObjectStatus::from_db(&row.status),
            object_type: ObjectType::from_db(&row.object_type),
            title: row.title,
            city: row.city,
            general_info: row.general_info,
            start_date: row.start_date,
            date_delivery_verification: row.date_delivery_verification,
            coords: row.boundary,
            created_at: row.created_at,
            updated_at: row.updated_at,
            responsible_user,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ActBrief {
    pub status: ActivationDocStatus,
    pub file_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResponsibleUserBrief {
    pub id: Uuid,
    pub full_name: String,
}

#[derive(Debug, Serialize)]
pub struct ObjectListItem {
    pub id: Uuid,
    pub using_id: String,
    pub status: ObjectStatus,
    pub object_type: ObjectType,
    pub title: String,
    pub general_info: String,
    pub city: String,
    pub date_delivery_verification: Option<NaiveDate>,
    pub responsible_user: Option<ResponsibleUserBrief>,
    pub act: Option<ActBrief>,
    pub is_nfc: bool,
}

/// Database row for object listing
#[derive(Debug, sqlx::FromRow)]
struct ObjectListRow {
    id: Uuid,
    using_id: String,
    status: String,
    object_type: String,
    title: String,
    general_info: String,
    city: String,
    date_delivery_verification: Option<NaiveDate>,
    responsible_user_id: Option<Uuid>,
    responsible_full_name: Option<String>,
    act_status: Option<String>,
    act_file_url: Option<String>,
    is_nfc: bool,
}

impl From<ObjectListRow> for ObjectListItem {
    fn from(row: ObjectListRow) -> Self {
        let responsible_user = match (row.responsible_user_id, row.responsible_full_name) {
            (Some(id), Some(full_name)) => Some(ResponsibleUserBrief { id, full_name }),
            _ => None,
        };
        let act = row.act_status.map(|status| ActBrief {
            status: ActivationDocStatus::from_db(&status),
            file_url: row.act_file_url,
        });

        Self {
            id: row.id,
            using_id: row.using_id,
            status: ObjectStatus::from_db(&row.status),
            object_type: ObjectType::from_db(&row.object_type),
            title: row.title,
            general_info: row.general_info,
            city: row.city,
            date_delivery_verification: row.date_delivery_verification,
            responsible_user,
            act,
            is_nfc: row.is_nfc,
        }
    }
}

/// Company scope for object listings as `(company_id, contractor_company_id)`
/// filters. Inspection staff see the whole registry; contractors see the
/// objects contracted to their company; construction control sees the
/// requested company, defaulting to their own.
pub(crate) fn list_scope(
    user: &CurrentUser,
    company_id: Option<Uuid>,
) -> Result<(Option<Uuid>, Option<Uuid>), ApiError> {
    match user.role {
        UserRole::Inspection => Ok((None, None)),
        UserRole::Contractor => {
            let company = user
                .company_id
                .ok_or_else(|| ApiError::forbidden("Contractor account has no company"))?;
            Ok((None, Some(company)))
        }
        UserRole::ConstructionControl => {
            let company = company_id
                .or(user.company_id)
                .ok_or_else(|| ApiError::bad_request("company_id is required"))?;
            Ok((Some(company), None))
        }
    }
}

/// POST /api/companies/:company_id/objects
///
/// Register a new construction object. The object starts in the
/// (KNOWN, NOT_ACTIVE) state and gets its first NFC tag so site access
/// can be provisioned before activation.
pub async fn create_object(
    State(state): State<Arc<AppState>>,
    Path(company_id): Path<Uuid>,
    _auth: RequireAuth,
    Json(req): Json<CreateObjectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if Boundary::from_json(&req.coords).is_none() {
        return Err(ApiError::bad_request("Invalid boundary coordinates"));
    }

    let company_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM companies WHERE id = $1)")
            .bind(company_id)
            .fetch_one(&state.db)
            .await?;
    if !company_exists {
        return Err(ApiError::not_found("Company not found"));
    }

    if let Some(category_id) = req.category_id {
        let category_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM object_categories WHERE id = $1)")
                .bind(category_id)
                .fetch_one(&state.db)
                .await?;
        if !category_exists {
            return Err(ApiError::not_found("Object category not found"));
        }
    }

    let (status, object_type) = NEW_OBJECT_STATE;
    let object_id = Uuid::new_v4();
    let using_id = generate_using_id();

    let mut tx = state.db.begin().await?;

    let (created_at, updated_at): (DateTime<Utc>, DateTime<Utc>) = sqlx::query_as(
        r#"
        INSERT INTO objects (id, using_id, company_id, category_id, title, city, general_info,
                             status, object_type, boundary, start_date, date_delivery_verification)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING created_at, updated_at
        "#,
    )
    .bind(object_id)
    .bind(&using_id)
    .bind(company_id)
    .bind(req.category_id)
    .bind(&req.title)
    .bind(&req.city)
    .bind(&req.general_info)
    .bind(status.as_str())
    .bind(object_type.as_str())
    .bind(&req.coords)
    .bind(req.start_date)
    .bind(req.date_delivery_verification)
    .fetch_one(&mut *tx)
    .await?;

    // Every object ships with one tag at the site entrance.
    sqlx::query("INSERT INTO nfc_tags (id, object_id, uid, label) VALUES ($1, $2, $3, $4)")
        .bind(Uuid::new_v4())
        .bind(object_id)
        .bind(generate_tag_uid())
        .bind(sequential_label(1))
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        object_id = %object_id,
        using_id = %using_id,
        company_id = %company_id,
        "Object registered"
    );

    Ok(Created(DataResponse::new(ObjectCreated {
        id: object_id,
        using_id,
        status,
        object_type,
        title: req.title,
        city: req.city,
        general_info: req.general_info,
        start_date: req.start_date,
        date_delivery_verification: req.date_delivery_verification,
        coords: req.coords,
        created_at,
        updated_at,
    })))
}

/// GET /api/objects/:object_id
///
/// Get one object with its boundary and responsible user.
pub async fn get_object(
    State(state): State<Arc<AppState>>,
    Path(object_id): Path<Uuid>,
    _auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let row = sqlx::query_as::<_, ObjectDetailRow>(
        r#"
        SELECT o.id, o.using_id, o.status, o.object_type, o.title, o.city, o.general_info,
               o.boundary, o.start_date, o.date_delivery_verification, o.created_at, o.updated_at,
               u.id AS responsible_user_id, u.using_id AS responsible_using_id,
               u.full_name AS responsible_full_name, u.email AS responsible_email,
               u.avatar AS responsible_avatar, u.role AS responsible_role
        FROM objects o
        LEFT JOIN users u ON u.id = o.responsible_user_id
        WHERE o.id = $1
        "#,
    )
    .bind(object_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Object not found"))?;

    let response: ObjectDetail = row.into();
    Ok(Json(DataResponse::new(response)))
}

#[derive(Debug, Deserialize)]
pub struct ListObjectsParams {
    pub company_id: Option<Uuid>,
    #[serde(default)]
    pub filter: ObjectTypeFilter,
}

/// GET /api/objects
///
/// List objects by classification filter, scoped by the caller's role.
pub async fn list_objects(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListObjectsParams>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let (company_filter, contractor_filter) = list_scope(&user, params.company_id)?;
    let type_filter = params.filter.as_object_type().map(|t| t.as_str());

    let rows = sqlx::query_as::<_, ObjectListRow>(
        r#"
        SELECT o.id, o.using_id, o.status, o.object_type, o.title, o.general_info, o.city,
               o.date_delivery_verification, o.responsible_user_id,
               u.full_name AS responsible_full_name,
               a.status AS act_status, a.file_url AS act_file_url,
               EXISTS(SELECT 1 FROM nfc_tags t WHERE t.object_id = o.id) AS is_nfc
        FROM objects o
        LEFT JOIN users u ON u.id = o.responsible_user_id
        LEFT JOIN acts a ON a.object_id = o.id
        WHERE ($1::text IS NULL OR o.object_type = $1)
          AND ($2::uuid IS NULL OR o.company_id = $2)
          AND ($3::uuid IS NULL OR o.contractor_company_id = $3)
        ORDER BY o.created_at DESC
        "#,
    )
    .bind(type_filter)
    .bind(company_filter)
    .bind(contractor_filter)
    .fetch_all(&state.db)
    .await?;

    let data: Vec<ObjectListItem> = rows.into_iter().map(Into::into).collect();
    Ok(Json(DataResponse::new(data)))
}

#[derive(Debug, Deserialize)]
pub struct CountObjectsParams {
    pub company_id: Option<Uuid>,
    #[serde(default)]
    pub filter: ObjectTypeFilter,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ObjectCount {
    pub count: i64,
}

/// GET /api/objects/count
///
/// Count objects under the same scoping as the listing, optionally
/// narrowed to one category.
pub async fn count_objects(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CountObjectsParams>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(category_id) = params.category_id {
        let category_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM object_categories WHERE id = $1)")
                .bind(category_id)
                .fetch_one(&state.db)
                .await?;
        if !category_exists {
            return Err(ApiError::not_found("Object category not found"));
        }
    }

    let (company_filter, contractor_filter) = list_scope(&user, params.company_id)?;
    let type_filter = params.filter.as_object_type().map(|t| t.as_str());

    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM objects o
        WHERE ($1::text IS NULL OR o.object_type = $1)
          AND ($2::uuid IS NULL OR o.company_id = $2)
          AND ($3::uuid IS NULL OR o.contractor_company_id = $3)
          AND ($4::uuid IS NULL OR o.category_id = $4)
        "#,
    )
    .bind(type_filter)
    .bind(company_filter)
    .bind(contractor_filter)
    .bind(params.category_id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(DataResponse::new(ObjectCount { count })))
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ObjectCategory {
    pub id: Uuid,
    pub title: String,
}

/// GET /api/objects/categories
///
/// List all object categories.
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    _auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let categories = sqlx::query_as::<_, ObjectCategory>(
        "SELECT id, title FROM object_categories ORDER BY title",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(DataResponse::new(categories)))
}

#[derive(Debug, Serialize)]
pub struct GeoCheckResponse {
    pub result: &'static str,
}

/// GET /api/objects/:object_id/geo-check
///
/// Check the caller's device coordinates against the object boundary.
/// Pure geofence check; the NFC grant fallback does not apply here.
pub async fn check_geo(
    State(state): State<Arc<AppState>>,
    Path(object_id): Path<Uuid>,
    headers: HeaderMap,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let boundary: Option<Value> =
        sqlx::query_scalar::<_, Option<Value>>("SELECT boundary FROM objects WHERE id = $1")
            .bind(object_id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| ApiError::not_found("Object not found"))?;

    let (lat, lon) = coordinate_headers(&headers)
        .ok_or_else(|| ApiError::bad_request("Missing latitude/longitude headers"))?;

    let inside = boundary
        .as_ref()
        .and_then(Boundary::from_json)
        .map(|b| b.is_within_tolerance(lat, lon, state.settings.geofence_tolerance_meters))
        .unwrap_or(false);

    if !inside {
        tracing::debug!(
            object_id = %object_id,
            user_id = %user.id,
            lat,
            lon,
            "Geofence check rejected"
        );
        return Err(ApiError::bad_request(
            "Coordinates are outside the object boundary",
        ));
    }

    Ok(Json(GeoCheckResponse { result: "success" }))
}

#[derive(Debug, Deserialize)]
pub struct ChecklistDocumentInput {
    pub code: String,
    pub title: String,
    pub status: ChecklistItemStatus,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateChecklistRequest {
    pub contractor_id: Uuid,
    pub date_verification: NaiveDate,
    pub documents: Vec<ChecklistDocumentInput>,
}

#[derive(Debug, Serialize)]
pub struct ChecklistCreated {
    pub id: Uuid,
    pub status: ActivationDocStatus,
    pub date_verification: NaiveDate,
}

/// POST /api/objects/:object_id/activation/checklist
///
/// Request object activation: assign the contractor, record the
/// pre-activation checklist and move the object to agreement.
pub async fn create_checklist(
    State(state): State<Arc<AppState>>,
    Path(object_id): Path<Uuid>,
    _auth: RequireAuth,
    Json(req): Json<CreateChecklistRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = state.db.begin().await?;

    let object_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM objects WHERE id = $1)")
            .bind(object_id)
            .fetch_one(&mut *tx)
            .await?;
    if !object_exists {
        return Err(ApiError::not_found("Object not found"));
    }

    let contractor: Option<(String, Option<Uuid>)> =
        sqlx::query_as("SELECT role, company_id FROM users WHERE id = $1")
            .bind(req.contractor_id)
            .fetch_optional(&mut *tx)
            .await?;
    let (role, contractor_company_id) = contractor
        .ok_or_else(|| ApiError::not_found("Contractor not found"))?;
    if UserRole::from_db(&role) != UserRole::Contractor {
        return Err(ApiError::forbidden("Assignee must have the contractor role"));
    }

    let existing: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM checklists WHERE object_id = $1")
            .bind(object_id)
            .fetch_optional(&mut *tx)
            .await?;
    if existing.is_some() {
        return Err(ApiError::conflict(
            "Object already has an activation checklist",
        ));
    }

    let (status, object_type) = CHECKLIST_REQUESTED_STATE;
    sqlx::query(
        r#"
        UPDATE objects
        SET responsible_user_id = $2, contractor_company_id = $3,
            status = $4, object_type = $5, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(object_id)
    .bind(req.contractor_id)
    .bind(contractor_company_id)
    .bind(status.as_str())
    .bind(object_type.as_str())
    .execute(&mut *tx)
    .await?;

    let checklist_id = Uuid::new_v4();
    let checklist_status = ActivationDocStatus::Awaiting;
    sqlx::query(
        "INSERT INTO checklists (id, object_id, status, date_verification) VALUES ($1, $2, $3, $4)",
    )
    .bind(checklist_id)
    .bind(object_id)
    .bind(checklist_status.as_str())
    .bind(req.date_verification)
    .execute(&mut *tx)
    .await?;

    for doc in &req.documents {
        sqlx::query(
            r#"
            INSERT INTO checklist_documents (id, checklist_id, code, title, status, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(checklist_id)
        .bind(&doc.code)
        .bind(&doc.title)
        .bind(doc.status.as_str())
        .bind(&doc.description)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        object_id = %object_id,
        contractor_id = %req.contractor_id,
        "Activation checklist requested"
    );

    Ok(Created(DataResponse::new(ChecklistCreated {
        id: checklist_id,
        status: checklist_status,
        date_verification: req.date_verification,
    })))
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ChecklistDocument {
    pub id: Uuid,
    pub code: String,
    pub title: String,
    pub status: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChecklistDetail {
    pub id: Uuid,
    pub status: ActivationDocStatus,
    pub date_verification: Option<NaiveDate>,
    pub responsible_full_name: Option<String>,
    pub contractor_title: Option<String>,
    pub act: Option<ActBrief>,
    pub documents: Vec<ChecklistDocument>,
}

/// Database row for checklist detail
#[derive(Debug, sqlx::FromRow)]
struct ChecklistRow {
    id: Uuid,
    status: String,
    date_verification: Option<NaiveDate>,
    responsible_full_name: Option<String>,
    contractor_title: Option<String>,
    act_status: Option<String>,
    act_file_url: Option<String>,
}

/// GET /api/objects/:object_id/activation/checklist
///
/// Get the activation checklist with its documents, the assigned
/// contractor and act state.
pub async fn get_checklist(
    State(state): State<Arc<AppState>>,
    Path(object_id): Path<Uuid>,
    _auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let object_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM objects WHERE id = $1)")
            .bind(object_id)
            .fetch_one(&state.db)
            .await?;
    if !object_exists {
        return Err(ApiError::not_found("Object not found"));
    }

    let row = sqlx::query_as::<_, ChecklistRow>(
        r#"
        SELECT c.id, c.status, c.date_verification,
               u.full_name AS responsible_full_name,
               comp.title AS contractor_title,
               a.status AS act_status, a.file_url AS act_file_url
        FROM checklists c
        JOIN objects o ON o.id = c.object_id
        LEFT JOIN users u ON u.id = o.responsible_user_id
        LEFT JOIN companies comp ON comp.id = o.contractor_company_id
        LEFT JOIN acts a ON a.object_id = o.id
        WHERE c.object_id = $1
        "#,
    )
    .bind(object_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Activation checklist not found"))?;

    let documents = sqlx::query_as::<_, ChecklistDocument>(
        r#"
        SELECT id, code, title, status, description
        FROM checklist_documents
        WHERE checklist_id = $1
        ORDER BY code
        "#,
    )
    .bind(row.id)
    .fetch_all(&state.db)
    .await?;

    let act = row.act_status.map(|status| ActBrief {
        status: ActivationDocStatus::from_db(&status),
        file_url: row.act_file_url,
    });

    Ok(Json(DataResponse::new(ChecklistDetail {
        id: row.id,
        status: ActivationDocStatus::from_db(&row.status),
        date_verification: row.date_verification,
        responsible_full_name: row.responsible_full_name,
        contractor_title: row.contractor_title,
        act,
        documents,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ChecklistReviewRequest {
    pub action: ActivationAction,
}

#[derive(Debug, Serialize)]
pub struct ObjectStateChanged {
    pub id: Uuid,
    pub using_id: String,
    pub status: ObjectStatus,
    pub object_type: ObjectType,
    pub updated_at: DateTime<Utc>,
}

/// POST /api/objects/:object_id/activation/checklist/review
///
/// Accept or deny the activation checklist. Accept opens the act stage
/// and creates the act record; deny resets the object so activation
/// can be requested again.
pub async fn review_checklist(
    State(state): State<Arc<AppState>>,
    Path(object_id): Path<Uuid>,
    _auth: RequireAuth,
    Json(req): Json<ChecklistReviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = state.db.begin().await?;

    // Lock the object row so concurrent reviews serialize.
    let object: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM objects WHERE id = $1 FOR UPDATE")
            .bind(object_id)
            .fetch_optional(&mut *tx)
            .await?;
    if object.is_none() {
        return Err(ApiError::not_found("Object not found"));
    }

    let checklist_id: Uuid = sqlx::query_scalar("SELECT id FROM checklists WHERE object_id = $1")
        .bind(object_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Activation checklist not found"))?;

    let checklist_status = match req.action {
        ActivationAction::Accept => {
            let act_exists: Option<Uuid> =
                sqlx::query_scalar("SELECT id FROM acts WHERE object_id = $1")
                    .bind(object_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if act_exists.is_some() {
                return Err(ApiError::conflict("Object already has an activation act"));
            }

            sqlx::query("INSERT INTO acts (id, object_id, status) VALUES ($1, $2, $3)")
                .bind(Uuid::new_v4())
                .bind(object_id)
                .bind(ActivationDocStatus::Required.as_str())
                .execute(&mut *tx)
                .await?;

            ActivationDocStatus::Accept
        }
        ActivationAction::Deny => ActivationDocStatus::Rejected,
    };

    sqlx::query("UPDATE checklists SET status = $2 WHERE id = $1")
        .bind(checklist_id)
        .bind(checklist_status.as_str())
        .execute(&mut *tx)
        .await?;

    let (status, object_type) = checklist_review_transition(req.action);
    let (using_id, updated_at): (String, DateTime<Utc>) = sqlx::query_as(
        r#"
        UPDATE objects SET status = $2, object_type = $3, updated_at = now()
        WHERE id = $1
        RETURNING using_id, updated_at
        "#,
    )
    .bind(object_id)
    .bind(status.as_str())
    .bind(object_type.as_str())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        object_id = %object_id,
        status = status.as_str(),
        object_type = object_type.as_str(),
        "Activation checklist reviewed"
    );

    Ok(Json(DataResponse::new(ObjectStateChanged {
        id: object_id,
        using_id,
        status,
        object_type,
        updated_at,
    })))
}

#[derive(Debug, Serialize)]
pub struct ActUpdated {
    pub id: Uuid,
    pub status: ActivationDocStatus,
    pub file_url: String,
}

/// Pull the first file out of a multipart body.
async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Vec<u8>), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::bad_request("Malformed multipart payload"))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field
            .bytes()
            .await
            .map_err(|_| ApiError::bad_request("Malformed multipart payload"))?;
        return Ok((file_name, data.to_vec()));
    }
    Err(ApiError::bad_request("No file provided"))
}

/// POST /api/objects/:object_id/activation/act/file
///
/// Upload the signed opening act. Only valid while the object awaits
/// its act; activates the object on success.
pub async fn upload_act_file(
    State(state): State<Arc<AppState>>,
    Path(object_id): Path<Uuid>,
    _auth: RequireAuth,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let status: String = sqlx::query_scalar("SELECT status FROM objects WHERE id = $1")
        .bind(object_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Object not found"))?;
    if ObjectStatus::from_db(&status) != ObjectStatus::Act {
        return Err(ApiError::bad_request(
            "Object is not awaiting an activation act",
        ));
    }

    let act_id: Uuid = sqlx::query_scalar("SELECT id FROM acts WHERE object_id = $1")
        .bind(object_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Activation act not found"))?;

    let (file_name, data) = read_file_field(&mut multipart).await?;
    let file_url = state.storage.upload("objects/files", &file_name, data).await?;

    let (status, object_type) = ACT_UPLOADED_STATE;
    let mut tx = state.db.begin().await?;

    sqlx::query("UPDATE acts SET status = $2, file_url = $3 WHERE id = $1")
        .bind(act_id)
        .bind(ActivationDocStatus::Accept.as_str())
        .bind(&file_url)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "UPDATE objects SET status = $2, object_type = $3, updated_at = now() WHERE id = $1",
    )
    .bind(object_id)
    .bind(status.as_str())
    .bind(object_type.as_str())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(object_id = %object_id, "Object activated");

    Ok(Created(DataResponse::new(ActUpdated {
        id: act_id,
        status: ActivationDocStatus::Accept,
        file_url,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole, company_id: Option<Uuid>) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            using_id: 1001,
            full_name: "Test User".into(),
            email: "user@example.com".into(),
            avatar: None,
            role,
            company_id,
        }
    }

    #[test]
    fn inspection_sees_whole_registry() {
        let scope = list_scope(&user(UserRole::Inspection, None), Some(Uuid::new_v4())).unwrap();
        assert_eq!(scope, (None, None));
    }

    #[test]
    fn contractor_is_pinned_to_own_company() {
        let company = Uuid::new_v4();
        let requested = Uuid::new_v4();
        let scope = list_scope(&user(UserRole::Contractor, Some(company)), Some(requested)).unwrap();
        assert_eq!(scope, (None, Some(company)));
    }

    #[test]
    fn contractor_without_company_is_rejected() {
        let result = list_scope(&user(UserRole::Contractor, None), None);
        assert!(matches!(result, Err(ApiError::Forbidden(_))));
    }

    #[test]
    fn control_prefers_requested_company() {
        let own = Uuid::new_v4();
        let requested = Uuid::new_v4();
        let scope = list_scope(
            &user(UserRole::ConstructionControl, Some(own)),
            Some(requested),
        )
        .unwrap();
        assert_eq!(scope, (Some(requested), None));

        let fallback = list_scope(&user(UserRole::ConstructionControl, Some(own)), None).unwrap();
        assert_eq!(fallback, (Some(own), None));
    }
}
