//! Violation workflow endpoints.

use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;

use crate::auth::RequireAuth;
use crate::domain::inspections::InspectionKind;
use crate::error::ApiError;
use crate::routes::inspections::{self, ReviewRequest};
use crate::app::AppState;

/// POST /api/objects/:object_id/violations
///
/// Files a batch of violations against an object. Requires confirmed
/// presence at the site.
pub async fn create_violations(
    State(state): State<Arc<AppState>>,
    Path(object_id): Path<Uuid>,
    headers: HeaderMap,
    RequireAuth(user): RequireAuth,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    inspections::file_container(
        state,
        InspectionKind::Violation,
        object_id,
        &headers,
        user,
        multipart,
    )
    .await
}

/// GET /api/objects/:object_id/violations
///
/// Violation containers filed against an object.
pub async fn list_violations(
    State(state): State<Arc<AppState>>,
    Path(object_id): Path<Uuid>,
    _auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    inspections::list_containers(state, InspectionKind::Violation, object_id).await
}

/// GET /api/violations/:container_id
///
/// One violation container with its items, photos and answers.
pub async fn violation_detail(
    State(state): State<Arc<AppState>>,
    Path(container_id): Path<Uuid>,
    _auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    inspections::container_detail(state, InspectionKind::Violation, container_id).await
}

/// POST /api/violations/items/:item_id/answer
///
/// Contractor answer to a single violation item.
pub async fn answer_violation(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<Uuid>,
    _auth: RequireAuth,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    inspections::answer_item(state, InspectionKind::Violation, item_id, multipart).await
}

/// POST /api/violations/items/:item_id/review
///
/// Accept or deny an answered violation item.
pub async fn review_violation(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<Uuid>,
    _auth: RequireAuth,
    Json(req): Json<ReviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    inspections::review(state, InspectionKind::Violation, item_id, req).await
}
