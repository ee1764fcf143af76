//! Remark workflow endpoints.

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

/// POST /api/objects/:object_id/remarks
///
/// Files a batch of remarks against an object. Requires confirmed
/// presence at the site.
pub async fn create_remarks(
    State(state): State<Arc<AppState>>,
    Path(object_id): Path<Uuid>,
    headers: HeaderMap,
    RequireAuth(user): RequireAuth,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    inspections::file_container(state, InspectionKind::Remark, object_id, &headers, user, multipart)
        .await
}

/// GET /api/objects/:object_id/remarks
///
/// Remark containers filed against an object.
pub async fn list_remarks(
    State(state): State<Arc<AppState>>,
    Path(object_id): Path<Uuid>,
    _auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    inspections::list_containers(state, InspectionKind::Remark, object_id).await
}

/// GET /api/remarks/:container_id
///
/// One remark container with its items, photos and answers.
pub async fn remark_detail(
    State(state): State<Arc<AppState>>,
    Path(container_id): Path<Uuid>,
    _auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    inspections::container_detail(state, InspectionKind::Remark, container_id).await
}

/// POST /api/remarks/items/:item_id/answer
///
/// Contractor answer to a single remark item.
pub async fn answer_remark(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<Uuid>,
    _auth: RequireAuth,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    inspections::answer_item(state, InspectionKind::Remark, item_id, multipart).await
}

/// POST /api/remarks/items/:item_id/review
///
/// Accept or deny an answered remark item.
pub async fn review_remark(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<Uuid>,
    _auth: RequireAuth,
    Json(req): Json<ReviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    inspections::review(state, InspectionKind::Remark, item_id, req).await
}
