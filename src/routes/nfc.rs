//! NFC tag management and on-site access sessions.
//!
//! Tags are bound to a single object. Scanning a tag at the site entrance
//! opens a time-boxed access session; the scan itself is journaled so the
//! visit history can be replayed per object and per day.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::response::{Created, DataResponse, MessageResponse, NoContent};
use crate::auth::RequireAuth;
use crate::domain::nfc::sequential_label;
use crate::error::ApiError;
use crate::services::presence;
use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterTagRequest {
    pub uid: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameTagRequest {
    pub label: String,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub uid: String,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct TagResponse {
    pub id: Uuid,
    pub uid: String,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ScanVerified {
    pub access_expires_at: DateTime<Utc>,
}

/// POST /api/objects/:object_id/nfc
///
/// Registers a physical tag on an object. The uid comes from the tag
/// hardware; labels are assigned sequentially per object.
pub async fn register_tag(
    State(state): State<Arc<AppState>>,
    Path(object_id): Path<Uuid>,
    RequireAuth(user): RequireAuth,
    Json(req): Json<RegisterTagRequest>,
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

    let uid_taken: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM nfc_tags WHERE uid = $1)")
            .bind(&req.uid)
            .fetch_one(&mut *tx)
            .await?;
    if uid_taken {
        return Err(ApiError::conflict("NFC uid is already registered"));
    }

    let tag_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM nfc_tags WHERE object_id = $1")
        .bind(object_id)
        .fetch_one(&mut *tx)
        .await?;
    let label = sequential_label(tag_count as u32 + 1);

    let tag: TagResponse = sqlx::query_as(
        r#"
        INSERT INTO nfc_tags (id, object_id, uid, label)
        VALUES ($1, $2, $3, $4)
        RETURNING id, uid, label, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(object_id)
    .bind(&req.uid)
    .bind(&label)
    .fetch_one(&mut *tx)
    .await?;

    // The registering scan counts as a visit.
    sqlx::query("INSERT INTO nfc_scan_history (id, tag_id, user_id) VALUES ($1, $2, $3)")
        .bind(Uuid::new_v4())
        .bind(tag.id)
        .bind(user.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(object_id = %object_id, tag_id = %tag.id, label = %label, "NFC tag registered");

    Ok(Created(DataResponse::new(tag)))
}

/// GET /api/objects/:object_id/nfc
///
/// Lists the tags registered on an object.
pub async fn list_tags(
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

    let tags: Vec<TagResponse> = sqlx::query_as(
        "SELECT id, uid, label, created_at FROM nfc_tags WHERE object_id = $1 ORDER BY created_at",
    )
    .bind(object_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(DataResponse::new(tags)))
}

/// PATCH /api/nfc/:nfc_id
///
/// Renames a tag. Labels stay unique within the owning object.
pub async fn rename_tag(
    State(state): State<Arc<AppState>>,
    Path(nfc_id): Path<Uuid>,
    _auth: RequireAuth,
    Json(req): Json<RenameTagRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = state.db.begin().await?;

    let object_id: Uuid = sqlx::query_scalar("SELECT object_id FROM nfc_tags WHERE id = $1")
        .bind(nfc_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("NFC tag not found"))?;

    let label_taken: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM nfc_tags WHERE object_id = $1 AND label = $2 AND id <> $3)",
    )
    .bind(object_id)
    .bind(&req.label)
    .bind(nfc_id)
    .fetch_one(&mut *tx)
    .await?;
    if label_taken {
        return Err(ApiError::conflict("Label is already used on this object"));
    }

    let tag: TagResponse = sqlx::query_as(
        "UPDATE nfc_tags SET label = $1 WHERE id = $2 RETURNING id, uid, label, created_at",
    )
    .bind(&req.label)
    .bind(nfc_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Json(DataResponse::new(tag)))
}

/// DELETE /api/nfc/:nfc_id
///
/// Removes a tag and its scan journal.
pub async fn delete_tag(
    State(state): State<Arc<AppState>>,
    Path(nfc_id): Path<Uuid>,
    _auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let result = sqlx::query("DELETE FROM nfc_tags WHERE id = $1")
        .bind(nfc_id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("NFC tag not found"));
    }

    tracing::info!(tag_id = %nfc_id, "NFC tag deleted");

    Ok(NoContent)
}

/// POST /api/objects/:object_id/nfc/verify
///
/// Confirms a tag scan at the given object. A successful scan opens (or
/// extends) the scanner's access session and is appended to the journal.
pub async fn verify_scan(
    State(state): State<Arc<AppState>>,
    Path(object_id): Path<Uuid>,
    RequireAuth(user): RequireAuth,
    Json(req): Json<ScanRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = state.db.begin().await?;

    let tag_id: Uuid =
        sqlx::query_scalar("SELECT id FROM nfc_tags WHERE uid = $1 AND object_id = $2")
            .bind(&req.uid)
            .bind(object_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ApiError::not_found("NFC tag not found"))?;

    let access_expires_at = presence::issue_grant(
        &mut tx,
        user.id,
        object_id,
        state.settings.access_window_minutes,
    )
    .await?;

    sqlx::query("INSERT INTO nfc_scan_history (id, tag_id, user_id) VALUES ($1, $2, $3)")
        .bind(Uuid::new_v4())
        .bind(tag_id)
        .bind(user.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Json(DataResponse::new(ScanVerified { access_expires_at })))
}

/// DELETE /api/objects/:object_id/nfc/session
///
/// Closes the caller's access session on an object ahead of its expiry.
pub async fn terminate_session(
    State(state): State<Arc<AppState>>,
    Path(object_id): Path<Uuid>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = state.db.begin().await?;
    presence::terminate(&mut tx, user.id, object_id).await?;
    tx.commit().await?;

    Ok(Json(MessageResponse::new("Access session terminated")))
}

#[derive(Debug, sqlx::FromRow)]
struct ScanRow {
    using_id: String,
    title: String,
    label: String,
    scanned_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ScanEntry {
    pub label: String,
    pub scanned_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DayScans {
    pub date: NaiveDate,
    pub scans: Vec<ScanEntry>,
}

#[derive(Debug, Serialize)]
pub struct ObjectScanHistory {
    pub title: String,
    pub using_id: String,
    pub days: Vec<DayScans>,
}

/// GET /api/nfc/history
///
/// The caller's scan journal across every object, newest first.
pub async fn scan_history(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let rows = fetch_history(&state, user.id, None).await?;
    Ok(Json(DataResponse::new(group_history(rows))))
}

/// GET /api/objects/:object_id/nfc/history
///
/// The caller's scan journal restricted to one object.
pub async fn object_scan_history(
    State(state): State<Arc<AppState>>,
    Path(object_id): Path<Uuid>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let object_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM objects WHERE id = $1)")
            .bind(object_id)
            .fetch_one(&state.db)
            .await?;
    if !object_exists {
        return Err(ApiError::not_found("Object not found"));
    }

    let rows = fetch_history(&state, user.id, Some(object_id)).await?;
    Ok(Json(DataResponse::new(group_history(rows))))
}

async fn fetch_history(
    state: &AppState,
    user_id: Uuid,
    object_id: Option<Uuid>,
) -> Result<Vec<ScanRow>, ApiError> {
    let rows: Vec<ScanRow> = sqlx::query_as(
        r#"
        SELECT o.using_id, o.title, t.label, h.created_at AS scanned_at
        FROM nfc_scan_history h
        JOIN nfc_tags t ON t.id = h.tag_id
        JOIN objects o ON o.id = t.object_id
        WHERE h.user_id = $1 AND ($2::uuid IS NULL OR t.object_id = $2)
        ORDER BY h.created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(object_id)
    .fetch_all(&state.db)
    .await?;
    Ok(rows)
}

/// Folds a newest-first scan list into per-object, per-day buckets.
/// Objects keep the order of their most recent scan; days inside an
/// object are sorted newest first as well.
fn group_history(rows: Vec<ScanRow>) -> Vec<ObjectScanHistory> {
    let mut objects: Vec<ObjectScanHistory> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let slot = match index.get(&row.using_id) {
            Some(i) => *i,
            None => {
                index.insert(row.using_id.clone(), objects.len());
                objects.push(ObjectScanHistory {
                    title: row.title.clone(),
                    using_id: row.using_id.clone(),
                    days: Vec::new(),
                });
                objects.len() - 1
            }
        };

        let date = row.scanned_at.date_naive();
        let entry = ScanEntry {
            label: row.label,
            scanned_at: row.scanned_at,
        };

        let days = &mut objects[slot].days;
        match days.iter_mut().find(|d| d.date == date) {
            Some(day) => day.scans.push(entry),
            None => days.push(DayScans {
                date,
                scans: vec![entry],
            }),
        }
    }

    for object in &mut objects {
        object.days.sort_by(|a, b| b.date.cmp(&a.date));
    }

    objects
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(using_id: &str, title: &str, label: &str, ts: &str) -> ScanRow {
        ScanRow {
            using_id: using_id.to_string(),
            title: title.to_string(),
            label: label.to_string(),
            scanned_at: ts.parse().unwrap(),
        }
    }

    #[test]
    fn history_groups_by_object_and_day() {
        let rows = vec![
            row("OBJ-A1B2C3", "North tower", "NFC-2", "2026-03-02T09:30:00Z"),
            row("OBJ-A1B2C3", "North tower", "NFC-1", "2026-03-02T08:00:00Z"),
            row("OBJ-D4E5F6", "Warehouse", "NFC-1", "2026-03-01T17:45:00Z"),
            row("OBJ-A1B2C3", "North tower", "NFC-1", "2026-03-01T07:15:00Z"),
        ];

        let grouped = group_history(rows);
        assert_eq!(grouped.len(), 2);

        let tower = &grouped[0];
        assert_eq!(tower.using_id, "OBJ-A1B2C3");
        assert_eq!(tower.days.len(), 2);
        assert_eq!(tower.days[0].date, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert_eq!(tower.days[0].scans.len(), 2);
        assert_eq!(tower.days[0].scans[0].label, "NFC-2");
        assert_eq!(tower.days[1].scans.len(), 1);

        let warehouse = &grouped[1];
        assert_eq!(warehouse.using_id, "OBJ-D4E5F6");
        assert_eq!(warehouse.days.len(), 1);
    }

    #[test]
    fn empty_history_yields_no_groups() {
        assert!(group_history(Vec::new()).is_empty());
    }
}
