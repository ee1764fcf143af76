//! Shared implementation behind the remark and violation endpoints.
//!
//! Both workflows run on the same tables and state machine, so the
//! handlers in `routes/remarks.rs` and `routes/violations.rs` delegate
//! here with their `InspectionKind` bound. Filing a container is gated
//! by the presence rule: inside the geofence, or holding a live access
//! grant from an NFC scan.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::Multipart;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::response::{Created, DataResponse};
use crate::auth::CurrentUser;
use crate::domain::inspections::{InspectionKind, ItemStatus, ReviewAction};
use crate::error::ApiError;
use crate::routes::coordinate_headers;
use crate::services::inspections::{self, NewInspectionItem};
use crate::services::presence;
use crate::app::AppState;

#[derive(Debug, Deserialize)]
struct ItemPayload {
    violation_text: String,
    regulatory_doc: String,
    #[serde(default)]
    comment: Option<String>,
    expiration_date: DateTime<Utc>,
    #[serde(default)]
    photo_keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AnswerPayload {
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub action: ReviewAction,
}

#[derive(Debug, Serialize)]
pub struct ItemCreated {
    pub id: Uuid,
    pub status: ItemStatus,
}

#[derive(Debug, Serialize)]
pub struct ContainerCreated {
    pub id: Uuid,
    pub status: ItemStatus,
    pub expiration_date: DateTime<Utc>,
    pub items: Vec<ItemCreated>,
}

#[derive(Debug, sqlx::FromRow)]
struct ContainerListRow {
    id: Uuid,
    object_title: String,
    responsible_full_name: Option<String>,
    status: String,
    raised_at: DateTime<Utc>,
    expiration_date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ContainerListItem {
    pub id: Uuid,
    pub object_title: String,
    pub responsible_full_name: Option<String>,
    pub status: ItemStatus,
    pub raised_at: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
}

impl From<ContainerListRow> for ContainerListItem {
    fn from(row: ContainerListRow) -> Self {
        Self {
            id: row.id,
            object_title: row.object_title,
            responsible_full_name: row.responsible_full_name,
            status: ItemStatus::from_db(&row.status),
            raised_at: row.raised_at,
            expiration_date: row.expiration_date,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnswerDetail {
    pub id: Uuid,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub files: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ItemDetail {
    pub id: Uuid,
    pub violation_text: String,
    pub regulatory_doc: String,
    pub comment: Option<String>,
    pub status: ItemStatus,
    pub expiration_date: DateTime<Utc>,
    pub photos: Vec<String>,
    pub answer: Option<AnswerDetail>,
}

#[derive(Debug, Serialize)]
pub struct ContainerDetail {
    pub id: Uuid,
    pub status: ItemStatus,
    pub raised_at: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
    pub object_title: String,
    pub items: Vec<ItemDetail>,
}

#[derive(Debug, Serialize)]
pub struct AnswerSubmitted {
    pub id: Uuid,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub files: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub item_id: Uuid,
    pub item_status: ItemStatus,
    pub container_id: Uuid,
    pub container_status: ItemStatus,
}

fn missing_container(kind: InspectionKind) -> ApiError {
    match kind {
        InspectionKind::Remark => ApiError::not_found("Remark not found"),
        InspectionKind::Violation => ApiError::not_found("Violation not found"),
    }
}

fn missing_item(kind: InspectionKind) -> ApiError {
    match kind {
        InspectionKind::Remark => ApiError::not_found("Remark item not found"),
        InspectionKind::Violation => ApiError::not_found("Violation item not found"),
    }
}

fn photo_folder(kind: InspectionKind) -> &'static str {
    match kind {
        InspectionKind::Remark => "remarks/photos",
        InspectionKind::Violation => "violations/photos",
    }
}

fn answer_folder(kind: InspectionKind) -> &'static str {
    match kind {
        InspectionKind::Remark => "remarks/answers",
        InspectionKind::Violation => "violations/answers",
    }
}

/// Pulls the `payload` JSON field and every attached file, preserving
/// the order files arrive in.
async fn read_parts<T: serde::de::DeserializeOwned>(
    multipart: &mut Multipart,
    missing: &'static str,
    invalid: &'static str,
) -> Result<(T, Vec<(String, Vec<u8>)>), ApiError> {
    let mut payload: Option<T> = None;
    let mut files: Vec<(String, Vec<u8>)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::bad_request("Malformed multipart payload"))?
    {
        if field.name() == Some("payload") {
            let text = field
                .text()
                .await
                .map_err(|_| ApiError::bad_request("Malformed multipart payload"))?;
            payload = Some(serde_json::from_str(&text).map_err(|_| ApiError::bad_request(invalid))?);
        } else if let Some(name) = field.file_name().map(str::to_string) {
            let data = field
                .bytes()
                .await
                .map_err(|_| ApiError::bad_request("Malformed multipart payload"))?;
            files.push((name, data.to_vec()));
        }
    }

    let payload = payload.ok_or_else(|| ApiError::bad_request(missing))?;
    Ok((payload, files))
}

/// Files a container of findings against an object. Presence is
/// confirmed before any upload; photos are matched to their items by
/// the declared file names and unknown keys are skipped.
pub(crate) async fn file_container(
    state: Arc<AppState>,
    kind: InspectionKind,
    object_id: Uuid,
    headers: &HeaderMap,
    user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Created<DataResponse<ContainerCreated>>, ApiError> {
    let object: Option<(Option<Uuid>, Option<serde_json::Value>)> =
        sqlx::query_as("SELECT responsible_user_id, boundary FROM objects WHERE id = $1")
            .bind(object_id)
            .fetch_optional(&state.db)
            .await?;
    let (responsible_user_id, boundary) =
        object.ok_or_else(|| ApiError::not_found("Object not found"))?;

    let coords = coordinate_headers(headers);
    let mut conn = state.db.acquire().await?;
    presence::confirm_presence(
        &mut conn,
        user.id,
        object_id,
        coords,
        boundary.as_ref(),
        state.settings.geofence_tolerance_meters,
    )
    .await?;
    drop(conn);

    let (payload, files) = read_parts::<Vec<ItemPayload>>(
        &mut multipart,
        "Missing items payload",
        "Invalid items payload",
    )
    .await?;
    let mut files: HashMap<String, Vec<u8>> = files.into_iter().collect();

    let mut items = Vec::with_capacity(payload.len());
    for item in payload {
        let mut photo_urls = Vec::new();
        for key in &item.photo_keys {
            if let Some(data) = files.remove(key) {
                let url = state.storage.upload(photo_folder(kind), key, data).await?;
                photo_urls.push(url);
            }
        }
        items.push(NewInspectionItem {
            violation_text: item.violation_text,
            regulatory_doc: item.regulatory_doc,
            comment: item.comment,
            expiration_date: item.expiration_date,
            photo_urls,
        });
    }

    let mut tx = state.db.begin().await?;
    let container =
        inspections::create_container(&mut tx, kind, object_id, responsible_user_id, items).await?;
    tx.commit().await?;

    Ok(Created(DataResponse::new(ContainerCreated {
        id: container.id,
        status: container.status,
        expiration_date: container.expiration_date,
        items: container
            .items
            .into_iter()
            .map(|item| ItemCreated {
                id: item.id,
                status: item.status,
            })
            .collect(),
    })))
}

/// Containers filed against one object, newest first.
pub(crate) async fn list_containers(
    state: Arc<AppState>,
    kind: InspectionKind,
    object_id: Uuid,
) -> Result<Json<DataResponse<Vec<ContainerListItem>>>, ApiError> {
    let object_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM objects WHERE id = $1)")
            .bind(object_id)
            .fetch_one(&state.db)
            .await?;
    if !object_exists {
        return Err(ApiError::not_found("Object not found"));
    }

    let rows: Vec<ContainerListRow> = sqlx::query_as(
        r#"
        SELECT c.id, o.title AS object_title, u.full_name AS responsible_full_name,
               c.status, c.raised_at, c.expiration_date
        FROM inspection_containers c
        JOIN objects o ON o.id = c.object_id
        LEFT JOIN users u ON u.id = c.responsible_user_id
        WHERE c.object_id = $1 AND c.kind = $2
        ORDER BY c.raised_at DESC
        "#,
    )
    .bind(object_id)
    .bind(kind.as_str())
    .fetch_all(&state.db)
    .await?;

    Ok(Json(DataResponse::new(
        rows.into_iter().map(ContainerListItem::from).collect(),
    )))
}

#[derive(Debug, sqlx::FromRow)]
struct ContainerRow {
    id: Uuid,
    status: String,
    raised_at: DateTime<Utc>,
    expiration_date: DateTime<Utc>,
    object_title: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    violation_text: String,
    regulatory_doc: String,
    comment: Option<String>,
    status: String,
    expiration_date: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ItemPhotoRow {
    item_id: Uuid,
    file_url: String,
}

#[derive(Debug, sqlx::FromRow)]
struct AnswerRow {
    id: Uuid,
    item_id: Uuid,
    comment: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct AnswerFileRow {
    answer_id: Uuid,
    file_url: String,
}

/// One container with its items, their photos and the answers given
/// so far.
pub(crate) async fn container_detail(
    state: Arc<AppState>,
    kind: InspectionKind,
    container_id: Uuid,
) -> Result<Json<DataResponse<ContainerDetail>>, ApiError> {
    let container: ContainerRow = sqlx::query_as(
        r#"
        SELECT c.id, c.status, c.raised_at, c.expiration_date, o.title AS object_title
        FROM inspection_containers c
        JOIN objects o ON o.id = c.object_id
        WHERE c.id = $1 AND c.kind = $2
        "#,
    )
    .bind(container_id)
    .bind(kind.as_str())
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| missing_container(kind))?;

    let items: Vec<ItemRow> = sqlx::query_as(
        r#"
        SELECT id, violation_text, regulatory_doc, comment, status, expiration_date
        FROM inspection_items
        WHERE container_id = $1
        ORDER BY raised_at, id
        "#,
    )
    .bind(container_id)
    .fetch_all(&state.db)
    .await?;

    let item_ids: Vec<Uuid> = items.iter().map(|item| item.id).collect();

    let photos: Vec<ItemPhotoRow> = sqlx::query_as(
        "SELECT item_id, file_url FROM inspection_item_photos WHERE item_id = ANY($1)",
    )
    .bind(&item_ids)
    .fetch_all(&state.db)
    .await?;

    let answers: Vec<AnswerRow> = sqlx::query_as(
        "SELECT id, item_id, comment, created_at FROM inspection_answers WHERE item_id = ANY($1)",
    )
    .bind(&item_ids)
    .fetch_all(&state.db)
    .await?;

    let answer_ids: Vec<Uuid> = answers.iter().map(|answer| answer.id).collect();
    let answer_files: Vec<AnswerFileRow> = sqlx::query_as(
        "SELECT answer_id, file_url FROM inspection_answer_files WHERE answer_id = ANY($1)",
    )
    .bind(&answer_ids)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(DataResponse::new(ContainerDetail {
        id: container.id,
        status: ItemStatus::from_db(&container.status),
        raised_at: container.raised_at,
        expiration_date: container.expiration_date,
        object_title: container.object_title,
        items: assemble_items(items, photos, answers, answer_files),
    })))
}

fn assemble_items(
    items: Vec<ItemRow>,
    photos: Vec<ItemPhotoRow>,
    answers: Vec<AnswerRow>,
    answer_files: Vec<AnswerFileRow>,
) -> Vec<ItemDetail> {
    let mut photos_by_item: HashMap<Uuid, Vec<String>> = HashMap::new();
    for photo in photos {
        photos_by_item
            .entry(photo.item_id)
            .or_default()
            .push(photo.file_url);
    }

    let mut files_by_answer: HashMap<Uuid, Vec<String>> = HashMap::new();
    for file in answer_files {
        files_by_answer
            .entry(file.answer_id)
            .or_default()
            .push(file.file_url);
    }

    let mut answers_by_item: HashMap<Uuid, AnswerRow> = answers
        .into_iter()
        .map(|answer| (answer.item_id, answer))
        .collect();

    items
        .into_iter()
        .map(|item| {
            let answer = answers_by_item.remove(&item.id).map(|answer| AnswerDetail {
                id: answer.id,
                comment: answer.comment,
                created_at: answer.created_at,
                files: files_by_answer.remove(&answer.id).unwrap_or_default(),
            });
            ItemDetail {
                id: item.id,
                violation_text: item.violation_text,
                regulatory_doc: item.regulatory_doc,
                comment: item.comment,
                status: ItemStatus::from_db(&item.status),
                expiration_date: item.expiration_date,
                photos: photos_by_item.remove(&item.id).unwrap_or_default(),
                answer,
            }
        })
        .collect()
}

/// Attaches the contractor's answer to an item and moves it under
/// review. One answer per item.
pub(crate) async fn answer_item(
    state: Arc<AppState>,
    kind: InspectionKind,
    item_id: Uuid,
    mut multipart: Multipart,
) -> Result<Created<DataResponse<AnswerSubmitted>>, ApiError> {
    let item_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM inspection_items i
            JOIN inspection_containers c ON c.id = i.container_id
            WHERE i.id = $1 AND c.kind = $2
        )
        "#,
    )
    .bind(item_id)
    .bind(kind.as_str())
    .fetch_one(&state.db)
    .await?;
    if !item_exists {
        return Err(missing_item(kind));
    }

    let answered: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM inspection_answers WHERE item_id = $1)")
            .bind(item_id)
            .fetch_one(&state.db)
            .await?;
    if answered {
        return Err(ApiError::conflict("Item already has an answer"));
    }

    let (payload, files) = read_parts::<AnswerPayload>(
        &mut multipart,
        "Missing answer payload",
        "Invalid answer payload",
    )
    .await?;

    let mut file_urls = Vec::with_capacity(files.len());
    for (name, data) in files {
        let url = state.storage.upload(answer_folder(kind), &name, data).await?;
        file_urls.push(url);
    }

    let mut tx = state.db.begin().await?;
    let answer_id = inspections::submit_answer(
        &mut tx,
        kind,
        item_id,
        payload.comment.as_deref(),
        file_urls.clone(),
    )
    .await?;
    let created_at: DateTime<Utc> =
        sqlx::query_scalar("SELECT created_at FROM inspection_answers WHERE id = $1")
            .bind(answer_id)
            .fetch_one(&mut *tx)
            .await?;
    tx.commit().await?;

    Ok(Created(DataResponse::new(AnswerSubmitted {
        id: answer_id,
        comment: payload.comment,
        created_at,
        files: file_urls,
    })))
}

/// Inspector verdict on an answered item.
pub(crate) async fn review(
    state: Arc<AppState>,
    kind: InspectionKind,
    item_id: Uuid,
    req: ReviewRequest,
) -> Result<Json<DataResponse<ReviewResponse>>, ApiError> {
    let mut tx = state.db.begin().await?;
    let outcome = inspections::review_item(&mut tx, kind, item_id, req.action).await?;
    tx.commit().await?;

    Ok(Json(DataResponse::new(ReviewResponse {
        item_id: outcome.item_id,
        item_status: outcome.item_status,
        container_id: outcome.container_id,
        container_status: outcome.container_status,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: Uuid, status: &str) -> ItemRow {
        ItemRow {
            id,
            violation_text: "Missing guard rail".to_string(),
            regulatory_doc: "Safety code 12".to_string(),
            comment: None,
            status: status.to_string(),
            expiration_date: "2026-04-01T00:00:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn detail_nests_photos_and_answer_files() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let answer_id = Uuid::new_v4();

        let items = vec![item(first, "REVIEW"), item(second, "NOT_FIXED")];
        let photos = vec![
            ItemPhotoRow {
                item_id: first,
                file_url: "https://cdn/p1.jpg".to_string(),
            },
            ItemPhotoRow {
                item_id: first,
                file_url: "https://cdn/p2.jpg".to_string(),
            },
        ];
        let answers = vec![AnswerRow {
            id: answer_id,
            item_id: first,
            comment: Some("Rail installed".to_string()),
            created_at: "2026-03-20T10:00:00Z".parse().unwrap(),
        }];
        let files = vec![AnswerFileRow {
            answer_id,
            file_url: "https://cdn/fix.jpg".to_string(),
        }];

        let detail = assemble_items(items, photos, answers, files);
        assert_eq!(detail.len(), 2);

        assert_eq!(detail[0].status, ItemStatus::Review);
        assert_eq!(detail[0].photos.len(), 2);
        let answer = detail[0].answer.as_ref().unwrap();
        assert_eq!(answer.files, vec!["https://cdn/fix.jpg".to_string()]);

        assert_eq!(detail[1].status, ItemStatus::NotFixed);
        assert!(detail[1].photos.is_empty());
        assert!(detail[1].answer.is_none());
    }
}
