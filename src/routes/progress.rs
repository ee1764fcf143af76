//! Work progress routes
//!
//! Progress records and stages, delivery submissions and the
//! verification decisions that drive percent aggregation.

use axum::{
    extract::{Multipart, Path, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::response::{Created, DataResponse};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::progress::{
    object_percent, volume_percent, StageMainStatus, StageReviewStatus, WorkDecision,
    WorkItemStatus,
};
use crate::error::ApiError;
use crate::services::progress;

fn decimal_to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

#[derive(Debug, Deserialize)]
pub struct StageInput {
    pub title: String,
    pub unit: String,
    #[serde(default)]
    pub target_volume: i32,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRecordRequest {
    pub title: String,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    #[serde(default)]
    pub stages: Vec<StageInput>,
}

#[derive(Debug, Serialize)]
pub struct StageSummary {
    pub id: Uuid,
    pub title: String,
    pub unit: String,
    pub target_volume: i32,
    pub percent: f64,
    pub status_main: StageMainStatus,
    pub status_second: StageReviewStatus,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct ProgressRecordResponse {
    pub id: Uuid,
    pub title: String,
    pub percent: f64,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub stages: Vec<StageSummary>,
}

/// Database row for stage
#[derive(Debug, sqlx::FromRow)]
struct StageRow {
    id: Uuid,
    progress_record_id: Uuid,
    title: String,
    unit: String,
    target_volume: i32,
    percent: Decimal,
    status_main: String,
    status_second: String,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
}

impl From<StageRow> for StageSummary {
    fn from(row: StageRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            unit: row.unit,
            target_volume: row.target_volume,
            percent: decimal_to_f64(row.percent),
            status_main: StageMainStatus::from_db(&row.status_main),
            status_second: StageReviewStatus::from_db(&row.status_second),
            date_from: row.date_from,
            date_to: row.date_to,
        }
    }
}

/// Database row for progress record
#[derive(Debug, sqlx::FromRow)]
struct RecordRow {
    id: Uuid,
    title: String,
    percent: Decimal,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
}

async fn ensure_object_exists(state: &AppState, object_id: Uuid) -> Result<(), ApiError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM objects WHERE id = $1)")
        .bind(object_id)
        .fetch_one(&state.db)
        .await?;
    if !exists {
        return Err(ApiError::not_found("Object not found"));
    }
    Ok(())
}

/// POST /api/objects/:object_id/progress
///
/// Create a progress record with its planned stages. Stages start at
/// zero percent, not yet begun.
pub async fn create_record(
    State(state): State<Arc<AppState>>,
    Path(object_id): Path<Uuid>,
    _auth: RequireAuth,
    Json(req): Json<CreateRecordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_object_exists(&state, object_id).await?;

    let record_id = Uuid::new_v4();
    let mut tx = state.db.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO progress_records (id, object_id, title, percent, date_from, date_to)
        VALUES ($1, $2, $3, 0, $4, $5)
        "#,
    )
    .bind(record_id)
    .bind(object_id)
    .bind(&req.title)
    .bind(req.date_from)
    .bind(req.date_to)
    .execute(&mut *tx)
    .await?;

    let mut stages = Vec::with_capacity(req.stages.len());
    for stage in &req.stages {
        let stage_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO stages (id, progress_record_id, title, unit, target_volume,
                                percent, status_main, status_second, date_from, date_to)
            VALUES ($1, $2, $3, $4, $5, 0, $6, $7, $8, $9)
            "#,
        )
        .bind(stage_id)
        .bind(record_id)
        .bind(&stage.title)
        .bind(&stage.unit)
        .bind(stage.target_volume)
        .bind(StageMainStatus::NotStarted.as_str())
        .bind(StageReviewStatus::None.as_str())
        .bind(stage.date_from)
        .bind(stage.date_to)
        .execute(&mut *tx)
        .await?;

        stages.push(StageSummary {
            id: stage_id,
            title: stage.title.clone(),
            unit: stage.unit.clone(),
            target_volume: stage.target_volume,
            percent: 0.0,
            status_main: StageMainStatus::NotStarted,
            status_second: StageReviewStatus::None,
            date_from: stage.date_from,
            date_to: stage.date_to,
        });
    }

    tx.commit().await?;

    tracing::info!(
        record_id = %record_id,
        object_id = %object_id,
        stages = stages.len(),
        "Progress record created"
    );

    Ok(Created(DataResponse::new(ProgressRecordResponse {
        id: record_id,
        title: req.title,
        percent: 0.0,
        date_from: req.date_from,
        date_to: req.date_to,
        stages,
    })))
}

/// GET /api/objects/:object_id/progress
///
/// List the object's progress records with their stages.
pub async fn list_records(
    State(state): State<Arc<AppState>>,
    Path(object_id): Path<Uuid>,
    _auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    ensure_object_exists(&state, object_id).await?;

    let records = sqlx::query_as::<_, RecordRow>(
        r#"
        SELECT id, title, percent, date_from, date_to
        FROM progress_records
        WHERE object_id = $1
        ORDER BY date_from NULLS LAST, title
        "#,
    )
    .bind(object_id)
    .fetch_all(&state.db)
    .await?;

    let record_ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
    let stage_rows = sqlx::query_as::<_, StageRow>(
        r#"
        SELECT id, progress_record_id, title, unit, target_volume, percent,
               status_main, status_second, date_from, date_to
        FROM stages
        WHERE progress_record_id = ANY($1)
        ORDER BY date_from NULLS LAST, title
        "#,
    )
    .bind(&record_ids)
    .fetch_all(&state.db)
    .await?;

    let mut by_record: HashMap<Uuid, Vec<StageSummary>> = HashMap::new();
    for row in stage_rows {
        by_record
            .entry(row.progress_record_id)
            .or_default()
            .push(row.into());
    }

    let data: Vec<ProgressRecordResponse> = records
        .into_iter()
        .map(|record| ProgressRecordResponse {
            stages: by_record.remove(&record.id).unwrap_or_default(),
            id: record.id,
            title: record.title,
            percent: decimal_to_f64(record.percent),
            date_from: record.date_from,
            date_to: record.date_to,
        })
        .collect();

    Ok(Json(DataResponse::new(data)))
}

#[derive(Debug, Serialize)]
pub struct ObjectProgress {
    pub percent: f64,
}

/// GET /api/objects/:object_id/progress/total
///
/// Object-wide completion: the mean over all progress records.
pub async fn total_progress(
    State(state): State<Arc<AppState>>,
    Path(object_id): Path<Uuid>,
    _auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    ensure_object_exists(&state, object_id).await?;

    let percents: Vec<Decimal> =
        sqlx::query_scalar("SELECT percent FROM progress_records WHERE object_id = $1")
            .bind(object_id)
            .fetch_all(&state.db)
            .await?;

    Ok(Json(DataResponse::new(ObjectProgress {
        percent: decimal_to_f64(object_percent(&percents)),
    })))
}

#[derive(Debug, Serialize)]
pub struct WorkItemResponse {
    pub id: Uuid,
    pub volume: i32,
    pub description: String,
    pub status: WorkItemStatus,
    pub photos: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct StageDetail {
    pub id: Uuid,
    pub title: String,
    pub unit: String,
    pub target_volume: i32,
    pub percent: f64,
    /// Completed volume in target units, derived from percent.
    pub volume_percent: i64,
    pub status_main: StageMainStatus,
    pub status_second: StageReviewStatus,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub work_items: Vec<WorkItemResponse>,
}

/// Database row for work item
#[derive(Debug, sqlx::FromRow)]
struct WorkItemRow {
    id: Uuid,
    volume: i32,
    description: String,
    status: String,
    created_at: DateTime<Utc>,
}

/// GET /api/progress/stages/:stage_id
///
/// Stage detail: aggregated percent, completed volume and the full
/// delivery log with evidence photos.
pub async fn stage_detail(
    State(state): State<Arc<AppState>>,
    Path(stage_id): Path<Uuid>,
    _auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let stage = sqlx::query_as::<_, StageRow>(
        r#"
        SELECT id, progress_record_id, title, unit, target_volume, percent,
               status_main, status_second, date_from, date_to
        FROM stages
        WHERE id = $1
        "#,
    )
    .bind(stage_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Stage not found"))?;

    let items = sqlx::query_as::<_, WorkItemRow>(
        r#"
        SELECT id, volume, description, status, created_at
        FROM work_items
        WHERE stage_id = $1
        ORDER BY created_at
        "#,
    )
    .bind(stage_id)
    .fetch_all(&state.db)
    .await?;

    let item_ids: Vec<Uuid> = items.iter().map(|i| i.id).collect();
    let photo_rows: Vec<(Uuid, String)> = sqlx::query_as(
        "SELECT work_item_id, file_url FROM work_item_photos WHERE work_item_id = ANY($1)",
    )
    .bind(&item_ids)
    .fetch_all(&state.db)
    .await?;

    let mut photos_by_item: HashMap<Uuid, Vec<String>> = HashMap::new();
    for (item_id, url) in photo_rows {
        photos_by_item.entry(item_id).or_default().push(url);
    }

    let work_items: Vec<WorkItemResponse> = items
        .into_iter()
        .map(|item| WorkItemResponse {
            photos: photos_by_item.remove(&item.id).unwrap_or_default(),
            id: item.id,
            volume: item.volume,
            description: item.description,
            status: WorkItemStatus::from_db(&item.status),
            created_at: item.created_at,
        })
        .collect();

    Ok(Json(DataResponse::new(StageDetail {
        id: stage.id,
        title: stage.title,
        unit: stage.unit,
        target_volume: stage.target_volume,
        percent: decimal_to_f64(stage.percent),
        volume_percent: volume_percent(stage.target_volume as i64, stage.percent),
        status_main: StageMainStatus::from_db(&stage.status_main),
        status_second: StageReviewStatus::from_db(&stage.status_second),
        date_from: stage.date_from,
        date_to: stage.date_to,
        work_items,
    })))
}

#[derive(Debug, Serialize)]
pub struct StageBegun {
    pub id: Uuid,
    pub status_main: StageMainStatus,
}

/// POST /api/progress/stages/:stage_id/begin
///
/// Move a stage from NOT_STARTED into WORK. Idempotent: a stage
/// already under way or passed keeps its status.
pub async fn begin_stage(
    State(state): State<Arc<AppState>>,
    Path(stage_id): Path<Uuid>,
    _auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let updated = sqlx::query(
        "UPDATE stages SET status_main = $2 WHERE id = $1 AND status_main = $3",
    )
    .bind(stage_id)
    .bind(StageMainStatus::Work.as_str())
    .bind(StageMainStatus::NotStarted.as_str())
    .execute(&state.db)
    .await?;

    let status_main: String = sqlx::query_scalar("SELECT status_main FROM stages WHERE id = $1")
        .bind(stage_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Stage not found"))?;

    if updated.rows_affected() > 0 {
        tracing::info!(stage_id = %stage_id, "Stage work begun");
    }

    Ok(Json(DataResponse::new(StageBegun {
        id: stage_id,
        status_main: StageMainStatus::from_db(&status_main),
    })))
}

#[derive(Debug, Deserialize)]
struct DeliveryPayload {
    volume: i32,
    #[serde(default)]
    description: String,
    #[serde(default)]
    photo_keys: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeliverySubmitted {
    pub id: Uuid,
    pub status: WorkItemStatus,
    pub photos: Vec<String>,
}

/// Split a delivery submission body into its JSON payload part and
/// the uploaded files keyed by filename.
async fn read_delivery_parts(
    multipart: &mut Multipart,
) -> Result<(DeliveryPayload, HashMap<String, Vec<u8>>), ApiError> {
    let mut payload: Option<DeliveryPayload> = None;
    let mut files: HashMap<String, Vec<u8>> = HashMap::new();

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
            payload = Some(
                serde_json::from_str(&text)
                    .map_err(|_| ApiError::bad_request("Invalid delivery payload"))?,
            );
        } else if let Some(name) = field.file_name().map(str::to_string) {
            let data = field
                .bytes()
                .await
                .map_err(|_| ApiError::bad_request("Malformed multipart payload"))?;
            files.insert(name, data.to_vec());
        }
    }

    let payload = payload.ok_or_else(|| ApiError::bad_request("Missing delivery payload"))?;
    Ok((payload, files))
}

/// POST /api/progress/stages/:stage_id/deliveries
///
/// Submit a completed portion of work for verification. Declared photo
/// keys are matched to uploaded files by filename; keys without a file
/// are skipped.
pub async fn submit_delivery(
    State(state): State<Arc<AppState>>,
    Path(stage_id): Path<Uuid>,
    _auth: RequireAuth,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let stage_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM stages WHERE id = $1)")
        .bind(stage_id)
        .fetch_one(&state.db)
        .await?;
    if !stage_exists {
        return Err(ApiError::not_found("Stage not found"));
    }

    let (payload, mut files) = read_delivery_parts(&mut multipart).await?;

    let mut photo_urls = Vec::new();
    for key in &payload.photo_keys {
        if let Some(data) = files.remove(key) {
            let url = state.storage.upload("works/photos", key, data).await?;
            photo_urls.push(url);
        }
    }

    let mut tx = state.db.begin().await?;
    let submitted = progress::submit_delivery(
        &mut tx,
        stage_id,
        payload.volume,
        &payload.description,
        photo_urls,
    )
    .await?;
    tx.commit().await?;

    Ok(Created(DataResponse::new(DeliverySubmitted {
        id: submitted.work_item_id,
        status: submitted.status,
        photos: submitted.photo_urls,
    })))
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub action: WorkDecision,
}

#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub work_item_id: Uuid,
    pub work_item_status: WorkItemStatus,
    pub stage_id: Uuid,
    pub stage_percent: f64,
    pub status_main: StageMainStatus,
    pub status_second: StageReviewStatus,
    pub record_id: Uuid,
    pub record_percent: f64,
}

/// POST /api/progress/work-items/:item_id/decision
///
/// Accept or reject a submitted work item and cascade the recompute
/// through its stage and progress record.
pub async fn decide_work_item(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<Uuid>,
    _auth: RequireAuth,
    Json(req): Json<DecisionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = state.db.begin().await?;
    let outcome = progress::decide_work_item(&mut tx, item_id, req.action).await?;
    tx.commit().await?;

    Ok(Json(DataResponse::new(DecisionResponse {
        work_item_id: outcome.work_item_id,
        work_item_status: outcome.work_item_status,
        stage_id: outcome.stage_id,
        stage_percent: decimal_to_f64(outcome.stage_percent),
        status_main: outcome.status_main,
        status_second: outcome.status_second,
        record_id: outcome.record_id,
        record_percent: decimal_to_f64(outcome.record_percent),
    })))
}
