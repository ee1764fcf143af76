//! Material intake routes
//!
//! Delivery notes recorded against a stage, with optional recognition
//! of a photographed note to prefill the form.

use axum::{
    extract::{Multipart, Path, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::response::{Created, DataResponse};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::error::ApiError;
use crate::services::recognition::DeliveryNoteFields;

#[derive(Debug, Deserialize)]
pub struct CreateMaterialRequest {
    #[serde(default)]
    pub sender: String,
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub request_number: String,
    #[serde(default)]
    pub receiver: String,
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub quantity: String,
    #[serde(default)]
    pub net_weight: String,
    #[serde(default)]
    pub gross_weight: String,
    #[serde(default)]
    pub volume: String,
    #[serde(default)]
    pub carrier: String,
    #[serde(default)]
    pub vehicle: String,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct MaterialResponse {
    pub id: Uuid,
    pub sender: String,
    pub date: Option<NaiveDate>,
    pub request_number: String,
    pub receiver: String,
    pub item_name: String,
    pub size: String,
    pub quantity: String,
    pub net_weight: String,
    pub gross_weight: String,
    pub volume: String,
    pub carrier: String,
    pub vehicle: String,
    pub created_at: DateTime<Utc>,
}

async fn ensure_stage_exists(state: &AppState, stage_id: Uuid) -> Result<(), ApiError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM stages WHERE id = $1)")
        .bind(stage_id)
        .fetch_one(&state.db)
        .await?;
    if !exists {
        return Err(ApiError::not_found("Stage not found"));
    }
    Ok(())
}

/// POST /api/progress/stages/:stage_id/materials
///
/// Record a delivery note for a stage.
pub async fn create_material(
    State(state): State<Arc<AppState>>,
    Path(stage_id): Path<Uuid>,
    _auth: RequireAuth,
    Json(req): Json<CreateMaterialRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_stage_exists(&state, stage_id).await?;

    let material = sqlx::query_as::<_, MaterialResponse>(
        r#"
        INSERT INTO materials (id, stage_id, sender, date, request_number, receiver, item_name,
                               size, quantity, net_weight, gross_weight, volume, carrier, vehicle)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING id, sender, date, request_number, receiver, item_name, size, quantity,
                  net_weight, gross_weight, volume, carrier, vehicle, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(stage_id)
    .bind(&req.sender)
    .bind(req.date)
    .bind(&req.request_number)
    .bind(&req.receiver)
    .bind(&req.item_name)
    .bind(&req.size)
    .bind(&req.quantity)
    .bind(&req.net_weight)
    .bind(&req.gross_weight)
    .bind(&req.volume)
    .bind(&req.carrier)
    .bind(&req.vehicle)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(material_id = %material.id, stage_id = %stage_id, "Material recorded");

    Ok(Created(DataResponse::new(material)))
}

/// GET /api/progress/stages/:stage_id/materials
///
/// List delivery notes recorded for a stage.
pub async fn list_materials(
    State(state): State<Arc<AppState>>,
    Path(stage_id): Path<Uuid>,
    _auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    ensure_stage_exists(&state, stage_id).await?;

    let materials = sqlx::query_as::<_, MaterialResponse>(
        r#"
        SELECT id, sender, date, request_number, receiver, item_name, size, quantity,
               net_weight, gross_weight, volume, carrier, vehicle, created_at
        FROM materials
        WHERE stage_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(stage_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(DataResponse::new(materials)))
}

#[derive(Debug, Serialize)]
pub struct RecognizeResponse {
    pub result: DeliveryNoteFields,
}

/// POST /api/materials/recognize
///
/// Run a photographed delivery note through the recognition service
/// and return the extracted fields.
pub async fn recognize_material(
    State(state): State<Arc<AppState>>,
    _auth: RequireAuth,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::bad_request("Malformed multipart payload"))?
    {
        if let Some(name) = field.file_name().map(str::to_string) {
            let data = field
                .bytes()
                .await
                .map_err(|_| ApiError::bad_request("Malformed multipart payload"))?;
            file = Some((name, data.to_vec()));
            break;
        }
    }
    let (file_name, data) = file.ok_or_else(|| ApiError::bad_request("No file provided"))?;

    let result = state
        .recognition
        .recognize_delivery_note(&file_name, data)
        .await?;

    Ok(Json(DataResponse::new(RecognizeResponse { result })))
}
