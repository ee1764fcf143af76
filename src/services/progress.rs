//! Work progress mutations and the recompute cascade.
//!
//! Every function here expects to run inside the caller's transaction.
//! The parent stage row is locked before any mutation so concurrent
//! decisions on sibling work items serialize, and each recompute reads
//! committed sibling state rather than a stale snapshot.

use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::domain::progress::{
    self, StageMainStatus, StageReviewStatus, WorkDecision, WorkItemStatus,
};
use crate::error::{ApiError, ApiResult};

#[derive(FromRow)]
struct StageRow {
    id: Uuid,
    progress_record_id: Uuid,
    target_volume: i32,
}

/// Result of an accept/deny on a work item, after the full cascade.
#[derive(Debug)]
pub struct DecisionOutcome {
    pub work_item_id: Uuid,
    pub work_item_status: WorkItemStatus,
    pub stage_id: Uuid,
    pub stage_percent: Decimal,
    pub status_main: StageMainStatus,
    pub status_second: StageReviewStatus,
    pub record_id: Uuid,
    pub record_percent: Decimal,
}

/// A freshly submitted delivery.
#[derive(Debug)]
pub struct SubmittedDelivery {
    pub work_item_id: Uuid,
    pub status: WorkItemStatus,
    pub photo_urls: Vec<String>,
}

/// Lock the stage row to serialize sibling mutations for the rest of
/// the transaction. Missing stage aborts with NotFound.
async fn lock_stage(conn: &mut PgConnection, stage_id: Uuid) -> ApiResult<StageRow> {
    sqlx::query_as::<_, StageRow>(
        "SELECT id, progress_record_id, target_volume FROM stages WHERE id = $1 FOR UPDATE",
    )
    .bind(stage_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| ApiError::not_found("Stage not found"))
}

/// Create a work item for a delivery, attach its evidence photos, and
/// raise the stage's review flag from the new sibling set.
pub async fn submit_delivery(
    conn: &mut PgConnection,
    stage_id: Uuid,
    volume: i32,
    description: &str,
    photo_urls: Vec<String>,
) -> ApiResult<SubmittedDelivery> {
    let stage = lock_stage(conn, stage_id).await?;

    let work_item_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO work_items (id, stage_id, volume, description, status)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(work_item_id)
    .bind(stage.id)
    .bind(volume)
    .bind(description)
    .bind(WorkItemStatus::AwaitingVerification.as_str())
    .execute(&mut *conn)
    .await?;

    for url in &photo_urls {
        sqlx::query(
            "INSERT INTO work_item_photos (id, work_item_id, file_url) VALUES ($1, $2, $3)",
        )
        .bind(Uuid::new_v4())
        .bind(work_item_id)
        .bind(url)
        .execute(&mut *conn)
        .await?;
    }

    let review = progress::review_status_recompute(&item_statuses(conn, stage.id).await?);
    sqlx::query("UPDATE stages SET status_second = $1 WHERE id = $2")
        .bind(review.as_str())
        .bind(stage.id)
        .execute(&mut *conn)
        .await?;

    tracing::info!(
        stage_id = %stage.id,
        work_item_id = %work_item_id,
        volume = volume,
        "Delivery submitted for verification"
    );

    Ok(SubmittedDelivery {
        work_item_id,
        status: WorkItemStatus::AwaitingVerification,
        photo_urls,
    })
}

/// Record an accept/deny decision on a work item and recompute the
/// stage and progress-record aggregates from sibling state.
pub async fn decide_work_item(
    conn: &mut PgConnection,
    work_item_id: Uuid,
    decision: WorkDecision,
) -> ApiResult<DecisionOutcome> {
    let stage_id: Uuid = sqlx::query_scalar("SELECT stage_id FROM work_items WHERE id = $1")
        .bind(work_item_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::not_found("Work item not found"))?;

    let stage = lock_stage(conn, stage_id).await?;

    let item_status = match decision {
        WorkDecision::Accept => WorkItemStatus::Passed,
        WorkDecision::Deny => WorkItemStatus::VerificationRejected,
    };
    sqlx::query("UPDATE work_items SET status = $1 WHERE id = $2")
        .bind(item_status.as_str())
        .bind(work_item_id)
        .execute(&mut *conn)
        .await?;

    let passed_volume: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(volume), 0) FROM work_items WHERE stage_id = $1 AND status = $2",
    )
    .bind(stage.id)
    .bind(WorkItemStatus::Passed.as_str())
    .fetch_one(&mut *conn)
    .await?;

    let target = i64::from(stage.target_volume);
    let stage_percent = progress::stage_percent(passed_volume, target);
    let status_main = progress::main_status_after_decision(passed_volume, target);
    let status_second = progress::review_status_after_decision(decision);

    sqlx::query(
        "UPDATE stages SET percent = $1, status_main = $2, status_second = $3 WHERE id = $4",
    )
    .bind(stage_percent)
    .bind(status_main.as_str())
    .bind(status_second.as_str())
    .bind(stage.id)
    .execute(&mut *conn)
    .await?;

    let record_percent = recompute_record_percent(conn, stage.progress_record_id).await?;

    if status_main == StageMainStatus::Passed {
        tracing::info!(stage_id = %stage.id, "Stage reached its target volume");
    }
    tracing::info!(
        work_item_id = %work_item_id,
        stage_id = %stage.id,
        decision = ?decision,
        percent = %stage_percent,
        "Work item decided"
    );

    Ok(DecisionOutcome {
        work_item_id,
        work_item_status: item_status,
        stage_id: stage.id,
        stage_percent,
        status_main,
        status_second,
        record_id: stage.progress_record_id,
        record_percent,
    })
}

/// Refresh a progress record's percent from its stages' percents.
pub async fn recompute_record_percent(
    conn: &mut PgConnection,
    record_id: Uuid,
) -> ApiResult<Decimal> {
    let stage_percents: Vec<Decimal> =
        sqlx::query_scalar("SELECT percent FROM stages WHERE progress_record_id = $1")
            .bind(record_id)
            .fetch_all(&mut *conn)
            .await?;

    let percent = progress::record_percent(&stage_percents);
    let updated = sqlx::query("UPDATE progress_records SET percent = $1 WHERE id = $2")
        .bind(percent)
        .bind(record_id)
        .execute(&mut *conn)
        .await?;

    if updated.rows_affected() == 0 {
        return Err(ApiError::not_found("Progress record not found"));
    }

    Ok(percent)
}

async fn item_statuses(
    conn: &mut PgConnection,
    stage_id: Uuid,
) -> Result<Vec<WorkItemStatus>, sqlx::Error> {
    let raw: Vec<String> =
        sqlx::query_scalar("SELECT status FROM work_items WHERE stage_id = $1")
            .bind(stage_id)
            .fetch_all(&mut *conn)
            .await?;

    Ok(raw.iter().map(|s| WorkItemStatus::from_db(s)).collect())
}
