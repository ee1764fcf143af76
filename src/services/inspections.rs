//! Remark/violation container and item mutations.
//!
//! Containers aggregate their items' statuses; every item-level
//! transition recomputes the parent from the full sibling set inside
//! the caller's transaction.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::domain::inspections::{container_status, InspectionKind, ItemStatus, ReviewAction};
use crate::error::{ApiError, ApiResult};

/// One finding to file, photos already uploaded.
#[derive(Debug)]
pub struct NewInspectionItem {
    pub violation_text: String,
    pub regulatory_doc: String,
    pub comment: Option<String>,
    pub expiration_date: DateTime<Utc>,
    pub photo_urls: Vec<String>,
}

#[derive(Debug)]
pub struct CreatedItem {
    pub id: Uuid,
    pub status: ItemStatus,
}

#[derive(Debug)]
pub struct CreatedContainer {
    pub id: Uuid,
    pub status: ItemStatus,
    pub expiration_date: DateTime<Utc>,
    pub items: Vec<CreatedItem>,
}

#[derive(Debug)]
pub struct ReviewOutcome {
    pub item_id: Uuid,
    pub item_status: ItemStatus,
    pub container_id: Uuid,
    pub container_status: ItemStatus,
}

#[derive(FromRow)]
struct ItemRow {
    id: Uuid,
    container_id: Uuid,
}

fn missing_item(kind: InspectionKind) -> ApiError {
    match kind {
        InspectionKind::Remark => ApiError::not_found("Remark item not found"),
        InspectionKind::Violation => ApiError::not_found("Violation item not found"),
    }
}

/// Item lookup scoped to the workflow kind, so a violation id cannot
/// be driven through the remark routes or vice versa.
async fn find_item(
    conn: &mut PgConnection,
    kind: InspectionKind,
    item_id: Uuid,
) -> ApiResult<ItemRow> {
    sqlx::query_as::<_, ItemRow>(
        r#"
        SELECT i.id, i.container_id
        FROM inspection_items i
        JOIN inspection_containers c ON c.id = i.container_id
        WHERE i.id = $1 AND c.kind = $2
        "#,
    )
    .bind(item_id)
    .bind(kind.as_str())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| missing_item(kind))
}

/// File a container of findings against an object. The container's
/// expiry is the earliest item expiry; its responsible user is the
/// object's responsible user at filing time.
pub async fn create_container(
    conn: &mut PgConnection,
    kind: InspectionKind,
    object_id: Uuid,
    responsible_user_id: Option<Uuid>,
    items: Vec<NewInspectionItem>,
) -> ApiResult<CreatedContainer> {
    let now = Utc::now();
    let expiration_date = items
        .iter()
        .map(|item| item.expiration_date)
        .min()
        .unwrap_or(now);

    let container_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO inspection_containers
            (id, kind, object_id, responsible_user_id, raised_at, expiration_date, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(container_id)
    .bind(kind.as_str())
    .bind(object_id)
    .bind(responsible_user_id)
    .bind(now)
    .bind(expiration_date)
    .bind(ItemStatus::NotFixed.as_str())
    .execute(&mut *conn)
    .await?;

    let mut created = Vec::with_capacity(items.len());
    for item in items {
        let item_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO inspection_items
                (id, container_id, object_id, responsible_user_id, violation_text,
                 regulatory_doc, comment, status, raised_at, expiration_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(item_id)
        .bind(container_id)
        .bind(object_id)
        .bind(responsible_user_id)
        .bind(&item.violation_text)
        .bind(&item.regulatory_doc)
        .bind(&item.comment)
        .bind(ItemStatus::NotFixed.as_str())
        .bind(now)
        .bind(item.expiration_date)
        .execute(&mut *conn)
        .await?;

        for url in &item.photo_urls {
            sqlx::query(
                "INSERT INTO inspection_item_photos (id, item_id, file_url) VALUES ($1, $2, $3)",
            )
            .bind(Uuid::new_v4())
            .bind(item_id)
            .bind(url)
            .execute(&mut *conn)
            .await?;
        }

        created.push(CreatedItem {
            id: item_id,
            status: ItemStatus::NotFixed,
        });
    }

    tracing::info!(
        kind = kind.as_str(),
        object_id = %object_id,
        container_id = %container_id,
        items = created.len(),
        "Inspection container filed"
    );

    Ok(CreatedContainer {
        id: container_id,
        status: ItemStatus::NotFixed,
        expiration_date,
        items: created,
    })
}

/// Attach the contractor's answer to an item. One answer per item;
/// answering moves the item under review.
pub async fn submit_answer(
    conn: &mut PgConnection,
    kind: InspectionKind,
    item_id: Uuid,
    comment: Option<&str>,
    file_urls: Vec<String>,
) -> ApiResult<Uuid> {
    let item = find_item(conn, kind, item_id).await?;

    let existing: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM inspection_answers WHERE item_id = $1")
            .bind(item.id)
            .fetch_optional(&mut *conn)
            .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("Item already has an answer"));
    }

    let answer_id = Uuid::new_v4();
    sqlx::query("INSERT INTO inspection_answers (id, item_id, comment) VALUES ($1, $2, $3)")
        .bind(answer_id)
        .bind(item.id)
        .bind(comment)
        .execute(&mut *conn)
        .await?;

    for url in &file_urls {
        sqlx::query(
            "INSERT INTO inspection_answer_files (id, answer_id, file_url) VALUES ($1, $2, $3)",
        )
        .bind(Uuid::new_v4())
        .bind(answer_id)
        .bind(url)
        .execute(&mut *conn)
        .await?;
    }

    sqlx::query("UPDATE inspection_items SET status = $1 WHERE id = $2")
        .bind(ItemStatus::Review.as_str())
        .bind(item.id)
        .execute(&mut *conn)
        .await?;

    recompute_container(conn, item.container_id).await?;

    tracing::info!(
        kind = kind.as_str(),
        item_id = %item.id,
        answer_id = %answer_id,
        "Answer submitted, item moved under review"
    );

    Ok(answer_id)
}

/// Inspector verdict on an answered item. Accept fixes it; deny
/// reopens it and discards the prior answer so the contractor must
/// resubmit.
pub async fn review_item(
    conn: &mut PgConnection,
    kind: InspectionKind,
    item_id: Uuid,
    action: ReviewAction,
) -> ApiResult<ReviewOutcome> {
    let item = find_item(conn, kind, item_id).await?;

    let item_status = match action {
        ReviewAction::Accept => ItemStatus::Fixed,
        ReviewAction::Deny => ItemStatus::NotFixed,
    };

    if action == ReviewAction::Deny {
        // Answer files go with the answer row.
        sqlx::query("DELETE FROM inspection_answers WHERE item_id = $1")
            .bind(item.id)
            .execute(&mut *conn)
            .await?;
    }

    sqlx::query("UPDATE inspection_items SET status = $1 WHERE id = $2")
        .bind(item_status.as_str())
        .bind(item.id)
        .execute(&mut *conn)
        .await?;

    let container_status = recompute_container(conn, item.container_id)
        .await?
        .unwrap_or(item_status);

    tracing::info!(
        kind = kind.as_str(),
        item_id = %item.id,
        action = ?action,
        container_status = container_status.as_str(),
        "Inspection item reviewed"
    );

    Ok(ReviewOutcome {
        item_id: item.id,
        item_status,
        container_id: item.container_id,
        container_status,
    })
}

/// Derive the container status from all sibling items and store it.
/// An empty container keeps its current status.
pub async fn recompute_container(
    conn: &mut PgConnection,
    container_id: Uuid,
) -> ApiResult<Option<ItemStatus>> {
    let raw: Vec<String> =
        sqlx::query_scalar("SELECT status FROM inspection_items WHERE container_id = $1")
            .bind(container_id)
            .fetch_all(&mut *conn)
            .await?;

    let statuses: Vec<ItemStatus> = raw.iter().map(|s| ItemStatus::from_db(s)).collect();

    if let Some(status) = container_status(&statuses) {
        sqlx::query("UPDATE inspection_containers SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(container_id)
            .execute(&mut *conn)
            .await?;
        Ok(Some(status))
    } else {
        Ok(None)
    }
}
