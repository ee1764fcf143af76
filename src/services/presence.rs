//! Physical-presence gating for site write operations.
//!
//! A user proves presence either by standing inside the object's
//! geofence or by an access grant established through an NFC scan.
//! The geofence is checked first; the grant is only a fallback.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::domain::geofence::Boundary;
use crate::domain::nfc::{grant_state, GrantState};
use crate::error::{ApiError, ApiResult};

/// Upsert the access grant for (user, object) and stamp a fresh
/// expiry. One grant per pair; a repeat scan renews in place.
pub async fn issue_grant(
    conn: &mut PgConnection,
    user_id: Uuid,
    object_id: Uuid,
    window_minutes: i64,
) -> Result<DateTime<Utc>, sqlx::Error> {
    let expires_at = Utc::now() + Duration::minutes(window_minutes);

    sqlx::query(
        r#"
        INSERT INTO object_access_grants (id, user_id, object_id, is_active, access_expires_at)
        VALUES ($1, $2, $3, true, $4)
        ON CONFLICT (user_id, object_id)
        DO UPDATE SET is_active = true, access_expires_at = EXCLUDED.access_expires_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(object_id)
    .bind(expires_at)
    .execute(&mut *conn)
    .await?;

    tracing::info!(
        user_id = %user_id,
        object_id = %object_id,
        expires_at = %expires_at,
        "Access grant issued"
    );

    Ok(expires_at)
}

/// Whether the user currently holds a live grant for the object.
/// A grant observed past its expiry is deleted here and reported
/// inactive; there is no background sweep.
pub async fn check_active(
    conn: &mut PgConnection,
    user_id: Uuid,
    object_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let grant: Option<(bool, Option<DateTime<Utc>>)> = sqlx::query_as(
        "SELECT is_active, access_expires_at FROM object_access_grants
         WHERE user_id = $1 AND object_id = $2",
    )
    .bind(user_id)
    .bind(object_id)
    .fetch_optional(&mut *conn)
    .await?;

    match grant_state(grant, Utc::now()) {
        GrantState::Active => Ok(true),
        GrantState::Expired => {
            sqlx::query(
                "DELETE FROM object_access_grants WHERE user_id = $1 AND object_id = $2",
            )
            .bind(user_id)
            .bind(object_id)
            .execute(&mut *conn)
            .await?;

            tracing::info!(
                user_id = %user_id,
                object_id = %object_id,
                "Expired access grant removed"
            );
            Ok(false)
        }
        GrantState::Missing | GrantState::Inactive => Ok(false),
    }
}

/// Drop the user's session on the object.
pub async fn terminate(
    conn: &mut PgConnection,
    user_id: Uuid,
    object_id: Uuid,
) -> ApiResult<()> {
    let deleted = sqlx::query(
        "DELETE FROM object_access_grants WHERE user_id = $1 AND object_id = $2",
    )
    .bind(user_id)
    .bind(object_id)
    .execute(&mut *conn)
    .await?;

    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("No active session for this object"));
    }

    tracing::info!(user_id = %user_id, object_id = %object_id, "Access session terminated");
    Ok(())
}

/// The combined presence rule gating remark/violation writes.
/// Geofence success wins outright; degenerate or missing coordinates
/// and geometry misses fall back to the access grant. Both failing
/// rejects the operation.
pub async fn confirm_presence(
    conn: &mut PgConnection,
    user_id: Uuid,
    object_id: Uuid,
    coords: Option<(f64, f64)>,
    boundary: Option<&serde_json::Value>,
    tolerance_meters: f64,
) -> ApiResult<()> {
    if let (Some((lat, lon)), Some(raw)) = (coords, boundary) {
        if let Some(parsed) = Boundary::from_json(raw) {
            if parsed.is_within_tolerance(lat, lon, tolerance_meters) {
                return Ok(());
            }
        }
    }

    if check_active(conn, user_id, object_id).await? {
        return Ok(());
    }

    tracing::warn!(
        user_id = %user_id,
        object_id = %object_id,
        "Presence check failed: outside geofence and no active grant"
    );
    Err(ApiError::unauthorized(
        "Presence at the object is not confirmed",
    ))
}
