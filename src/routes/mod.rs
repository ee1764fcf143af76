pub mod company;
pub mod health;
pub mod inspections;
pub mod materials;
pub mod me;
pub mod nfc;
pub mod objects;
pub mod progress;
pub mod remarks;
pub mod users;
pub mod violations;

use axum::http::HeaderMap;
use axum::{routing::delete, routing::get, routing::patch, routing::post, Router};
use std::sync::Arc;

use crate::app::AppState;

/// Parse the `latitude`/`longitude` headers mobile clients attach to
/// site-bound requests. Either header missing or unparseable yields
/// `None`.
pub(crate) fn coordinate_headers(headers: &HeaderMap) -> Option<(f64, f64)> {
    let parse = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<f64>().ok())
    };
    Some((parse("latitude")?, parse("longitude")?))
}

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Public routes
        .route("/health", get(health::health_check))
        // Protected routes
        .route("/me", get(me::get_me))
        // Users and companies
        .route("/users/contractors", get(users::list_contractors))
        .route("/company/current", get(company::current_company))
        .route(
            "/company/dashboard/status/:company_id",
            get(company::dashboard_status),
        )
        // Objects
        .route(
            "/companies/:company_id/objects",
            post(objects::create_object),
        )
        .route("/objects", get(objects::list_objects))
        .route("/objects/count", get(objects::count_objects))
        .route("/objects/categories", get(objects::list_categories))
        .route("/objects/:object_id", get(objects::get_object))
        .route("/objects/:object_id/geo-check", get(objects::check_geo))
        // Activation workflow
        .route(
            "/objects/:object_id/activation/checklist",
            post(objects::create_checklist),
        )
        .route(
            "/objects/:object_id/activation/checklist",
            get(objects::get_checklist),
        )
        .route(
            "/objects/:object_id/activation/checklist/review",
            post(objects::review_checklist),
        )
        .route(
            "/objects/:object_id/activation/act/file",
            post(objects::upload_act_file),
        )
        // Progress
        .route("/objects/:object_id/progress", post(progress::create_record))
        .route("/objects/:object_id/progress", get(progress::list_records))
        .route(
            "/objects/:object_id/progress/total",
            get(progress::total_progress),
        )
        .route("/progress/stages/:stage_id", get(progress::stage_detail))
        .route("/progress/stages/:stage_id/begin", post(progress::begin_stage))
        .route(
            "/progress/stages/:stage_id/deliveries",
            post(progress::submit_delivery),
        )
        .route(
            "/progress/work-items/:item_id/decision",
            post(progress::decide_work_item),
        )
        // Materials
        .route(
            "/progress/stages/:stage_id/materials",
            post(materials::create_material),
        )
        .route(
            "/progress/stages/:stage_id/materials",
            get(materials::list_materials),
        )
        .route("/materials/recognize", post(materials::recognize_material))
        // NFC tags and access sessions
        .route("/objects/:object_id/nfc", post(nfc::register_tag))
        .route("/objects/:object_id/nfc", get(nfc::list_tags))
        .route("/objects/:object_id/nfc/verify", post(nfc::verify_scan))
        .route(
            "/objects/:object_id/nfc/session",
            delete(nfc::terminate_session),
        )
        .route(
            "/objects/:object_id/nfc/history",
            get(nfc::object_scan_history),
        )
        .route("/nfc/history", get(nfc::scan_history))
        .route("/nfc/:nfc_id", patch(nfc::rename_tag))
        .route("/nfc/:nfc_id", delete(nfc::delete_tag))
        // Remarks
        .route("/objects/:object_id/remarks", post(remarks::create_remarks))
        .route("/objects/:object_id/remarks", get(remarks::list_remarks))
        .route("/remarks/:container_id", get(remarks::remark_detail))
        .route("/remarks/items/:item_id/answer", post(remarks::answer_remark))
        .route("/remarks/items/:item_id/review", post(remarks::review_remark))
        // Violations
        .route(
            "/objects/:object_id/violations",
            post(violations::create_violations),
        )
        .route(
            "/objects/:object_id/violations",
            get(violations::list_violations),
        )
        .route("/violations/:container_id", get(violations::violation_detail))
        .route(
            "/violations/items/:item_id/answer",
            post(violations::answer_violation),
        )
        .route(
            "/violations/items/:item_id/review",
            post(violations::review_violation),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn coordinate_headers_parse_both_values() {
        let mut headers = HeaderMap::new();
        headers.insert("latitude", HeaderValue::from_static("55.7558"));
        headers.insert("longitude", HeaderValue::from_static("37.6173"));
        assert_eq!(coordinate_headers(&headers), Some((55.7558, 37.6173)));
    }

    #[test]
    fn coordinate_headers_require_both() {
        let mut headers = HeaderMap::new();
        headers.insert("latitude", HeaderValue::from_static("55.7558"));
        assert_eq!(coordinate_headers(&headers), None);

        headers.insert("longitude", HeaderValue::from_static("not a number"));
        assert_eq!(coordinate_headers(&headers), None);
    }
}
