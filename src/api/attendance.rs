use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::{normalize_attachment, require_attachment};
use crate::auth::auth::AuthUser;
use crate::error::bad_request;
use crate::model::attendance::PunchMark;
use crate::service::attendance::{AttendanceEngine, DayStatus, worked_seconds as worked_seconds_of};
use crate::utils::geo::{Position, round1};
use crate::utils::office::OfficeConfig;

#[derive(Deserialize, ToSchema)]
pub struct PunchReq {
    #[schema(example = json!(-7.68826))]
    pub lat: f64,
    #[schema(example = 110.187048)]
    pub lng: f64,
    /// Selfie as base64, optionally a `data:` URL
    pub selfie_base64: Option<String>,
}

#[derive(Deserialize, Default, ToSchema)]
pub struct StatusReq {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Serialize, ToSchema)]
pub struct OfficeResponse {
    #[schema(example = json!(-7.68826))]
    pub office_lat: f64,
    #[schema(example = 110.187048)]
    pub office_lng: f64,
    #[schema(example = 20.0)]
    pub radius_m: f64,
    #[schema(example = "Asia/Jakarta")]
    pub timezone: String,
}

#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    /// Present when the request carried a position
    pub inside_radius: Option<bool>,
    pub distance_m: Option<f64>,
    pub today: DayStatus,
}

#[derive(Serialize, ToSchema)]
pub struct PunchResponse {
    #[schema(example = "checked_in")]
    pub result: &'static str,
    #[schema(example = 3.2)]
    pub distance_m: f64,
    pub today: DayStatus,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MarksQuery {
    /// `YYYY-MM`; defaults to the current office month
    #[param(example = "2025-03")]
    pub month: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct MarksResponse {
    #[schema(example = "2025-03")]
    pub month: String,
    #[schema(value_type = Vec<String>, example = json!(["2025-03-03", "2025-03-04"]))]
    pub days_present: Vec<NaiveDate>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DayQuery {
    /// Office-local date, `YYYY-MM-DD`
    #[param(example = "2025-03-10")]
    pub date: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct DayEvent {
    #[serde(rename = "type")]
    #[schema(example = "check_in")]
    pub kind: &'static str,
    #[schema(value_type = String, format = "date-time")]
    pub at: DateTime<Utc>,
    pub lat: f64,
    pub lng: f64,
    pub distance_m: f64,
    pub photo_base64: Option<String>,
}

impl DayEvent {
    fn from_mark(kind: &'static str, mark: PunchMark) -> Self {
        Self {
            kind,
            at: mark.at,
            lat: mark.position.lat,
            lng: mark.position.lng,
            distance_m: mark.distance_m,
            photo_base64: mark.selfie,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DayResponse {
    #[schema(value_type = String, format = "date", example = "2025-03-10")]
    pub date: NaiveDate,
    pub events: Vec<DayEvent>,
    pub worked_seconds: i64,
}

fn parse_month(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", raw.trim()), "%Y-%m-%d").ok()
}

/// Office location and admission radius
#[utoipa::path(
    get,
    path = "/api/config/office",
    responses(
        (status = 200, description = "Office geofence", body = OfficeResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn office_config(engine: web::Data<AttendanceEngine>) -> impl Responder {
    let office = engine.office();
    HttpResponse::Ok().json(OfficeResponse {
        office_lat: office.center.lat,
        office_lng: office.center.lng,
        radius_m: office.radius_m,
        timezone: office.timezone.name().to_string(),
    })
}

/// Today's attendance, plus distance to the office when a position is sent
#[utoipa::path(
    post,
    path = "/api/attendance/status",
    request_body(content = StatusReq, content_type = "application/json"),
    responses(
        (status = 200, description = "Today's record", body = StatusResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn status(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    payload: Option<web::Json<StatusReq>>,
) -> actix_web::Result<impl Responder> {
    let req = payload.map(web::Json::into_inner).unwrap_or_default();
    let today = engine.get_status(auth.user_id, Utc::now()).await?;

    let (inside_radius, distance_m) = match (req.lat, req.lng) {
        (Some(lat), Some(lng)) => {
            let distance = engine.office().distance_from(Position::new(lat, lng));
            (
                Some(engine.office().inside_radius(distance)),
                Some(round1(distance)),
            )
        }
        _ => (None, None),
    };

    Ok(HttpResponse::Ok().json(StatusResponse {
        inside_radius,
        distance_m,
        today,
    }))
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    request_body(content = PunchReq, content_type = "application/json"),
    responses(
        (status = 201, description = "Checked in", body = PunchResponse),
        (status = 400, description = "Selfie missing or undecodable", body = Object, example = json!({
            "error": { "code": "selfie_required", "message": "image attachment is required" }
        })),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Already checked in today", body = Object, example = json!({
            "error": { "code": "already_checked_in", "message": "already checked in today" }
        })),
        (status = 422, description = "Outside office radius", body = Object, example = json!({
            "error": {
                "code": "outside_radius",
                "message": "outside office radius (31.4 m, radius 20 m)",
                "details": { "distance_m": 31.4, "radius_m": 20.0 }
            }
        })),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    payload: web::Json<PunchReq>,
) -> actix_web::Result<impl Responder> {
    let PunchReq {
        lat,
        lng,
        selfie_base64,
    } = payload.into_inner();
    let selfie = normalize_attachment(require_attachment(selfie_base64, "selfie_required")?).await?;

    let punched = engine
        .check_in(auth.user_id, Utc::now(), Position::new(lat, lng), Some(selfie))
        .await?;

    Ok(HttpResponse::Created().json(PunchResponse {
        result: "checked_in",
        distance_m: punched.distance_m,
        today: punched.status,
    }))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    request_body(content = PunchReq, content_type = "application/json"),
    responses(
        (status = 200, description = "Checked out", body = PunchResponse),
        (status = 400, description = "Selfie missing or undecodable"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Not checked in yet or already checked out", body = Object, example = json!({
            "error": {
                "code": "not_checked_in_yet_or_already_checked_out",
                "message": "not checked in yet or already checked out"
            }
        })),
        (status = 422, description = "Outside office radius"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    payload: web::Json<PunchReq>,
) -> actix_web::Result<impl Responder> {
    let PunchReq {
        lat,
        lng,
        selfie_base64,
    } = payload.into_inner();
    let selfie = normalize_attachment(require_attachment(selfie_base64, "selfie_required")?).await?;

    let punched = engine
        .check_out(auth.user_id, Utc::now(), Position::new(lat, lng), Some(selfie))
        .await?;

    Ok(HttpResponse::Ok().json(PunchResponse {
        result: "checked_out",
        distance_m: punched.distance_m,
        today: punched.status,
    }))
}

/// Days of a month with any attendance mark
#[utoipa::path(
    get,
    path = "/api/attendance/marks",
    params(MarksQuery),
    responses(
        (status = 200, description = "Marked days", body = MarksResponse),
        (status = 400, description = "Invalid month"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn marks(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    query: web::Query<MarksQuery>,
) -> actix_web::Result<impl Responder> {
    let anchor = match query.month.as_deref() {
        Some(raw) => parse_month(raw).ok_or_else(|| bad_request("invalid_month", "month must be YYYY-MM"))?,
        None => engine.office().office_date(Utc::now()),
    };
    let (from, to) = OfficeConfig::month_bounds(anchor);

    let days = engine.list_marked_days(auth.user_id, from, to).await?;

    Ok(HttpResponse::Ok().json(MarksResponse {
        month: from.format("%Y-%m").to_string(),
        days_present: days,
    }))
}

/// Both punches of one day, with coordinates and selfies
#[utoipa::path(
    get,
    path = "/api/attendance/day",
    params(DayQuery),
    responses(
        (status = 200, description = "Day detail", body = DayResponse),
        (status = 400, description = "Missing or invalid date"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn day(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    query: web::Query<DayQuery>,
) -> actix_web::Result<impl Responder> {
    let raw = query
        .date
        .as_deref()
        .ok_or_else(|| bad_request("missing_date", "date is required"))?;
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| bad_request("invalid_date", "date must be YYYY-MM-DD"))?;

    let record = engine.get_day(auth.user_id, date).await?;

    let mut events = Vec::with_capacity(2);
    let mut worked_seconds = 0;
    if let Some(day) = record {
        worked_seconds = worked_seconds_of(&day);
        if let Some(mark) = day.check_in {
            events.push(DayEvent::from_mark("check_in", mark));
        }
        if let Some(mark) = day.check_out {
            events.push(DayEvent::from_mark("check_out", mark));
        }
    }

    Ok(HttpResponse::Ok().json(DayResponse {
        date,
        events,
        worked_seconds,
    }))
}

/// Deletes today's record. Only compiled with the `debug-reset` feature.
#[cfg(feature = "debug-reset")]
pub async fn reset_today(auth: AuthUser, engine: web::Data<AttendanceEngine>) -> actix_web::Result<impl Responder> {
    let date = engine.office().office_date(Utc::now());
    let deleted = engine.reset_day(auth.user_id, date).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "date": date,
        "deleted": deleted,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{bearer, test_app, test_request};
    use crate::repo::memory::MemoryStore;
    use crate::utils::image::sample_png_base64;
    use actix_web::{http::StatusCode, test};
    use serde_json::{Value, json};

    fn office() -> Position {
        OfficeConfig::default().center
    }

    #[actix_web::test]
    async fn test_missing_token_is_unauthorized() {
        let app = test::init_service(test_app(MemoryStore::new())).await;

        let req = test_request(test::TestRequest::post().uri("/api/attendance/status")).to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "unauthorized");
    }

    #[actix_web::test]
    async fn test_check_in_then_status() {
        let store = MemoryStore::new();
        let app = test::init_service(test_app(store.clone())).await;

        let req = test_request(test::TestRequest::post().uri("/api/attendance/check-in"))
            .insert_header(bearer(1))
            .set_json(json!({
                "lat": office().lat,
                "lng": office().lng,
                "selfie_base64": sample_png_base64(4, 4),
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["result"], "checked_in");
        assert_eq!(body["today"]["next_action"], "check_out");

        let req = test_request(test::TestRequest::post().uri("/api/attendance/status"))
            .insert_header(bearer(1))
            .set_json(json!({ "lat": office().lat, "lng": office().lng }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["inside_radius"], true);
        assert_eq!(body["today"]["has_record"], true);

        let req = test_request(test::TestRequest::post().uri("/api/attendance/check-in"))
            .insert_header(bearer(1))
            .set_json(json!({
                "lat": office().lat,
                "lng": office().lng,
                "selfie_base64": sample_png_base64(4, 4),
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn test_check_in_outside_radius() {
        let store = MemoryStore::new();
        let app = test::init_service(test_app(store.clone())).await;

        let req = test_request(test::TestRequest::post().uri("/api/attendance/check-in"))
            .insert_header(bearer(1))
            .set_json(json!({
                "lat": office().lat + 0.001,
                "lng": office().lng,
                "selfie_base64": sample_png_base64(4, 4),
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "outside_radius");
        assert_eq!(body["error"]["details"]["radius_m"], 20.0);
        assert!(body["error"]["details"]["distance_m"].as_f64().unwrap() > 100.0);
    }

    #[actix_web::test]
    async fn test_selfie_checked_before_geofence() {
        let app = test::init_service(test_app(MemoryStore::new())).await;

        let req = test_request(test::TestRequest::post().uri("/api/attendance/check-in"))
            .insert_header(bearer(1))
            .set_json(json!({ "lat": 0.0, "lng": 0.0 }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "selfie_required");
    }

    #[actix_web::test]
    async fn test_check_out_without_check_in() {
        let app = test::init_service(test_app(MemoryStore::new())).await;

        let req = test_request(test::TestRequest::post().uri("/api/attendance/check-out"))
            .insert_header(bearer(1))
            .set_json(json!({
                "lat": office().lat,
                "lng": office().lng,
                "selfie_base64": sample_png_base64(4, 4),
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "not_checked_in_yet_or_already_checked_out");
    }

    #[actix_web::test]
    async fn test_marks_rejects_bad_month() {
        let app = test::init_service(test_app(MemoryStore::new())).await;

        let req = test_request(test::TestRequest::get().uri("/api/attendance/marks?month=2025-13"))
            .insert_header(bearer(1))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test_request(test::TestRequest::get().uri("/api/attendance/marks?month=2025-03"))
            .insert_header(bearer(1))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["month"], "2025-03");
        assert_eq!(body["days_present"], json!([]));
    }

    #[actix_web::test]
    async fn test_day_detail_lists_events() {
        let store = MemoryStore::new();
        let app = test::init_service(test_app(store.clone())).await;

        let req = test_request(test::TestRequest::post().uri("/api/attendance/check-in"))
            .insert_header(bearer(1))
            .set_json(json!({
                "lat": office().lat,
                "lng": office().lng,
                "selfie_base64": sample_png_base64(4, 4),
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let date = body["today"]["date"].as_str().unwrap().to_string();

        let req = test_request(test::TestRequest::get().uri(&format!("/api/attendance/day?date={date}")))
            .insert_header(bearer(1))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["events"].as_array().unwrap().len(), 1);
        assert_eq!(body["events"][0]["type"], "check_in");
        assert!(body["events"][0]["photo_base64"].is_string());
        assert_eq!(body["worked_seconds"], 0);

        let req = test_request(test::TestRequest::get().uri("/api/attendance/day"))
            .insert_header(bearer(1))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
