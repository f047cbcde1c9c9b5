use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::normalize_attachment;
use crate::auth::auth::AuthUser;
use crate::error::bad_request;
use crate::model::leave_request::{
    Decision, LeaveKind, LeaveRequest, LeaveStatus, MAX_REASON_LEN, QuotaSnapshot, StatusFilter,
};
use crate::service::attendance::AttendanceEngine;
use crate::service::leave::{Decided, LeaveWorkflow, Submitted};

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct YearQuery {
    /// Defaults to the current year in the office timezone
    #[param(example = 2025)]
    pub year: Option<i32>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaveFilter {
    #[param(example = 2025)]
    pub year: Option<i32>,
    /// all | pending | approved | rejected
    #[param(value_type = Option<String>, example = "pending")]
    pub status: Option<StatusFilter>,
}

#[derive(Deserialize, ToSchema)]
pub struct PaidLeaveReq {
    #[schema(example = "2025-04-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2025-04-05", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "Family visit")]
    pub reason: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct SickLeaveReq {
    #[schema(example = "2025-04-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2025-04-02", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    /// Doctor's note as base64, optionally a `data:` URL
    pub doctor_note_base64: Option<String>,
    pub reason: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveResponse {
    #[schema(example = 1)]
    pub id: u64,
    pub kind: LeaveKind,
    pub status: LeaveStatus,
    #[schema(example = "Family visit")]
    pub reason: String,
    #[schema(example = "2025-04-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2025-04-05", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = 5)]
    pub days: i64,
    #[schema(example = "2025-03-20T02:00:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub decided_at: Option<DateTime<Utc>>,
    pub has_proof: bool,
}

impl From<LeaveRequest> for LeaveResponse {
    fn from(r: LeaveRequest) -> Self {
        Self {
            has_proof: r.has_proof(),
            id: r.id,
            kind: r.kind,
            status: r.status,
            reason: r.reason,
            start_date: r.start_date,
            end_date: r.end_date,
            days: r.days,
            created_at: r.created_at,
            decided_at: r.decided_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SubmittedResponse {
    pub request: LeaveResponse,
    /// Balance the paid request was checked against
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_snapshot: Option<QuotaSnapshot>,
}

impl From<Submitted> for SubmittedResponse {
    fn from(s: Submitted) -> Self {
        Self {
            request: s.request.into(),
            quota_snapshot: s.quota,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DecisionResponse {
    #[schema(example = 1)]
    pub id: u64,
    pub status: LeaveStatus,
    /// Balance after the decision, paid leave only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_snapshot: Option<QuotaSnapshot>,
}

impl From<Decided> for DecisionResponse {
    fn from(d: Decided) -> Self {
        Self {
            id: d.id,
            status: d.status,
            quota_snapshot: d.quota,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    #[schema(example = 2025)]
    pub year: i32,
    #[schema(value_type = String, example = "all")]
    pub status_filter: StatusFilter,
    pub items: Vec<LeaveResponse>,
}

fn current_year(engine: &AttendanceEngine) -> i32 {
    engine.office().office_year(Utc::now())
}

/// Paid-leave balance for a year
#[utoipa::path(
    get,
    path = "/api/leave/quota",
    params(YearQuery),
    responses(
        (status = 200, description = "Quota snapshot", body = QuotaSnapshot),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn quota(
    auth: AuthUser,
    leave: web::Data<LeaveWorkflow>,
    engine: web::Data<AttendanceEngine>,
    query: web::Query<YearQuery>,
) -> actix_web::Result<impl Responder> {
    let year = query.year.unwrap_or_else(|| current_year(&engine));
    let snapshot = leave.get_quota(auth.user_id, year).await?;

    Ok(HttpResponse::Ok().json(snapshot))
}

fn checked_reason(reason: Option<String>) -> actix_web::Result<String> {
    let reason = reason.unwrap_or_default();
    if reason.chars().count() > MAX_REASON_LEN {
        return Err(bad_request(
            "reason_too_long",
            format!("reason must be at most {MAX_REASON_LEN} characters"),
        ));
    }
    Ok(reason)
}

/// Request paid leave ("cuti")
#[utoipa::path(
    post,
    path = "/api/leave/paid",
    request_body(content = PaidLeaveReq, content_type = "application/json"),
    responses(
        (status = 201, description = "Pending request created", body = SubmittedResponse),
        (status = 400, description = "end_date before start_date or reason too long"),
        (status = 401, description = "Unauthorized"),
        (status = 422, description = "Not enough quota left", body = Object, example = json!({
            "error": {
                "code": "quota_exceeded",
                "message": "quota exceeded: requested 10 day(s), 7 remaining",
                "details": { "requested_days": 10, "remaining_days": 7 }
            }
        })),
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn request_paid(
    auth: AuthUser,
    leave: web::Data<LeaveWorkflow>,
    payload: web::Json<PaidLeaveReq>,
) -> actix_web::Result<impl Responder> {
    let req = payload.into_inner();
    let reason = checked_reason(req.reason)?;
    let submitted = leave
        .request_paid_leave(
            auth.user_id,
            req.start_date,
            req.end_date,
            reason,
            Utc::now(),
        )
        .await?;

    Ok(HttpResponse::Created().json(SubmittedResponse::from(submitted)))
}

/// Request sick leave ("sakit"); a doctor's note is required
#[utoipa::path(
    post,
    path = "/api/leave/sick",
    request_body(content = SickLeaveReq, content_type = "application/json"),
    responses(
        (status = 201, description = "Pending request created", body = SubmittedResponse),
        (status = 400, description = "Invalid dates, over-long reason, missing or undecodable note", body = Object, example = json!({
            "error": { "code": "proof_required", "message": "proof attachment required" }
        })),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn request_sick(
    auth: AuthUser,
    leave: web::Data<LeaveWorkflow>,
    payload: web::Json<SickLeaveReq>,
) -> actix_web::Result<impl Responder> {
    let req = payload.into_inner();
    let reason = checked_reason(req.reason)?;

    let proof = match req.doctor_note_base64.filter(|n| !n.trim().is_empty()) {
        Some(raw) => Some(normalize_attachment(raw).await?),
        None => None,
    };

    let submitted = leave
        .request_sick_leave(
            auth.user_id,
            req.start_date,
            req.end_date,
            reason,
            proof,
            Utc::now(),
        )
        .await?;

    Ok(HttpResponse::Created().json(SubmittedResponse::from(submitted)))
}

async fn list(
    auth: AuthUser,
    kind: LeaveKind,
    leave: &LeaveWorkflow,
    engine: &AttendanceEngine,
    query: LeaveFilter,
) -> actix_web::Result<HttpResponse> {
    let year = query.year.unwrap_or_else(|| current_year(engine));
    let filter = query.status.unwrap_or_default();

    let items = leave.list(auth.user_id, kind, year, filter).await?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        year,
        status_filter: filter,
        items: items.into_iter().map(LeaveResponse::from).collect(),
    }))
}

/// Own paid-leave requests, newest start date first
#[utoipa::path(
    get,
    path = "/api/leave/paid",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paid leave list", body = LeaveListResponse),
        (status = 400, description = "Unknown status filter"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn list_paid(
    auth: AuthUser,
    leave: web::Data<LeaveWorkflow>,
    engine: web::Data<AttendanceEngine>,
    query: web::Query<LeaveFilter>,
) -> actix_web::Result<impl Responder> {
    list(auth, LeaveKind::Paid, &leave, &engine, query.into_inner()).await
}

/// Own sick-leave requests, newest start date first
#[utoipa::path(
    get,
    path = "/api/leave/sick",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Sick leave list", body = LeaveListResponse),
        (status = 400, description = "Unknown status filter"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn list_sick(
    auth: AuthUser,
    leave: web::Data<LeaveWorkflow>,
    engine: web::Data<AttendanceEngine>,
    query: web::Query<LeaveFilter>,
) -> actix_web::Result<impl Responder> {
    list(auth, LeaveKind::Sick, &leave, &engine, query.into_inner()).await
}

async fn decide(
    auth: AuthUser,
    leave: &LeaveWorkflow,
    id: u64,
    kind: LeaveKind,
    decision: Decision,
) -> actix_web::Result<HttpResponse> {
    let decided = leave.decide(auth.user_id, id, kind, decision, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(DecisionResponse::from(decided)))
}

/// Approve a paid-leave request; the quota is re-checked
#[utoipa::path(
    post,
    path = "/api/leave/paid/{id}/approve",
    params(("id" = u64, Path, description = "Leave request id")),
    responses(
        (status = 200, description = "Approved", body = DecisionResponse),
        (status = 400, description = "Request is sick leave"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Already decided"),
        (status = 422, description = "Not enough quota left"),
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn approve_paid(
    auth: AuthUser,
    leave: web::Data<LeaveWorkflow>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    decide(auth, &leave, path.into_inner(), LeaveKind::Paid, Decision::Approve).await
}

/// Reject a paid-leave request
#[utoipa::path(
    post,
    path = "/api/leave/paid/{id}/reject",
    params(("id" = u64, Path, description = "Leave request id")),
    responses(
        (status = 200, description = "Rejected", body = DecisionResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Already decided"),
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_paid(
    auth: AuthUser,
    leave: web::Data<LeaveWorkflow>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    decide(auth, &leave, path.into_inner(), LeaveKind::Paid, Decision::Reject).await
}

/// Approve a sick-leave request
#[utoipa::path(
    post,
    path = "/api/leave/sick/{id}/approve",
    params(("id" = u64, Path, description = "Leave request id")),
    responses(
        (status = 200, description = "Approved", body = DecisionResponse),
        (status = 400, description = "Request is paid leave"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Already decided"),
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn approve_sick(
    auth: AuthUser,
    leave: web::Data<LeaveWorkflow>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    decide(auth, &leave, path.into_inner(), LeaveKind::Sick, Decision::Approve).await
}

/// Reject a sick-leave request
#[utoipa::path(
    post,
    path = "/api/leave/sick/{id}/reject",
    params(("id" = u64, Path, description = "Leave request id")),
    responses(
        (status = 200, description = "Rejected", body = DecisionResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Already decided"),
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_sick(
    auth: AuthUser,
    leave: web::Data<LeaveWorkflow>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    decide(auth, &leave, path.into_inner(), LeaveKind::Sick, Decision::Reject).await
}
