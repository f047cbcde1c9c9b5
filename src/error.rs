//! Domain errors shared by the attendance engine and the leave workflow.
//!
//! The engines only return these values. Turning them into HTTP responses is
//! done here, at the boundary, through `ResponseError`.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::{Value, json};
use thiserror::Error;

use crate::repo::StoreError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("outside office radius ({distance_m:.1} m, radius {radius_m} m)")]
    OutsideGeofence { distance_m: f64, radius_m: f64 },

    #[error("already checked in today")]
    AlreadyCheckedIn,

    #[error("not checked in yet or already checked out")]
    NotCheckedInOrAlreadyCheckedOut,

    #[error("invalid date range")]
    InvalidDateRange,

    #[error("proof attachment required")]
    ProofRequired,

    #[error("quota exceeded: requested {requested_days} day(s), {remaining_days} remaining")]
    QuotaExceeded { requested_days: i64, remaining_days: i64 },

    #[error("leave request not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("leave request has a different kind")]
    InvalidKind,

    #[error("leave request already decided")]
    Conflict,

    #[error("reset is disabled in production")]
    ResetDisabled,

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl CoreError {
    /// Machine-readable code used in the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::OutsideGeofence { .. } => "outside_radius",
            CoreError::AlreadyCheckedIn => "already_checked_in",
            CoreError::NotCheckedInOrAlreadyCheckedOut => "not_checked_in_yet_or_already_checked_out",
            CoreError::InvalidDateRange => "invalid_date_range",
            CoreError::ProofRequired => "proof_required",
            CoreError::QuotaExceeded { .. } => "quota_exceeded",
            CoreError::NotFound => "not_found",
            CoreError::Forbidden => "forbidden",
            CoreError::InvalidKind => "invalid_kind",
            CoreError::Conflict => "conflict",
            CoreError::ResetDisabled => "reset_disabled",
            CoreError::StoreUnavailable(_) => "internal_error",
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            CoreError::OutsideGeofence {
                distance_m,
                radius_m,
            } => Some(json!({ "distance_m": distance_m, "radius_m": radius_m })),
            CoreError::QuotaExceeded {
                requested_days,
                remaining_days,
            } => Some(json!({
                "requested_days": requested_days,
                "remaining_days": remaining_days,
            })),
            _ => None,
        }
    }
}

impl ResponseError for CoreError {
    fn status_code(&self) -> StatusCode {
        match self {
            CoreError::OutsideGeofence { .. } | CoreError::QuotaExceeded { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            CoreError::AlreadyCheckedIn
            | CoreError::NotCheckedInOrAlreadyCheckedOut
            | CoreError::Conflict => StatusCode::CONFLICT,
            CoreError::InvalidDateRange | CoreError::ProofRequired | CoreError::InvalidKind => {
                StatusCode::BAD_REQUEST
            }
            CoreError::NotFound => StatusCode::NOT_FOUND,
            CoreError::Forbidden | CoreError::ResetDisabled => StatusCode::FORBIDDEN,
            CoreError::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // never leak database details to the client
        let message = match self {
            CoreError::StoreUnavailable(e) => {
                tracing::error!(error = %e, "Store operation failed");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };

        let mut body = json!({ "code": self.code(), "message": message });
        if let Some(details) = self.details() {
            body["details"] = details;
        }

        HttpResponse::build(self.status_code()).json(json!({ "error": body }))
    }
}

/// `{"error": {"code", "message"}}` body for failures raised outside the engines.
pub fn envelope(code: &str, message: impl Into<String>) -> Value {
    json!({ "error": { "code": code, "message": message.into() } })
}

/// 400 for requests the engines never see: bad fields, undecodable images.
pub fn bad_request(code: &str, message: impl Into<String>) -> actix_web::Error {
    actix_web::error::InternalError::from_response(
        code.to_string(),
        HttpResponse::BadRequest().json(envelope(code, message)),
    )
    .into()
}
