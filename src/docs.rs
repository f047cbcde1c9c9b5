use crate::api::attendance::{
    DayEvent, DayResponse, MarksResponse, OfficeResponse, PunchReq, PunchResponse, StatusReq, StatusResponse,
};
use crate::api::leave_request::{
    DecisionResponse, LeaveListResponse, LeaveResponse, PaidLeaveReq, SickLeaveReq, SubmittedResponse,
};
use crate::auth::handlers::MeResponse;
use crate::model::attendance::NextAction;
use crate::model::leave_request::{LeaveKind, LeaveStatus, QuotaSnapshot};
use crate::models::{LoginReqDto, RegisterReq, TokenPair};
use crate::service::attendance::DayStatus;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Presence API",
        version = "0.1.0",
        description = r#"
## Office attendance and leave

### Attendance
- Daily check-in and check-out, admitted only inside the office geofence
- A selfie is required for every punch
- Monthly calendar of marked days and a per-day detail view

### Leave
- **Paid leave** draws from an annual quota (12 days by default)
- **Sick leave** requires a doctor's note and does not touch the quota
- Requests start pending and are approved or rejected once

### Security
Every endpoint below is protected with **JWT Bearer authentication**.
Tokens come from `POST /auth/login` and are rotated with `POST /auth/refresh`.

### Errors
Failures share one envelope: `{"error": {"code", "message", "details"}}`.
"#,
    ),
    paths(
        crate::auth::handlers::me,

        crate::api::attendance::office_config,
        crate::api::attendance::status,
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::marks,
        crate::api::attendance::day,

        crate::api::leave_request::quota,
        crate::api::leave_request::request_paid,
        crate::api::leave_request::list_paid,
        crate::api::leave_request::approve_paid,
        crate::api::leave_request::reject_paid,
        crate::api::leave_request::request_sick,
        crate::api::leave_request::list_sick,
        crate::api::leave_request::approve_sick,
        crate::api::leave_request::reject_sick
    ),
    components(
        schemas(
            MeResponse,
            RegisterReq,
            LoginReqDto,
            TokenPair,
            OfficeResponse,
            StatusReq,
            StatusResponse,
            DayStatus,
            NextAction,
            PunchReq,
            PunchResponse,
            MarksResponse,
            DayEvent,
            DayResponse,
            LeaveKind,
            LeaveStatus,
            QuotaSnapshot,
            PaidLeaveReq,
            SickLeaveReq,
            LeaveResponse,
            SubmittedResponse,
            DecisionResponse,
            LeaveListResponse
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Auth", description = "Current user"),
        (name = "Attendance", description = "Geofenced check-in and check-out"),
        (name = "Leave", description = "Paid and sick leave requests"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
