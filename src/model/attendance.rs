use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::utils::geo::Position;

/// One side of a day record: where and when the user punched in or out.
#[derive(Debug, Clone, PartialEq)]
pub struct PunchMark {
    pub at: DateTime<Utc>,
    pub position: Position,
    pub distance_m: f64,
    /// Normalized selfie, base64 JPEG
    pub selfie: Option<String>,
}

/// One row per (user, office-local date).
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceDay {
    pub id: u64,
    pub user_id: u64,
    pub date: NaiveDate,
    pub check_in: Option<PunchMark>,
    pub check_out: Option<PunchMark>,
}

impl AttendanceDay {
    /// Check-out minus check-in, unclamped. `None` until both are set.
    pub fn raw_worked_seconds(&self) -> Option<i64> {
        match (&self.check_in, &self.check_out) {
            (Some(i), Some(o)) => Some((o.at - i.at).num_seconds()),
            _ => None,
        }
    }

    /// Whole seconds worked, never negative.
    pub fn worked_seconds(&self) -> i64 {
        self.raw_worked_seconds().unwrap_or(0).max(0)
    }

    pub fn has_mark(&self) -> bool {
        self.check_in.is_some() || self.check_out.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayState {
    NoRecord,
    CheckedIn,
    CheckedOut,
}

impl DayState {
    pub fn of(day: Option<&AttendanceDay>) -> Self {
        match day {
            Some(d) if d.check_out.is_some() => DayState::CheckedOut,
            Some(d) if d.check_in.is_some() => DayState::CheckedIn,
            _ => DayState::NoRecord,
        }
    }

    pub fn next_action(self) -> Option<NextAction> {
        match self {
            DayState::NoRecord => Some(NextAction::CheckIn),
            DayState::CheckedIn => Some(NextAction::CheckOut),
            DayState::CheckedOut => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    CheckIn,
    CheckOut,
}

/// Flat shape of the `attendance_days` table.
#[derive(Debug, sqlx::FromRow)]
pub struct AttendanceRow {
    pub id: u64,
    pub user_id: u64,
    pub date: NaiveDate,
    pub check_in_at: Option<DateTime<Utc>>,
    pub check_in_lat: Option<f64>,
    pub check_in_lng: Option<f64>,
    pub check_in_distance_m: Option<f64>,
    pub check_in_photo: Option<String>,
    pub check_out_at: Option<DateTime<Utc>>,
    pub check_out_lat: Option<f64>,
    pub check_out_lng: Option<f64>,
    pub check_out_distance_m: Option<f64>,
    pub check_out_photo: Option<String>,
}

fn mark(
    at: Option<DateTime<Utc>>,
    lat: Option<f64>,
    lng: Option<f64>,
    distance_m: Option<f64>,
    selfie: Option<String>,
) -> Option<PunchMark> {
    at.map(|at| PunchMark {
        at,
        position: Position::new(lat.unwrap_or_default(), lng.unwrap_or_default()),
        distance_m: distance_m.unwrap_or_default(),
        selfie,
    })
}

impl From<AttendanceRow> for AttendanceDay {
    fn from(row: AttendanceRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            date: row.date,
            check_in: mark(
                row.check_in_at,
                row.check_in_lat,
                row.check_in_lng,
                row.check_in_distance_m,
                row.check_in_photo,
            ),
            check_out: mark(
                row.check_out_at,
                row.check_out_lat,
                row.check_out_lng,
                row.check_out_distance_m,
                row.check_out_photo,
            ),
        }
    }
}
