use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::error::CoreError;
use crate::model::attendance::{AttendanceDay, DayState, NextAction, PunchMark};
use crate::repo::{AttendanceStore, with_timeout};
use crate::utils::geo::{Position, round1};
use crate::utils::office::OfficeConfig;

/// Today's record as seen by the client.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DayStatus {
    #[schema(example = "2025-03-10", format = "date", value_type = String)]
    pub date: NaiveDate,
    pub has_record: bool,
    #[schema(example = "2025-03-10T01:00:00Z", format = "date-time", value_type = Option<String>)]
    pub check_in_at: Option<DateTime<Utc>>,
    #[schema(example = "2025-03-10T10:00:00Z", format = "date-time", value_type = Option<String>)]
    pub check_out_at: Option<DateTime<Utc>>,
    pub worked_seconds: i64,
    pub next_action: Option<NextAction>,
}

impl DayStatus {
    pub fn of(date: NaiveDate, day: Option<&AttendanceDay>) -> Self {
        Self {
            date,
            has_record: day.is_some(),
            check_in_at: day.and_then(|d| d.check_in.as_ref()).map(|m| m.at),
            check_out_at: day.and_then(|d| d.check_out.as_ref()).map(|m| m.at),
            worked_seconds: day.map_or(0, worked_seconds),
            next_action: DayState::of(day).next_action(),
        }
    }
}

/// Result of a successful check-in or check-out.
#[derive(Debug, Clone)]
pub struct Punched {
    pub day: AttendanceDay,
    pub distance_m: f64,
    pub status: DayStatus,
}

pub struct AttendanceEngine {
    store: Arc<dyn AttendanceStore>,
    office: OfficeConfig,
    timeout: Duration,
    production: bool,
}

impl AttendanceEngine {
    pub fn new(store: Arc<dyn AttendanceStore>, office: OfficeConfig, timeout: Duration, production: bool) -> Self {
        Self {
            store,
            office,
            timeout,
            production,
        }
    }

    pub fn office(&self) -> &OfficeConfig {
        &self.office
    }

    /// Distance to the office, rounded to 0.1 m, if `position` is admitted.
    pub fn admit(&self, position: Position) -> Result<f64, CoreError> {
        let distance_m = self.office.distance_from(position);
        if !self.office.inside_radius(distance_m) {
            info!(distance_m, radius_m = self.office.radius_m, "Outside office radius");
            return Err(CoreError::OutsideGeofence {
                distance_m: round1(distance_m),
                radius_m: self.office.radius_m,
            });
        }
        Ok(round1(distance_m))
    }

    #[instrument(skip(self))]
    pub async fn get_status(&self, user_id: u64, now: DateTime<Utc>) -> Result<DayStatus, CoreError> {
        let date = self.office.office_date(now);
        let day = with_timeout(self.timeout, self.store.find_day(user_id, date)).await?;

        Ok(DayStatus::of(date, day.as_ref()))
    }

    #[instrument(skip(self, selfie))]
    pub async fn check_in(
        &self,
        user_id: u64,
        now: DateTime<Utc>,
        position: Position,
        selfie: Option<String>,
    ) -> Result<Punched, CoreError> {
        let distance_m = self.admit(position)?;
        let date = self.office.office_date(now);
        let mark = PunchMark {
            at: now,
            position,
            distance_m,
            selfie,
        };

        match with_timeout(self.timeout, self.store.check_in(user_id, date, &mark)).await? {
            Some(day) => {
                info!(%date, distance_m, "Checked in");
                Ok(Punched {
                    status: DayStatus::of(date, Some(&day)),
                    day,
                    distance_m,
                })
            }
            None => {
                info!(%date, "Rejected duplicate check-in");
                Err(CoreError::AlreadyCheckedIn)
            }
        }
    }

    #[instrument(skip(self, selfie))]
    pub async fn check_out(
        &self,
        user_id: u64,
        now: DateTime<Utc>,
        position: Position,
        selfie: Option<String>,
    ) -> Result<Punched, CoreError> {
        let distance_m = self.admit(position)?;
        let date = self.office.office_date(now);
        let mark = PunchMark {
            at: now,
            position,
            distance_m,
            selfie,
        };

        match with_timeout(self.timeout, self.store.check_out(user_id, date, &mark)).await? {
            Some(day) => {
                let status = DayStatus::of(date, Some(&day));
                info!(%date, distance_m, worked_seconds = status.worked_seconds, "Checked out");
                Ok(Punched {
                    day,
                    distance_m,
                    status,
                })
            }
            None => {
                info!(%date, "Rejected check-out");
                Err(CoreError::NotCheckedInOrAlreadyCheckedOut)
            }
        }
    }

    /// Deletes the user's row for `date`. Returns the number of rows removed.
    #[instrument(skip(self))]
    pub async fn reset_day(&self, user_id: u64, date: NaiveDate) -> Result<u64, CoreError> {
        if self.production {
            warn!("Refused attendance reset in production");
            return Err(CoreError::ResetDisabled);
        }

        let deleted = with_timeout(self.timeout, self.store.delete_day(user_id, date)).await?;
        info!(deleted, "Attendance day reset");
        Ok(deleted)
    }

    /// Dates in `[from, to)` carrying a check-in or a check-out.
    #[instrument(skip(self))]
    pub async fn list_marked_days(&self, user_id: u64, from: NaiveDate, to: NaiveDate) -> Result<Vec<NaiveDate>, CoreError> {
        Ok(with_timeout(self.timeout, self.store.marked_days(user_id, from, to)).await?)
    }

    #[instrument(skip(self))]
    pub async fn get_day(&self, user_id: u64, date: NaiveDate) -> Result<Option<AttendanceDay>, CoreError> {
        Ok(with_timeout(self.timeout, self.store.find_day(user_id, date)).await?)
    }
}

/// Worked seconds of a day, clamped at zero. Negative raw values are logged.
pub fn worked_seconds(day: &AttendanceDay) -> i64 {
    if let Some(raw) = day.raw_worked_seconds()
        && raw < 0
    {
        warn!(
            user_id = day.user_id,
            date = %day.date,
            raw_seconds = raw,
            "Check-out precedes check-in; clamping worked seconds to 0"
        );
    }
    day.worked_seconds()
}
