use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::utils::geo::{Position, distance_meters};

/// The single office every check-in/check-out is measured against.
#[derive(Debug, Clone)]
pub struct OfficeConfig {
    pub center: Position,
    /// Geofence radius in meters
    pub radius_m: f64,
    /// GPS noise tolerance added on top of the radius
    pub epsilon_m: f64,
    pub timezone: Tz,
}

impl Default for OfficeConfig {
    fn default() -> Self {
        Self {
            center: Position::new(-7.688260, 110.187048),
            radius_m: 20.0,
            epsilon_m: 5.0,
            timezone: chrono_tz::Asia::Jakarta,
        }
    }
}

impl OfficeConfig {
    pub fn distance_from(&self, position: Position) -> f64 {
        distance_meters(position, self.center)
    }

    pub fn inside_radius(&self, distance_m: f64) -> bool {
        distance_m <= self.radius_m + self.epsilon_m
    }

    /// Calendar date of `instant` in the office timezone. This is the day key
    /// for attendance rows; never derive it from client input.
    pub fn office_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.timezone).date_naive()
    }

    pub fn office_year(&self, instant: DateTime<Utc>) -> i32 {
        self.office_date(instant).year()
    }

    /// First day of the month containing `date`, and the first day of the next one.
    pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
        let start = date.with_day(1).unwrap_or(date);
        let end = if start.month() == 12 {
            NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
        };
        (start, end.unwrap_or(NaiveDate::MAX))
    }
}

/// Paid-leave ("cuti") policy.
#[derive(Debug, Clone)]
pub struct LeavePolicy {
    pub annual_quota_days: i64,
}

impl Default for LeavePolicy {
    fn default() -> Self {
        Self {
            annual_quota_days: 12,
        }
    }
}
