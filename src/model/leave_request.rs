use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Paid leave ("cuti") consumes the annual quota; sick leave ("sakit") does not.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveKind {
    Paid,
    Sick,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

/// `status` query filter for listings.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Approved,
    Rejected,
}

impl StatusFilter {
    pub fn status(self) -> Option<LeaveStatus> {
        match self {
            StatusFilter::All => None,
            StatusFilter::Pending => Some(LeaveStatus::Pending),
            StatusFilter::Approved => Some(LeaveStatus::Approved),
            StatusFilter::Rejected => Some(LeaveStatus::Rejected),
        }
    }

    pub fn matches(self, status: LeaveStatus) -> bool {
        self.status().is_none_or(|s| s == status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn target_status(self) -> LeaveStatus {
        match self {
            Decision::Approve => LeaveStatus::Approved,
            Decision::Reject => LeaveStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaveRequest {
    pub id: u64,
    pub user_id: u64,
    pub kind: LeaveKind,
    pub status: LeaveStatus,
    pub reason: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: i64,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    /// Doctor's note, base64 JPEG (sick leave only)
    pub proof: Option<String>,
}

impl LeaveRequest {
    /// Quota year the request is charged to.
    pub fn year(&self) -> i32 {
        self.start_date.year()
    }

    pub fn has_proof(&self) -> bool {
        self.proof.as_deref().is_some_and(|p| !p.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct NewLeaveRequest {
    pub user_id: u64,
    pub kind: LeaveKind,
    pub reason: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: i64,
    pub proof: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Character limit of `leave_requests.reason`.
pub const MAX_REASON_LEN: usize = 500;

/// Inclusive day span, or `None` when `end` is before `start`.
pub fn inclusive_days(start: NaiveDate, end: NaiveDate) -> Option<i64> {
    if end < start {
        return None;
    }
    Some((end - start).num_days() + 1)
}

/// Paid-leave balance for one user and year. Derived on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QuotaSnapshot {
    #[schema(example = 2025)]
    pub year: i32,
    #[schema(example = 12)]
    pub quota_days: i64,
    #[schema(example = 5)]
    pub used_days: i64,
    #[schema(example = 7)]
    pub remaining_days: i64,
}

impl QuotaSnapshot {
    pub fn new(year: i32, quota_days: i64, used_days: i64) -> Self {
        let used_days = used_days.max(0);
        Self {
            year,
            quota_days,
            used_days,
            remaining_days: quota_days - used_days,
        }
    }

    pub fn allows(&self, days: i64) -> bool {
        days <= self.remaining_days
    }
}

/// Flat shape of the `leave_requests` table.
#[derive(Debug, sqlx::FromRow)]
pub struct LeaveRow {
    pub id: u64,
    pub user_id: u64,
    pub kind: String,
    pub status: String,
    pub reason: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: i64,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub proof: Option<String>,
}

impl TryFrom<LeaveRow> for LeaveRequest {
    type Error = strum::ParseError;

    fn try_from(row: LeaveRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            kind: row.kind.parse()?,
            status: row.status.parse()?,
            reason: row.reason.unwrap_or_default(),
            start_date: row.start_date,
            end_date: row.end_date,
            days: row.days,
            created_at: row.created_at,
            decided_at: row.decided_at,
            proof: row.proof,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_inclusive_days() {
        assert_eq!(inclusive_days(date(2025, 3, 10), date(2025, 3, 14)), Some(5));
        assert_eq!(inclusive_days(date(2025, 3, 10), date(2025, 3, 10)), Some(1));
        assert_eq!(inclusive_days(date(2025, 2, 27), date(2025, 3, 2)), Some(4));
        assert_eq!(inclusive_days(date(2025, 3, 10), date(2025, 3, 9)), None);
    }

    #[test]
    fn test_quota_snapshot_arithmetic() {
        let q = QuotaSnapshot::new(2025, 12, 5);
        assert_eq!(q.remaining_days, 7);
        assert_eq!(q.used_days + q.remaining_days, q.quota_days);
        assert!(q.allows(7));
        assert!(!q.allows(8));
    }

    #[test]
    fn test_enum_text_forms() {
        assert_eq!(LeaveKind::Paid.as_ref(), "paid");
        assert_eq!("sick".parse::<LeaveKind>().unwrap(), LeaveKind::Sick);
        assert_eq!(LeaveStatus::Approved.to_string(), "approved");
        assert!("cancelled".parse::<LeaveStatus>().is_err());
        assert_eq!("rejected".parse::<StatusFilter>().unwrap(), StatusFilter::Rejected);
        assert_eq!(StatusFilter::default(), StatusFilter::All);
    }

    #[test]
    fn test_status_filter_matches() {
        assert!(StatusFilter::All.matches(LeaveStatus::Rejected));
        assert!(StatusFilter::Pending.matches(LeaveStatus::Pending));
        assert!(!StatusFilter::Pending.matches(LeaveStatus::Approved));
    }
}
