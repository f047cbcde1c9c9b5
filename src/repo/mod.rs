//! Persistence ports for the attendance engine and the leave workflow.
//!
//! Every mutating method is a single conditional operation against the store,
//! so concurrent requests for the same key resolve inside the database rather
//! than in process memory.

pub mod attendance_repo;
pub mod leave_repo;
#[cfg(test)]
pub mod memory;
pub mod user_repo;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::mysql::MySqlDatabaseError;
use thiserror::Error;

use crate::model::attendance::{AttendanceDay, PunchMark};
use crate::model::leave_request::{LeaveKind, LeaveRequest, LeaveStatus, NewLeaveRequest, StatusFilter};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed row: {0}")]
    InvalidRow(String),
}

/// `ER_DUP_ENTRY`. SQLSTATE 23000 alone also covers foreign-key failures.
pub const ER_DUP_ENTRY: u16 = 1062;

/// True only for a UNIQUE/PRIMARY key collision.
pub fn is_duplicate(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .try_downcast_ref::<MySqlDatabaseError>()
            .is_some_and(|e| e.number() == ER_DUP_ENTRY),
        _ => false,
    }
}

/// Runs a store operation with a deadline.
pub async fn with_timeout<T, F>(limit: Duration, op: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    actix_web::rt::time::timeout(limit, op)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
}

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn find_day(&self, user_id: u64, date: NaiveDate) -> Result<Option<AttendanceDay>, StoreError>;

    /// Insert the day with `mark` as its check-in, or fill the check-in of an
    /// existing row whose check-in is still empty. Returns `None` when the day
    /// already had a check-in; nothing is written in that case.
    async fn check_in(
        &self,
        user_id: u64,
        date: NaiveDate,
        mark: &PunchMark,
    ) -> Result<Option<AttendanceDay>, StoreError>;

    /// Set the check-out only if the day has a check-in and no check-out.
    /// Returns `None` when the predicate did not hold.
    async fn check_out(
        &self,
        user_id: u64,
        date: NaiveDate,
        mark: &PunchMark,
    ) -> Result<Option<AttendanceDay>, StoreError>;

    /// Removes the day, returning the number of rows deleted.
    async fn delete_day(&self, user_id: u64, date: NaiveDate) -> Result<u64, StoreError>;

    /// Ascending dates in `[from, to)` with a check-in or check-out.
    async fn marked_days(&self, user_id: u64, from: NaiveDate, to: NaiveDate) -> Result<Vec<NaiveDate>, StoreError>;
}

/// Extra predicate applied atomically with a paid-leave approval.
#[derive(Debug, Clone, Copy)]
pub struct QuotaGuard {
    pub user_id: u64,
    pub year: i32,
    pub quota_days: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Status changed; `used_days` is the approved paid total for the guarded
    /// year after the write (only reported when a guard was given).
    Applied { used_days: Option<i64> },
    /// The row was no longer pending (or had another kind).
    NotPending,
    /// Approving would exceed the quota; nothing was written.
    OverQuota { used_days: i64 },
}

#[async_trait]
pub trait LeaveStore: Send + Sync {
    /// Σ days of approved requests of `kind` starting in `year`.
    async fn sum_approved_days(&self, user_id: u64, kind: LeaveKind, year: i32) -> Result<i64, StoreError>;

    async fn insert(&self, request: NewLeaveRequest) -> Result<LeaveRequest, StoreError>;

    async fn find(&self, id: u64) -> Result<Option<LeaveRequest>, StoreError>;

    /// Moves a pending request of `kind` to `status`.
    async fn transition(
        &self,
        id: u64,
        kind: LeaveKind,
        status: LeaveStatus,
        decided_at: DateTime<Utc>,
        guard: Option<QuotaGuard>,
    ) -> Result<Transition, StoreError>;

    /// Start date descending, then creation time descending.
    async fn list(
        &self,
        user_id: u64,
        kind: LeaveKind,
        year: i32,
        filter: StatusFilter,
    ) -> Result<Vec<LeaveRequest>, StoreError>;
}
