//! In-memory store used by engine and handler tests.
//!
//! Each operation runs under one mutex guard, mirroring the per-statement
//! atomicity the MySQL adapters rely on.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::model::attendance::{AttendanceDay, PunchMark};
use crate::model::leave_request::{
    LeaveKind, LeaveRequest, LeaveStatus, NewLeaveRequest, StatusFilter,
};
use crate::repo::{AttendanceStore, LeaveStore, QuotaGuard, StoreError, Transition};

#[derive(Default)]
struct State {
    next_id: u64,
    days: HashMap<(u64, NaiveDate), AttendanceDay>,
    leaves: HashMap<u64, LeaveRequest>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn approved_days(&self, user_id: u64, kind: LeaveKind, year: i32) -> i64 {
        self.leaves
            .values()
            .filter(|l| {
                l.user_id == user_id
                    && l.kind == kind
                    && l.status == LeaveStatus::Approved
                    && l.start_date.year() == year
            })
            .map(|l| l.days)
            .sum()
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    /// Every call sleeps this long first; used to exercise timeouts.
    stall: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stalled(delay: Duration) -> Self {
        Self {
            stall: Some(delay),
            ..Self::default()
        }
    }

    pub fn leave_count(&self) -> usize {
        self.lock().leaves.len()
    }

    pub fn day(&self, user_id: u64, date: NaiveDate) -> Option<AttendanceDay> {
        self.lock().days.get(&(user_id, date)).cloned()
    }

    /// Puts a row in place as-is, bypassing the state machine.
    pub fn seed_day(&self, day: AttendanceDay) {
        self.lock().days.insert((day.user_id, day.date), day);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("memory store poisoned")
    }

    async fn pause(&self) {
        if let Some(delay) = self.stall {
            actix_web::rt::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn find_day(&self, user_id: u64, date: NaiveDate) -> Result<Option<AttendanceDay>, StoreError> {
        self.pause().await;
        Ok(self.day(user_id, date))
    }

    async fn check_in(
        &self,
        user_id: u64,
        date: NaiveDate,
        mark: &PunchMark,
    ) -> Result<Option<AttendanceDay>, StoreError> {
        self.pause().await;
        let mut state = self.lock();
        let id = state.next_id();

        let day = state.days.entry((user_id, date)).or_insert_with(|| AttendanceDay {
            id,
            user_id,
            date,
            check_in: None,
            check_out: None,
        });
        if day.check_in.is_some() {
            return Ok(None);
        }
        day.check_in = Some(mark.clone());
        Ok(Some(day.clone()))
    }

    async fn check_out(
        &self,
        user_id: u64,
        date: NaiveDate,
        mark: &PunchMark,
    ) -> Result<Option<AttendanceDay>, StoreError> {
        self.pause().await;
        let mut state = self.lock();

        match state.days.get_mut(&(user_id, date)) {
            Some(day) if day.check_in.is_some() && day.check_out.is_none() => {
                day.check_out = Some(mark.clone());
                Ok(Some(day.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_day(&self, user_id: u64, date: NaiveDate) -> Result<u64, StoreError> {
        self.pause().await;
        Ok(self.lock().days.remove(&(user_id, date)).map_or(0, |_| 1))
    }

    async fn marked_days(&self, user_id: u64, from: NaiveDate, to: NaiveDate) -> Result<Vec<NaiveDate>, StoreError> {
        self.pause().await;
        let mut dates: Vec<NaiveDate> = self
            .lock()
            .days
            .values()
            .filter(|d| d.user_id == user_id && d.date >= from && d.date < to && d.has_mark())
            .map(|d| d.date)
            .collect();
        dates.sort();
        Ok(dates)
    }
}

#[async_trait]
impl LeaveStore for MemoryStore {
    async fn sum_approved_days(&self, user_id: u64, kind: LeaveKind, year: i32) -> Result<i64, StoreError> {
        self.pause().await;
        Ok(self.lock().approved_days(user_id, kind, year))
    }

    async fn insert(&self, request: NewLeaveRequest) -> Result<LeaveRequest, StoreError> {
        self.pause().await;
        let mut state = self.lock();
        let id = state.next_id();
        let row = LeaveRequest {
            id,
            user_id: request.user_id,
            kind: request.kind,
            status: LeaveStatus::Pending,
            reason: request.reason,
            start_date: request.start_date,
            end_date: request.end_date,
            days: request.days,
            created_at: request.created_at,
            decided_at: None,
            proof: request.proof,
        };
        state.leaves.insert(id, row.clone());
        Ok(row)
    }

    async fn find(&self, id: u64) -> Result<Option<LeaveRequest>, StoreError> {
        self.pause().await;
        Ok(self.lock().leaves.get(&id).cloned())
    }

    async fn transition(
        &self,
        id: u64,
        kind: LeaveKind,
        status: LeaveStatus,
        decided_at: DateTime<Utc>,
        guard: Option<QuotaGuard>,
    ) -> Result<Transition, StoreError> {
        self.pause().await;
        let mut state = self.lock();

        let days = match state.leaves.get(&id) {
            Some(l) if l.kind == kind && l.status == LeaveStatus::Pending => l.days,
            _ => return Ok(Transition::NotPending),
        };

        if let (LeaveStatus::Approved, Some(g)) = (status, guard) {
            let used = state.approved_days(g.user_id, kind, g.year);
            if used + days > g.quota_days {
                return Ok(Transition::OverQuota { used_days: used });
            }
        }

        if let Some(l) = state.leaves.get_mut(&id) {
            l.status = status;
            l.decided_at = Some(decided_at);
        }

        let used_days = guard.map(|g| state.approved_days(g.user_id, kind, g.year));
        Ok(Transition::Applied { used_days })
    }

    async fn list(
        &self,
        user_id: u64,
        kind: LeaveKind,
        year: i32,
        filter: StatusFilter,
    ) -> Result<Vec<LeaveRequest>, StoreError> {
        self.pause().await;
        let mut rows: Vec<LeaveRequest> = self
            .lock()
            .leaves
            .values()
            .filter(|l| {
                l.user_id == user_id
                    && l.kind == kind
                    && l.start_date.year() == year
                    && filter.matches(l.status)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.start_date
                .cmp(&a.start_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(rows)
    }
}
