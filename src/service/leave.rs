use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use tracing::{info, instrument};

use crate::error::CoreError;
use crate::model::leave_request::{
    Decision, LeaveKind, LeaveRequest, LeaveStatus, NewLeaveRequest, QuotaSnapshot, StatusFilter,
    inclusive_days,
};
use crate::repo::{LeaveStore, QuotaGuard, Transition, with_timeout};
use crate::utils::office::LeavePolicy;

/// A freshly created request. Paid requests carry the balance they were
/// checked against.
#[derive(Debug, Clone)]
pub struct Submitted {
    pub request: LeaveRequest,
    pub quota: Option<QuotaSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decided {
    pub id: u64,
    pub status: LeaveStatus,
    /// Balance after the decision, paid leave only.
    pub quota: Option<QuotaSnapshot>,
}

pub struct LeaveWorkflow {
    store: Arc<dyn LeaveStore>,
    policy: LeavePolicy,
    timeout: Duration,
}

impl LeaveWorkflow {
    pub fn new(store: Arc<dyn LeaveStore>, policy: LeavePolicy, timeout: Duration) -> Self {
        Self {
            store,
            policy,
            timeout,
        }
    }

    #[instrument(skip(self))]
    pub async fn get_quota(&self, user_id: u64, year: i32) -> Result<QuotaSnapshot, CoreError> {
        let used = with_timeout(
            self.timeout,
            self.store.sum_approved_days(user_id, LeaveKind::Paid, year),
        )
        .await?;

        Ok(QuotaSnapshot::new(year, self.policy.annual_quota_days, used))
    }

    /// Paid leave is charged to the year its start date falls in. The
    /// balance is checked here but nothing is reserved until approval.
    #[instrument(skip(self, reason))]
    pub async fn request_paid_leave(
        &self,
        user_id: u64,
        start_date: NaiveDate,
        end_date: NaiveDate,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<Submitted, CoreError> {
        let days = inclusive_days(start_date, end_date).ok_or(CoreError::InvalidDateRange)?;
        let quota = self.get_quota(user_id, start_date.year()).await?;

        if !quota.allows(days) {
            info!(days, remaining = quota.remaining_days, "Paid leave over quota");
            return Err(CoreError::QuotaExceeded {
                requested_days: days,
                remaining_days: quota.remaining_days,
            });
        }

        let request = NewLeaveRequest {
            user_id,
            kind: LeaveKind::Paid,
            reason,
            start_date,
            end_date,
            days,
            proof: None,
            created_at: now,
        };
        let request = with_timeout(self.timeout, self.store.insert(request)).await?;
        info!(id = request.id, days, "Paid leave requested");

        Ok(Submitted {
            request,
            quota: Some(quota),
        })
    }

    #[instrument(skip(self, reason, proof))]
    pub async fn request_sick_leave(
        &self,
        user_id: u64,
        start_date: NaiveDate,
        end_date: NaiveDate,
        reason: String,
        proof: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Submitted, CoreError> {
        let days = inclusive_days(start_date, end_date).ok_or(CoreError::InvalidDateRange)?;
        let proof = proof
            .filter(|p| !p.trim().is_empty())
            .ok_or(CoreError::ProofRequired)?;

        let request = NewLeaveRequest {
            user_id,
            kind: LeaveKind::Sick,
            reason,
            start_date,
            end_date,
            days,
            proof: Some(proof),
            created_at: now,
        };
        let request = with_timeout(self.timeout, self.store.insert(request)).await?;
        info!(id = request.id, days, "Sick leave requested");

        Ok(Submitted {
            request,
            quota: None,
        })
    }

    /// Approves or rejects a pending request. Only the owner may decide, and
    /// `kind` must match the request. Approving paid leave re-checks the
    /// balance atomically with the status change.
    #[instrument(skip(self))]
    pub async fn decide(
        &self,
        acting_user: u64,
        id: u64,
        kind: LeaveKind,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<Decided, CoreError> {
        let request = with_timeout(self.timeout, self.store.find(id))
            .await?
            .ok_or(CoreError::NotFound)?;

        if request.user_id != acting_user {
            return Err(CoreError::Forbidden);
        }
        if request.kind != kind {
            return Err(CoreError::InvalidKind);
        }
        if request.status != LeaveStatus::Pending {
            return Err(CoreError::Conflict);
        }

        let year = request.year();
        let guard = (kind == LeaveKind::Paid).then_some(QuotaGuard {
            user_id: request.user_id,
            year,
            quota_days: self.policy.annual_quota_days,
        });
        let status = decision.target_status();

        let transition = with_timeout(
            self.timeout,
            self.store.transition(id, kind, status, now, guard),
        )
        .await?;

        match transition {
            Transition::Applied { used_days } => {
                info!(%status, "Leave request decided");
                Ok(Decided {
                    id,
                    status,
                    quota: used_days.map(|used| QuotaSnapshot::new(year, self.policy.annual_quota_days, used)),
                })
            }
            Transition::NotPending => {
                info!("Leave request decided concurrently");
                Err(CoreError::Conflict)
            }
            Transition::OverQuota { used_days } => {
                let remaining = QuotaSnapshot::new(year, self.policy.annual_quota_days, used_days).remaining_days;
                info!(days = request.days, remaining, "Approval over quota");
                Err(CoreError::QuotaExceeded {
                    requested_days: request.days,
                    remaining_days: remaining,
                })
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        user_id: u64,
        kind: LeaveKind,
        year: i32,
        filter: StatusFilter,
    ) -> Result<Vec<LeaveRequest>, CoreError> {
        Ok(with_timeout(self.timeout, self.store.list(user_id, kind, year, filter)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::memory::MemoryStore;
    use chrono::TimeZone;
    use futures::future::join_all;

    const USER: u64 = 3;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 3, 0, 0).unwrap()
    }

    fn workflow(store: MemoryStore) -> LeaveWorkflow {
        LeaveWorkflow::new(Arc::new(store), LeavePolicy::default(), Duration::from_millis(200))
    }

    async fn paid(flow: &LeaveWorkflow, start: NaiveDate, end: NaiveDate) -> LeaveRequest {
        flow.request_paid_leave(USER, start, end, "family".into(), now())
            .await
            .unwrap()
            .request
    }

    #[actix_web::test]
    async fn test_quota_after_approval_and_over_request() {
        let store = MemoryStore::new();
        let flow = workflow(store.clone());

        let submitted = flow
            .request_paid_leave(USER, date(4, 1), date(4, 5), "trip".into(), now())
            .await
            .unwrap();
        assert_eq!(submitted.request.days, 5);
        assert_eq!(submitted.request.status, LeaveStatus::Pending);
        assert_eq!(submitted.quota.unwrap().remaining_days, 12);

        let decided = flow
            .decide(USER, submitted.request.id, LeaveKind::Paid, Decision::Approve, now())
            .await
            .unwrap();
        assert_eq!(decided.status, LeaveStatus::Approved);
        assert_eq!(decided.quota, Some(QuotaSnapshot::new(2025, 12, 5)));

        let quota = flow.get_quota(USER, 2025).await.unwrap();
        assert_eq!((quota.used_days, quota.remaining_days), (5, 7));

        let err = flow
            .request_paid_leave(USER, date(6, 1), date(6, 10), "long trip".into(), now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::QuotaExceeded {
                requested_days: 10,
                remaining_days: 7
            }
        ));
        assert_eq!(store.leave_count(), 1);
    }

    #[actix_web::test]
    async fn test_invalid_range_rejected() {
        let store = MemoryStore::new();
        let flow = workflow(store.clone());

        let err = flow
            .request_paid_leave(USER, date(4, 5), date(4, 1), "x".into(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidDateRange));

        let err = flow
            .request_sick_leave(USER, date(4, 5), date(4, 1), "x".into(), Some("abc".into()), now())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidDateRange));
        assert_eq!(store.leave_count(), 0);
    }

    #[actix_web::test]
    async fn test_sick_leave_needs_proof_and_skips_quota() {
        let store = MemoryStore::new();
        let flow = workflow(store.clone());

        for proof in [None, Some("  ".to_string())] {
            let err = flow
                .request_sick_leave(USER, date(2, 3), date(2, 4), "flu".into(), proof, now())
                .await
                .unwrap_err();
            assert!(matches!(err, CoreError::ProofRequired));
        }

        // longer than the whole paid quota
        let submitted = flow
            .request_sick_leave(USER, date(2, 3), date(2, 20), "surgery".into(), Some("note".into()), now())
            .await
            .unwrap();
        assert!(submitted.quota.is_none());
        assert!(submitted.request.has_proof());

        let decided = flow
            .decide(USER, submitted.request.id, LeaveKind::Sick, Decision::Approve, now())
            .await
            .unwrap();
        assert_eq!(decided.quota, None);
        assert_eq!(flow.get_quota(USER, 2025).await.unwrap().used_days, 0);
    }

    #[actix_web::test]
    async fn test_decision_guards() {
        let flow = workflow(MemoryStore::new());
        let request = paid(&flow, date(3, 3), date(3, 4)).await;

        let err = flow
            .decide(USER, 404, LeaveKind::Paid, Decision::Approve, now())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound));

        let err = flow
            .decide(USER + 1, request.id, LeaveKind::Paid, Decision::Approve, now())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden));

        let err = flow
            .decide(USER, request.id, LeaveKind::Sick, Decision::Approve, now())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidKind));
    }

    #[actix_web::test]
    async fn test_second_decision_conflicts() {
        let store = MemoryStore::new();
        let flow = workflow(store.clone());
        let request = paid(&flow, date(3, 3), date(3, 4)).await;

        let rejected = flow
            .decide(USER, request.id, LeaveKind::Paid, Decision::Reject, now())
            .await
            .unwrap();
        assert_eq!(rejected.status, LeaveStatus::Rejected);
        assert_eq!(rejected.quota.unwrap().used_days, 0);

        let err = flow
            .decide(USER, request.id, LeaveKind::Paid, Decision::Approve, now())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict));

        let stored = flow
            .list(USER, LeaveKind::Paid, 2025, StatusFilter::All)
            .await
            .unwrap();
        assert_eq!(stored[0].status, LeaveStatus::Rejected);
    }

    #[actix_web::test]
    async fn test_racing_decisions_on_one_request() {
        let flow = workflow(MemoryStore::new());
        let request = paid(&flow, date(3, 3), date(3, 4)).await;

        let results = join_all([
            flow.decide(USER, request.id, LeaveKind::Paid, Decision::Approve, now()),
            flow.decide(USER, request.id, LeaveKind::Paid, Decision::Reject, now()),
        ])
        .await;

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(r, Err(CoreError::Conflict))));
    }

    #[actix_web::test]
    async fn test_concurrent_approvals_stay_within_quota() {
        let flow = workflow(MemoryStore::new());
        let first = paid(&flow, date(5, 1), date(5, 7)).await;
        let second = paid(&flow, date(8, 1), date(8, 7)).await;

        let results = join_all([
            flow.decide(USER, first.id, LeaveKind::Paid, Decision::Approve, now()),
            flow.decide(USER, second.id, LeaveKind::Paid, Decision::Approve, now()),
        ])
        .await;

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(CoreError::QuotaExceeded {
                requested_days: 7,
                remaining_days: 5
            })
        )));

        let quota = flow.get_quota(USER, 2025).await.unwrap();
        assert_eq!(quota.used_days, 7);
        assert_eq!(quota.used_days + quota.remaining_days, quota.quota_days);
    }

    #[actix_web::test]
    async fn test_span_across_new_year_counts_for_start_year() {
        let flow = workflow(MemoryStore::new());
        let request = paid(
            &flow,
            date(12, 30),
            NaiveDate::from_ymd_opt(2026, 1, 2).unwrap(),
        )
        .await;
        assert_eq!(request.days, 4);

        flow.decide(USER, request.id, LeaveKind::Paid, Decision::Approve, now())
            .await
            .unwrap();

        assert_eq!(flow.get_quota(USER, 2025).await.unwrap().used_days, 4);
        assert_eq!(flow.get_quota(USER, 2026).await.unwrap().used_days, 0);
    }

    #[actix_web::test]
    async fn test_list_order_and_filter() {
        let flow = workflow(MemoryStore::new());
        let later = |mins| now() + chrono::Duration::minutes(mins);

        let feb = paid(&flow, date(2, 10), date(2, 10)).await;
        let may_old = flow
            .request_paid_leave(USER, date(5, 2), date(5, 2), "a".into(), later(1))
            .await
            .unwrap()
            .request;
        let may_new = flow
            .request_paid_leave(USER, date(5, 2), date(5, 2), "b".into(), later(2))
            .await
            .unwrap()
            .request;
        flow.request_sick_leave(USER, date(6, 1), date(6, 1), "c".into(), Some("n".into()), now())
            .await
            .unwrap();

        flow.decide(USER, feb.id, LeaveKind::Paid, Decision::Approve, now())
            .await
            .unwrap();

        let all = flow
            .list(USER, LeaveKind::Paid, 2025, StatusFilter::All)
            .await
            .unwrap();
        let ids: Vec<u64> = all.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![may_new.id, may_old.id, feb.id]);

        let pending = flow
            .list(USER, LeaveKind::Paid, 2025, StatusFilter::Pending)
            .await
            .unwrap();
        assert_eq!(pending.len(), 2);

        let approved = flow
            .list(USER, LeaveKind::Paid, 2025, StatusFilter::Approved)
            .await
            .unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].id, feb.id);

        assert!(
            flow.list(USER, LeaveKind::Paid, 2024, StatusFilter::All)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
