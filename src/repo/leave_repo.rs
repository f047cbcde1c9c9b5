use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySql, MySqlPool, Transaction};

use crate::model::leave_request::{
    LeaveKind, LeaveRequest, LeaveRow, LeaveStatus, NewLeaveRequest, StatusFilter,
};
use crate::repo::{LeaveStore, QuotaGuard, StoreError, Transition};

const LEAVE_COLUMNS: &str = r#"
    id, user_id, kind, status, reason, start_date, end_date, days,
    created_at, decided_at, proof
"#;

const SUM_APPROVED: &str = r#"
    SELECT CAST(COALESCE(SUM(days), 0) AS SIGNED)
    FROM leave_requests
    WHERE user_id = ?
      AND kind = ?
      AND status = 'approved'
      AND YEAR(start_date) = ?
"#;

pub struct MySqlLeaveStore {
    pool: MySqlPool,
}

impl MySqlLeaveStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    fn decode(row: LeaveRow) -> Result<LeaveRequest, StoreError> {
        let id = row.id;
        LeaveRequest::try_from(row)
            .map_err(|e| StoreError::InvalidRow(format!("leave_requests.id={id}: {e}")))
    }

    /// Approval of paid leave. The owner's `users` row is locked so that
    /// approvals of different pending requests for the same user serialize
    /// and the quota sum read below cannot go stale before the update.
    async fn approve_guarded(
        &self,
        id: u64,
        kind: LeaveKind,
        decided_at: DateTime<Utc>,
        guard: QuotaGuard,
    ) -> Result<Transition, StoreError> {
        let mut tx: Transaction<'_, MySql> = self.pool.begin().await?;

        sqlx::query("SELECT id FROM users WHERE id = ? FOR UPDATE")
            .bind(guard.user_id)
            .fetch_optional(&mut *tx)
            .await?;

        let days = sqlx::query_scalar::<_, i64>(
            "SELECT days FROM leave_requests WHERE id = ? AND kind = ? AND status = 'pending' FOR UPDATE",
        )
        .bind(id)
        .bind(kind.as_ref())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(days) = days else {
            tx.rollback().await?;
            return Ok(Transition::NotPending);
        };

        let used = sqlx::query_scalar::<_, i64>(SUM_APPROVED)
            .bind(guard.user_id)
            .bind(kind.as_ref())
            .bind(guard.year)
            .fetch_one(&mut *tx)
            .await?;

        if used + days > guard.quota_days {
            tx.rollback().await?;
            return Ok(Transition::OverQuota { used_days: used });
        }

        let updated = sqlx::query(
            r#"
            UPDATE leave_requests
            SET status = 'approved', decided_at = ?
            WHERE id = ? AND kind = ? AND status = 'pending'
            "#,
        )
        .bind(decided_at)
        .bind(id)
        .bind(kind.as_ref())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            return Ok(Transition::NotPending);
        }

        tx.commit().await?;
        Ok(Transition::Applied {
            used_days: Some(used + days),
        })
    }
}

#[async_trait]
impl LeaveStore for MySqlLeaveStore {
    async fn sum_approved_days(&self, user_id: u64, kind: LeaveKind, year: i32) -> Result<i64, StoreError> {
        let used = sqlx::query_scalar::<_, i64>(SUM_APPROVED)
            .bind(user_id)
            .bind(kind.as_ref())
            .bind(year)
            .fetch_one(&self.pool)
            .await?;

        Ok(used)
    }

    async fn insert(&self, request: NewLeaveRequest) -> Result<LeaveRequest, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO leave_requests
                (user_id, kind, status, reason, start_date, end_date, days, created_at, proof)
            VALUES (?, ?, 'pending', ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(request.user_id)
        .bind(request.kind.as_ref())
        .bind(&request.reason)
        .bind(request.start_date)
        .bind(request.end_date)
        .bind(request.days)
        .bind(request.created_at)
        .bind(request.proof.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(LeaveRequest {
            id: result.last_insert_id(),
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
        })
    }

    async fn find(&self, id: u64) -> Result<Option<LeaveRequest>, StoreError> {
        let sql = format!("SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ? LIMIT 1");
        let row = sqlx::query_as::<_, LeaveRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::decode).transpose()
    }

    async fn transition(
        &self,
        id: u64,
        kind: LeaveKind,
        status: LeaveStatus,
        decided_at: DateTime<Utc>,
        guard: Option<QuotaGuard>,
    ) -> Result<Transition, StoreError> {
        if let (LeaveStatus::Approved, Some(guard)) = (status, guard) {
            return self.approve_guarded(id, kind, decided_at, guard).await;
        }

        let updated = sqlx::query(
            r#"
            UPDATE leave_requests
            SET status = ?, decided_at = ?
            WHERE id = ? AND kind = ? AND status = 'pending'
            "#,
        )
        .bind(status.as_ref())
        .bind(decided_at)
        .bind(id)
        .bind(kind.as_ref())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Ok(Transition::NotPending);
        }

        let used_days = match guard {
            Some(g) => Some(self.sum_approved_days(g.user_id, kind, g.year).await?),
            None => None,
        };
        Ok(Transition::Applied { used_days })
    }

    async fn list(
        &self,
        user_id: u64,
        kind: LeaveKind,
        year: i32,
        filter: StatusFilter,
    ) -> Result<Vec<LeaveRequest>, StoreError> {
        let status = filter.status();
        let mut sql = format!(
            "SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE user_id = ? AND kind = ? AND YEAR(start_date) = ?"
        );
        if status.is_some() {
            sql.push_str(" AND status = ?");
        }
        sql.push_str(" ORDER BY start_date DESC, created_at DESC");

        let mut query = sqlx::query_as::<_, LeaveRow>(&sql)
            .bind(user_id)
            .bind(kind.as_ref())
            .bind(year);
        if let Some(status) = &status {
            query = query.bind(status.as_ref());
        }

        query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Self::decode)
            .collect()
    }
}
