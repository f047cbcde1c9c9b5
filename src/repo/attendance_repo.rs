use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::MySqlPool;

use crate::model::attendance::{AttendanceDay, AttendanceRow, PunchMark};
use crate::repo::{AttendanceStore, StoreError, is_duplicate};

const SELECT_DAY: &str = r#"
    SELECT id, user_id, date,
           check_in_at, check_in_lat, check_in_lng, check_in_distance_m, check_in_photo,
           check_out_at, check_out_lat, check_out_lng, check_out_distance_m, check_out_photo
    FROM attendance_days
    WHERE user_id = ? AND date = ?
"#;

/// Plain insert: only a duplicate key means the row already exists.
const INSERT_DAY: &str = r#"
    INSERT INTO attendance_days
        (user_id, date, check_in_at, check_in_lat, check_in_lng, check_in_distance_m, check_in_photo)
    VALUES (?, ?, ?, ?, ?, ?, ?)
"#;

pub struct MySqlAttendanceStore {
    pool: MySqlPool,
}

impl MySqlAttendanceStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttendanceStore for MySqlAttendanceStore {
    async fn find_day(&self, user_id: u64, date: NaiveDate) -> Result<Option<AttendanceDay>, StoreError> {
        let row = sqlx::query_as::<_, AttendanceRow>(SELECT_DAY)
            .bind(user_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(AttendanceDay::from))
    }

    async fn check_in(
        &self,
        user_id: u64,
        date: NaiveDate,
        mark: &PunchMark,
    ) -> Result<Option<AttendanceDay>, StoreError> {
        // UNIQUE(user_id, date) makes the insert the race arbiter
        let inserted = match sqlx::query(INSERT_DAY)
            .bind(user_id)
            .bind(date)
            .bind(mark.at)
            .bind(mark.position.lat)
            .bind(mark.position.lng)
            .bind(mark.distance_m)
            .bind(mark.selfie.as_deref())
            .execute(&self.pool)
            .await
        {
            Ok(result) => result.rows_affected(),
            Err(e) if is_duplicate(&e) => 0,
            Err(e) => return Err(e.into()),
        };

        if inserted == 0 {
            // row exists; only an empty check-in may be filled
            let filled = sqlx::query(
                r#"
                UPDATE attendance_days
                SET check_in_at = ?, check_in_lat = ?, check_in_lng = ?,
                    check_in_distance_m = ?, check_in_photo = ?, updated_at = NOW()
                WHERE user_id = ? AND date = ? AND check_in_at IS NULL
                "#,
            )
            .bind(mark.at)
            .bind(mark.position.lat)
            .bind(mark.position.lng)
            .bind(mark.distance_m)
            .bind(mark.selfie.as_deref())
            .bind(user_id)
            .bind(date)
            .execute(&self.pool)
            .await?
            .rows_affected();

            if filled == 0 {
                return Ok(None);
            }
        }

        self.find_day(user_id, date).await
    }

    async fn check_out(
        &self,
        user_id: u64,
        date: NaiveDate,
        mark: &PunchMark,
    ) -> Result<Option<AttendanceDay>, StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE attendance_days
            SET check_out_at = ?, check_out_lat = ?, check_out_lng = ?,
                check_out_distance_m = ?, check_out_photo = ?, updated_at = NOW()
            WHERE user_id = ? AND date = ?
              AND check_in_at IS NOT NULL
              AND check_out_at IS NULL
            "#,
        )
        .bind(mark.at)
        .bind(mark.position.lat)
        .bind(mark.position.lng)
        .bind(mark.distance_m)
        .bind(mark.selfie.as_deref())
        .bind(user_id)
        .bind(date)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Ok(None);
        }

        self.find_day(user_id, date).await
    }

    async fn delete_day(&self, user_id: u64, date: NaiveDate) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM attendance_days WHERE user_id = ? AND date = ?")
            .bind(user_id)
            .bind(date)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn marked_days(&self, user_id: u64, from: NaiveDate, to: NaiveDate) -> Result<Vec<NaiveDate>, StoreError> {
        let days = sqlx::query_scalar::<_, NaiveDate>(
            r#"
            SELECT date
            FROM attendance_days
            WHERE user_id = ?
              AND date >= ?
              AND date < ?
              AND (check_in_at IS NOT NULL OR check_out_at IS NOT NULL)
            ORDER BY date
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(days)
    }
}
