//! PostgreSQL storage for sessions, enrollments and attendance
//!
//! Uniqueness rules live in the schema: one session row per class, one
//! enrollment per participant, and a partial unique index that admits at most
//! one counted attendance record per (participant, window).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rollcall_core::{
    AttendanceRecord, AttendanceStore, ClassFilter, Enrollment, NewAttendance, NewEnrollment,
    Session, StorageError,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// PostgreSQL-backed attendance storage
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect with bounded pool size
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections.min(max_connections))
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        tracing::info!(max_connections, "Connected to PostgreSQL database");
        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))?;

        tracing::info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl AttendanceStore for PostgresStore {
    async fn supersede_session(&self, session: &Session) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (class_id, window_id, signed_credential, pin, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (class_id) DO UPDATE SET
                window_id = EXCLUDED.window_id,
                signed_credential = EXCLUDED.signed_credential,
                pin = EXCLUDED.pin,
                expires_at = EXCLUDED.expires_at,
                started_at = NOW()
            "#,
        )
        .bind(&session.class_id)
        .bind(&session.window_id)
        .bind(&session.signed_credential)
        .bind(&session.pin)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    async fn current_session(&self, class_id: &str) -> Result<Option<Session>, StorageError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT class_id, window_id, signed_credential, pin, expires_at
            FROM sessions
            WHERE class_id = $1
            "#,
        )
        .bind(class_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(row.map(Session::from))
    }

    async fn set_all_session_expiry(
        &self,
        expires_at: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        let result = sqlx::query("UPDATE sessions SET expires_at = $1")
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(query_error)?;

        Ok(result.rows_affected())
    }

    async fn enrollment(&self, participant_id: &str) -> Result<Option<Enrollment>, StorageError> {
        let row = sqlx::query_as::<_, EnrollmentRow>(
            r#"
            SELECT participant_id, name, fingerprint, enrolled_at
            FROM enrollments
            WHERE participant_id = $1
            "#,
        )
        .bind(participant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(row.map(Enrollment::from))
    }

    async fn upsert_enrollment(
        &self,
        enrollment: NewEnrollment,
        enrolled_at: DateTime<Utc>,
    ) -> Result<Enrollment, StorageError> {
        let row = sqlx::query_as::<_, EnrollmentRow>(
            r#"
            INSERT INTO enrollments (participant_id, name, fingerprint, enrolled_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (participant_id) DO UPDATE SET
                name = EXCLUDED.name,
                fingerprint = EXCLUDED.fingerprint,
                enrolled_at = EXCLUDED.enrolled_at
            RETURNING participant_id, name, fingerprint, enrolled_at
            "#,
        )
        .bind(&enrollment.participant_id)
        .bind(&enrollment.name)
        .bind(&enrollment.fingerprint)
        .bind(enrolled_at)
        .fetch_one(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(row.into())
    }

    async fn has_counted_record(
        &self,
        participant_id: &str,
        window_id: &str,
    ) -> Result<bool, StorageError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM attendance
                WHERE participant_id = $1 AND window_id = $2
                  AND status IN ('present', 'flagged')
            )
            "#,
        )
        .bind(participant_id)
        .bind(window_id)
        .fetch_one(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(exists)
    }

    async fn record_attendance(
        &self,
        record: NewAttendance,
        enrollment: Option<NewEnrollment>,
    ) -> Result<AttendanceRecord, StorageError> {
        let mut tx = self.pool.begin().await.map_err(query_error)?;

        if let Some(enrollment) = enrollment {
            // Only a missing or blank anchor may be filled in here
            sqlx::query(
                r#"
                INSERT INTO enrollments (participant_id, name, fingerprint, enrolled_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (participant_id) DO UPDATE SET
                    name = EXCLUDED.name,
                    fingerprint = EXCLUDED.fingerprint,
                    enrolled_at = EXCLUDED.enrolled_at
                WHERE enrollments.fingerprint = ''
                "#,
            )
            .bind(&enrollment.participant_id)
            .bind(&enrollment.name)
            .bind(&enrollment.fingerprint)
            .bind(record.recorded_at)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;
        }

        let row = sqlx::query_as::<_, AttendanceRow>(
            r#"
            INSERT INTO attendance
                (participant_id, name, status, reason, recorded_at, class_id, window_id, fingerprint)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, participant_id, name, status, reason, recorded_at,
                      class_id, window_id, fingerprint
            "#,
        )
        .bind(&record.participant_id)
        .bind(&record.name)
        .bind(record.status.as_str())
        .bind(&record.reason)
        .bind(record.recorded_at)
        .bind(&record.class_id)
        .bind(&record.window_id)
        .bind(&record.fingerprint)
        .fetch_one(&mut *tx)
        .await
        .map_err(query_error)?;

        tx.commit().await.map_err(query_error)?;

        row.try_into()
    }

    async fn list_attendance(
        &self,
        filter: &ClassFilter,
    ) -> Result<Vec<AttendanceRecord>, StorageError> {
        let rows = match filter {
            ClassFilter::All => {
                sqlx::query_as::<_, AttendanceRow>(
                    r#"
                    SELECT id, participant_id, name, status, reason, recorded_at,
                           class_id, window_id, fingerprint
                    FROM attendance
                    ORDER BY recorded_at DESC, id DESC
                    "#,
                )
                .fetch_all(&self.pool)
                .await
            }
            ClassFilter::Class(class_id) => {
                sqlx::query_as::<_, AttendanceRow>(
                    r#"
                    SELECT id, participant_id, name, status, reason, recorded_at,
                           class_id, window_id, fingerprint
                    FROM attendance
                    WHERE class_id = $1
                    ORDER BY recorded_at DESC, id DESC
                    "#,
                )
                .bind(class_id)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(query_error)?;

        rows.into_iter().map(AttendanceRecord::try_from).collect()
    }

    async fn approve_record(&self, id: i64) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "UPDATE attendance SET status = 'present', reason = NULL WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_record(&self, id: i64) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM attendance WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear_attendance(&self, filter: &ClassFilter) -> Result<u64, StorageError> {
        let result = match filter {
            ClassFilter::All => {
                sqlx::query("DELETE FROM attendance")
                    .execute(&self.pool)
                    .await
            }
            ClassFilter::Class(class_id) => {
                sqlx::query("DELETE FROM attendance WHERE class_id = $1")
                    .bind(class_id)
                    .execute(&self.pool)
                    .await
            }
        }
        .map_err(query_error)?;

        Ok(result.rows_affected())
    }

    async fn check_health(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        true
    }
}

impl std::fmt::Debug for PostgresStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStore")
            .field("pool_size", &self.pool.size())
            .finish()
    }
}

fn query_error(e: sqlx::Error) -> StorageError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => StorageError::UniqueViolation(db.to_string()),
        _ => StorageError::Query(e.to_string()),
    }
}

/// Database row for sessions
#[derive(sqlx::FromRow)]
struct SessionRow {
    class_id: String,
    window_id: String,
    signed_credential: String,
    pin: String,
    expires_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Self {
            window_id: row.window_id,
            class_id: row.class_id,
            signed_credential: row.signed_credential,
            pin: row.pin,
            expires_at: row.expires_at,
        }
    }
}

/// Database row for enrollments
#[derive(sqlx::FromRow)]
struct EnrollmentRow {
    participant_id: String,
    name: String,
    fingerprint: String,
    enrolled_at: DateTime<Utc>,
}

impl From<EnrollmentRow> for Enrollment {
    fn from(row: EnrollmentRow) -> Self {
        Self {
            participant_id: row.participant_id,
            name: row.name,
            fingerprint: row.fingerprint,
            enrolled_at: row.enrolled_at,
        }
    }
}

/// Database row for attendance records
#[derive(sqlx::FromRow)]
struct AttendanceRow {
    id: i64,
    participant_id: String,
    name: String,
    status: String,
    reason: Option<String>,
    recorded_at: DateTime<Utc>,
    class_id: String,
    window_id: String,
    fingerprint: String,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = StorageError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(StorageError::Serialization)?;

        Ok(Self {
            id: row.id,
            participant_id: row.participant_id,
            name: row.name,
            status,
            reason: row.reason.filter(|r| !r.is_empty()),
            recorded_at: row.recorded_at,
            class_id: row.class_id,
            window_id: row.window_id,
            fingerprint: row.fingerprint,
        })
    }
}
