//! Postgres repositories backed by sqlx.
//!
//! Row mapping goes through `try_get` so schema drift surfaces as a typed
//! database error instead of a panic.

use async_trait::async_trait;
use simsvc_domain::{
    JobFilter, JobRepository, Report, ReportFilter, ReportRepository, ServiceError, ServiceResult,
    SimulationJob, User, UserRepository,
};
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

const JOB_COLUMNS: &str = "id, user_id, simulation_type, status, progress, parameters, \
     parameters_blob_key, result_blob_key, result_size_bytes, error_code, error_message, \
     metadata, callback_url, created_at, started_at, completed_at";

const REPORT_COLUMNS: &str = "id, user_id, report_type, output_format, status, \
     simulation_job_ids, parameters, blob_key, content_type, size_bytes, error_code, \
     error_message, created_at, completed_at, expires_at";

pub struct PostgresJobRepository {
    pool: PgPool,
}

impl PostgresJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_job(row: &sqlx::postgres::PgRow) -> ServiceResult<SimulationJob> {
        Ok(SimulationJob {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            simulation_type: row.try_get("simulation_type")?,
            status: row.try_get("status")?,
            progress: row.try_get("progress")?,
            parameters: row.try_get("parameters")?,
            parameters_blob_key: row.try_get("parameters_blob_key")?,
            result_blob_key: row.try_get("result_blob_key")?,
            result_size_bytes: row.try_get("result_size_bytes")?,
            error_code: row.try_get("error_code")?,
            error_message: row.try_get("error_message")?,
            metadata: row.try_get("metadata")?,
            callback_url: row.try_get("callback_url")?,
            created_at: row.try_get("created_at")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }
}

#[async_trait]
impl JobRepository for PostgresJobRepository {
    #[instrument(skip(self, job), fields(job_id = %job.id, simulation_type = %job.simulation_type))]
    async fn create(&self, job: &SimulationJob) -> ServiceResult<SimulationJob> {
        let sql = format!(
            "INSERT INTO simulation_jobs ({JOB_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             RETURNING {JOB_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(job.id)
            .bind(job.user_id)
            .bind(&job.simulation_type)
            .bind(job.status)
            .bind(job.progress)
            .bind(&job.parameters)
            .bind(&job.parameters_blob_key)
            .bind(&job.result_blob_key)
            .bind(job.result_size_bytes)
            .bind(&job.error_code)
            .bind(&job.error_message)
            .bind(&job.metadata)
            .bind(&job.callback_url)
            .bind(job.created_at)
            .bind(job.started_at)
            .bind(job.completed_at)
            .fetch_one(&self.pool)
            .await?;
        Self::row_to_job(&row)
    }

    async fn find_by_id(&self, id: Uuid) -> ServiceResult<Option<SimulationJob>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM simulation_jobs WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::row_to_job).transpose()
    }

    async fn find_owned(&self, user_id: Uuid, id: Uuid) -> ServiceResult<Option<SimulationJob>> {
        let sql =
            format!("SELECT {JOB_COLUMNS} FROM simulation_jobs WHERE id = $1 AND user_id = $2");
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_job).transpose()
    }

    #[instrument(skip(self, job), fields(job_id = %job.id, status = %job.status))]
    async fn update(&self, job: &SimulationJob) -> ServiceResult<SimulationJob> {
        let sql = format!(
            "UPDATE simulation_jobs SET status = $2, progress = $3, parameters = $4, \
             parameters_blob_key = $5, result_blob_key = $6, result_size_bytes = $7, \
             error_code = $8, error_message = $9, started_at = $10, completed_at = $11 \
             WHERE id = $1 RETURNING {JOB_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(job.id)
            .bind(job.status)
            .bind(job.progress)
            .bind(&job.parameters)
            .bind(&job.parameters_blob_key)
            .bind(&job.result_blob_key)
            .bind(job.result_size_bytes)
            .bind(&job.error_code)
            .bind(&job.error_message)
            .bind(job.started_at)
            .bind(job.completed_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServiceError::JobNotFound { id: job.id })?;
        Self::row_to_job(&row)
    }

    async fn list(&self, user_id: Uuid, filter: &JobFilter) -> ServiceResult<Vec<SimulationJob>> {
        let mut sql = format!("SELECT {JOB_COLUMNS} FROM simulation_jobs WHERE user_id = $1");
        let mut idx = 1;
        if filter.status.is_some() {
            idx += 1;
            sql.push_str(&format!(" AND status = ${idx}"));
        }
        if filter.simulation_type.is_some() {
            idx += 1;
            sql.push_str(&format!(" AND simulation_type = ${idx}"));
        }
        sql.push_str(" ORDER BY created_at DESC");
        idx += 1;
        sql.push_str(&format!(" LIMIT ${idx}"));
        idx += 1;
        sql.push_str(&format!(" OFFSET ${idx}"));

        let mut query = sqlx::query(&sql).bind(user_id);
        if let Some(status) = filter.status {
            query = query.bind(status);
        }
        if let Some(ref simulation_type) = filter.simulation_type {
            query = query.bind(simulation_type.as_str());
        }
        query = query
            .bind(filter.limit.unwrap_or(100))
            .bind(filter.offset.unwrap_or(0));

        let rows = query.fetch_all(&self.pool).await?;
        debug!(count = rows.len(), "Listed simulation jobs");
        rows.iter().map(Self::row_to_job).collect()
    }
}

pub struct PostgresReportRepository {
    pool: PgPool,
}

impl PostgresReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_report(row: &sqlx::postgres::PgRow) -> ServiceResult<Report> {
        Ok(Report {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            report_type: row.try_get("report_type")?,
            output_format: row.try_get("output_format")?,
            status: row.try_get("status")?,
            simulation_job_ids: row.try_get("simulation_job_ids")?,
            parameters: row.try_get("parameters")?,
            blob_key: row.try_get("blob_key")?,
            content_type: row.try_get("content_type")?,
            size_bytes: row.try_get("size_bytes")?,
            error_code: row.try_get("error_code")?,
            error_message: row.try_get("error_message")?,
            created_at: row.try_get("created_at")?,
            completed_at: row.try_get("completed_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }
}

#[async_trait]
impl ReportRepository for PostgresReportRepository {
    #[instrument(skip(self, report), fields(report_id = %report.id, report_type = %report.report_type))]
    async fn create(&self, report: &Report) -> ServiceResult<Report> {
        let sql = format!(
            "INSERT INTO reports ({REPORT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             RETURNING {REPORT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(report.id)
            .bind(report.user_id)
            .bind(&report.report_type)
            .bind(&report.output_format)
            .bind(report.status)
            .bind(&report.simulation_job_ids)
            .bind(&report.parameters)
            .bind(&report.blob_key)
            .bind(&report.content_type)
            .bind(report.size_bytes)
            .bind(&report.error_code)
            .bind(&report.error_message)
            .bind(report.created_at)
            .bind(report.completed_at)
            .bind(report.expires_at)
            .fetch_one(&self.pool)
            .await?;
        Self::row_to_report(&row)
    }

    async fn find_by_id(&self, id: Uuid) -> ServiceResult<Option<Report>> {
        let sql = format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::row_to_report).transpose()
    }

    async fn find_owned(&self, user_id: Uuid, id: Uuid) -> ServiceResult<Option<Report>> {
        let sql = format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1 AND user_id = $2");
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_report).transpose()
    }

    #[instrument(skip(self, report), fields(report_id = %report.id, status = %report.status))]
    async fn update(&self, report: &Report) -> ServiceResult<Report> {
        let sql = format!(
            "UPDATE reports SET status = $2, blob_key = $3, content_type = $4, size_bytes = $5, \
             error_code = $6, error_message = $7, completed_at = $8, expires_at = $9 \
             WHERE id = $1 RETURNING {REPORT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(report.id)
            .bind(report.status)
            .bind(&report.blob_key)
            .bind(&report.content_type)
            .bind(report.size_bytes)
            .bind(&report.error_code)
            .bind(&report.error_message)
            .bind(report.completed_at)
            .bind(report.expires_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServiceError::ReportNotFound { id: report.id })?;
        Self::row_to_report(&row)
    }

    async fn list(&self, user_id: Uuid, filter: &ReportFilter) -> ServiceResult<Vec<Report>> {
        let mut sql = format!("SELECT {REPORT_COLUMNS} FROM reports WHERE user_id = $1");
        let mut idx = 1;
        if filter.status.is_some() {
            idx += 1;
            sql.push_str(&format!(" AND status = ${idx}"));
        }
        if filter.report_type.is_some() {
            idx += 1;
            sql.push_str(&format!(" AND report_type = ${idx}"));
        }
        sql.push_str(" ORDER BY created_at DESC");
        idx += 1;
        sql.push_str(&format!(" LIMIT ${idx}"));
        idx += 1;
        sql.push_str(&format!(" OFFSET ${idx}"));

        let mut query = sqlx::query(&sql).bind(user_id);
        if let Some(status) = filter.status {
            query = query.bind(status);
        }
        if let Some(ref report_type) = filter.report_type {
            query = query.bind(report_type.as_str());
        }
        query = query
            .bind(filter.limit.unwrap_or(100))
            .bind(filter.offset.unwrap_or(0));

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_report).collect()
    }
}

pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_user(row: &sqlx::postgres::PgRow) -> ServiceResult<User> {
        Ok(User {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            full_name: row.try_get("full_name")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn create(&self, user: &User) -> ServiceResult<User> {
        let result = sqlx::query(
            "INSERT INTO users (id, email, password_hash, full_name, is_active, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, email, password_hash, full_name, is_active, created_at",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.is_active)
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Self::row_to_user(&row),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(ServiceError::EmailTaken {
                    email: user.email.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> ServiceResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, full_name, is_active, created_at \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, full_name, is_active, created_at \
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_user).transpose()
    }
}
