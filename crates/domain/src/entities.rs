use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inline placeholder stored in `parameters` when the real document lives in
/// the blob store. Exactly one of inline parameters / blob reference is
/// authoritative at any time.
pub const BLOB_REFERENCE_MARKER: &str = "_blob_reference";

pub fn blob_reference_placeholder() -> serde_json::Value {
    serde_json::json!({ BLOB_REFERENCE_MARKER: true })
}

/// A unit of simulation work with a caller-defined opaque type tag.
///
/// The core never interprets `simulation_type` or `parameters`; execution is
/// delegated to a registered handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationJob {
    pub id: Uuid,
    pub user_id: Uuid,
    pub simulation_type: String,
    pub status: JobStatus,
    /// Defined only while Running (partial) or Completed (1.0).
    pub progress: Option<f64>,
    pub parameters: serde_json::Value,
    /// Set when parameters exceeded the storage threshold at creation.
    pub parameters_blob_key: Option<String>,
    /// Present if and only if status is Completed.
    pub result_blob_key: Option<String>,
    pub result_size_bytes: Option<i64>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub metadata: serde_json::Value,
    pub callback_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(JobStatus::Pending),
            "RUNNING" => Some(JobStatus::Running),
            "COMPLETED" => Some(JobStatus::Completed),
            "FAILED" => Some(JobStatus::Failed),
            "CANCELLED" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    /// Terminal states admit no further transition through the manager.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn is_cancellable(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl sqlx::Type<sqlx::Postgres> for JobStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for JobStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        JobStatus::parse(s).ok_or_else(|| format!("Invalid job status: {s}").into())
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for JobStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

impl SimulationJob {
    pub fn new(
        user_id: Uuid,
        simulation_type: String,
        parameters: serde_json::Value,
        metadata: serde_json::Value,
        callback_url: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            simulation_type,
            status: JobStatus::Pending,
            progress: None,
            parameters,
            parameters_blob_key: None,
            result_blob_key: None,
            result_size_bytes: None,
            error_code: None,
            error_message: None,
            metadata,
            callback_url,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Applies a status change together with the timestamp rules: the first
    /// transition into Running stamps `started_at`, any terminal status
    /// stamps `completed_at`. Transitions themselves are not validated here;
    /// guards live at the operation entry points (cancel, save_result).
    pub fn apply_status(&mut self, status: JobStatus) {
        self.status = status;
        match status {
            JobStatus::Running => {
                if self.started_at.is_none() {
                    self.started_at = Some(Utc::now());
                }
            }
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => {
                if self.completed_at.is_none() {
                    self.completed_at = Some(Utc::now());
                }
            }
            JobStatus::Pending => {}
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn has_inline_parameters(&self) -> bool {
        self.parameters_blob_key.is_none()
    }
}

/// A generated artifact derived from one or more completed jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub user_id: Uuid,
    pub report_type: String,
    /// Case-normalized to uppercase at creation.
    pub output_format: String,
    pub status: ReportStatus,
    pub simulation_job_ids: Vec<Uuid>,
    pub parameters: serde_json::Value,
    /// Present if and only if status is Completed.
    pub blob_key: Option<String>,
    pub content_type: Option<String>,
    pub size_bytes: Option<i64>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Cleanup hint for external tooling; the core never acts on it.
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ReportStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "GENERATING")]
    Generating,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "PENDING",
            ReportStatus::Generating => "GENERATING",
            ReportStatus::Completed => "COMPLETED",
            ReportStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ReportStatus::Pending),
            "GENERATING" => Some(ReportStatus::Generating),
            "COMPLETED" => Some(ReportStatus::Completed),
            "FAILED" => Some(ReportStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReportStatus::Completed | ReportStatus::Failed)
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl sqlx::Type<sqlx::Postgres> for ReportStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ReportStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        ReportStatus::parse(s).ok_or_else(|| format!("Invalid report status: {s}").into())
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for ReportStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

impl Report {
    pub fn new(
        user_id: Uuid,
        report_type: String,
        output_format: String,
        simulation_job_ids: Vec<Uuid>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            report_type,
            output_format: output_format.to_uppercase(),
            status: ReportStatus::Pending,
            simulation_job_ids,
            parameters,
            blob_key: None,
            content_type: None,
            size_bytes: None,
            error_code: None,
            error_message: None,
            created_at: Utc::now(),
            completed_at: None,
            expires_at: None,
        }
    }

    pub fn apply_status(&mut self, status: ReportStatus) {
        self.status = status;
        if status.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }
}

/// Account that owns jobs and reports. Passwords are stored as salted
/// hashes, never in the clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, password_hash: String, full_name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            full_name,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub simulation_type: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub status: Option<ReportStatus>,
    pub report_type: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
