use thiserror::Error;
use uuid::Uuid;

use crate::entities::JobStatus;

/// Error taxonomy shared by every layer of the core.
///
/// Ownership mismatch is deliberately reported as the same `*NotFound`
/// variant as a genuinely absent entity, so callers cannot probe for the
/// existence of other users' records.
#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    #[error("Simulation {id} not found")]
    JobNotFound { id: Uuid },
    #[error("Report {id} not found")]
    ReportNotFound { id: Uuid },
    #[error("User {id} not found")]
    UserNotFound { id: Uuid },
    #[error("Blob not found: {key}")]
    BlobNotFound { key: String },
    #[error("Email {email} is already registered")]
    EmailTaken { email: String },
    #[error("Authentication failed: {0}")]
    Unauthenticated(String),
    #[error("User account is disabled")]
    AccountDisabled,
    #[error("Cannot {operation} a job with status {current}")]
    InvalidStateTransition {
        operation: &'static str,
        current: JobStatus,
    },
    #[error("Simulation {id} is not completed yet")]
    SimulationNotCompleted { id: Uuid },
    #[error("Result for simulation {id} not found")]
    ResultNotFound { id: Uuid },
    #[error("Blob storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("Handler execution failed: {0}")]
    HandlerExecutionFailed(String),
    #[error("Message queue error: {0}")]
    MessageQueue(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn job_not_found(id: Uuid) -> Self {
        Self::JobNotFound { id }
    }
    pub fn report_not_found(id: Uuid) -> Self {
        Self::ReportNotFound { id }
    }
    pub fn user_not_found(id: Uuid) -> Self {
        Self::UserNotFound { id }
    }
    pub fn blob_not_found<S: Into<String>>(key: S) -> Self {
        Self::BlobNotFound { key: key.into() }
    }
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::StorageUnavailable(msg.into())
    }
    pub fn queue<S: Into<String>>(msg: S) -> Self {
        Self::MessageQueue(msg.into())
    }
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Machine-readable code surfaced to clients alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::JobNotFound { .. } => "SIMULATION_NOT_FOUND",
            ServiceError::ReportNotFound { .. } => "REPORT_NOT_FOUND",
            ServiceError::UserNotFound { .. } => "USER_NOT_FOUND",
            ServiceError::BlobNotFound { .. } => "BLOB_NOT_FOUND",
            ServiceError::EmailTaken { .. } => "EMAIL_TAKEN",
            ServiceError::Unauthenticated(_) => "AUTHENTICATION_FAILED",
            ServiceError::AccountDisabled => "ACCOUNT_DISABLED",
            ServiceError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            ServiceError::SimulationNotCompleted { .. } => "SIMULATION_NOT_COMPLETED",
            ServiceError::ResultNotFound { .. } => "RESULT_NOT_FOUND",
            ServiceError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            ServiceError::HandlerExecutionFailed(_) => "HANDLER_EXECUTION_FAILED",
            ServiceError::MessageQueue(_) => "MESSAGE_QUEUE_ERROR",
            ServiceError::Database(_) => "DATABASE_ERROR",
            ServiceError::Serialization(_) => "SERIALIZATION_ERROR",
            ServiceError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        ServiceError::Internal(err.to_string())
    }
}
