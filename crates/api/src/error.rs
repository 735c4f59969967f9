use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use simsvc_domain::ServiceError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

fn service_status(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::JobNotFound { .. }
        | ServiceError::ReportNotFound { .. }
        | ServiceError::UserNotFound { .. }
        | ServiceError::BlobNotFound { .. } => StatusCode::NOT_FOUND,
        ServiceError::EmailTaken { .. } | ServiceError::InvalidStateTransition { .. } => {
            StatusCode::CONFLICT
        }
        ServiceError::SimulationNotCompleted { .. } => StatusCode::PRECONDITION_FAILED,
        ServiceError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        ServiceError::AccountDisabled => StatusCode::FORBIDDEN,
        ServiceError::ResultNotFound { .. }
        | ServiceError::StorageUnavailable(_)
        | ServiceError::HandlerExecutionFailed(_)
        | ServiceError::MessageQueue(_)
        | ServiceError::Database(_)
        | ServiceError::Serialization(_)
        | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Service(err) => {
                let status = service_status(err);
                // internal detail stays in the logs, not the response
                let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(error = %err, "request failed");
                    "Internal server error".to_string()
                } else {
                    err.to_string()
                };
                (status, err.code(), message)
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn status_mapping() {
        assert_eq!(
            service_status(&ServiceError::job_not_found(Uuid::new_v4())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            service_status(&ServiceError::EmailTaken {
                email: "a@b.c".into()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            service_status(&ServiceError::SimulationNotCompleted { id: Uuid::new_v4() }),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            service_status(&ServiceError::AccountDisabled),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            service_status(&ServiceError::storage("down")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
