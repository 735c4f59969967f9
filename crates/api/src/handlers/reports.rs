use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use simsvc_domain::{Report, ReportFilter, ReportStatus};
use simsvc_services::ReportDownloadView;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateReportRequest {
    pub report_type: String,
    pub output_format: String,
    pub simulation_job_ids: Vec<Uuid>,
    pub parameters: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ListReportsQuery {
    pub status: Option<String>,
    pub report_type: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn create_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreateReportRequest>,
) -> Result<(StatusCode, Json<Report>), ApiError> {
    if payload.simulation_job_ids.is_empty() {
        return Err(ApiError::BadRequest(
            "simulation_job_ids must not be empty".into(),
        ));
    }
    let report = state
        .reports
        .create_report(
            user.id,
            payload.report_type,
            payload.output_format,
            payload.simulation_job_ids,
            payload.parameters.unwrap_or_else(|| serde_json::json!({})),
        )
        .await?;
    Ok((StatusCode::ACCEPTED, Json(report)))
}

pub async fn list_reports(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListReportsQuery>,
) -> Result<Json<Vec<Report>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            ReportStatus::parse(s)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown status '{s}'")))
        })
        .transpose()?;

    let filter = ReportFilter {
        status,
        report_type: query.report_type,
        limit: query.limit,
        offset: query.offset,
    };
    let reports = state.reports.list_reports(user.id, &filter).await?;
    Ok(Json(reports))
}

pub async fn get_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ReportDownloadView>, ApiError> {
    Ok(Json(state.reports.get_report_with_download(user.id, id).await?))
}
