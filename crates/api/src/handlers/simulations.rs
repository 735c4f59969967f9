use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use simsvc_domain::{JobFilter, JobStatus, SimulationJob};
use simsvc_services::JobResultView;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSimulationRequest {
    pub simulation_type: String,
    pub parameters: Value,
    pub metadata: Option<Value>,
    pub callback_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListSimulationsQuery {
    pub status: Option<String>,
    pub simulation_type: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn create_simulation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreateSimulationRequest>,
) -> Result<(StatusCode, Json<SimulationJob>), ApiError> {
    if payload.simulation_type.trim().is_empty() {
        return Err(ApiError::BadRequest("simulation_type must not be empty".into()));
    }
    let job = state
        .simulations
        .create_job(
            user.id,
            payload.simulation_type,
            payload.parameters,
            payload.metadata.unwrap_or_else(|| serde_json::json!({})),
            payload.callback_url,
        )
        .await?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

pub async fn list_simulations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListSimulationsQuery>,
) -> Result<Json<Vec<SimulationJob>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            JobStatus::parse(s)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown status '{s}'")))
        })
        .transpose()?;

    let filter = JobFilter {
        status,
        simulation_type: query.simulation_type,
        limit: query.limit,
        offset: query.offset,
    };
    let jobs = state.simulations.list_jobs(user.id, &filter).await?;
    Ok(Json(jobs))
}

pub async fn get_simulation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SimulationJob>, ApiError> {
    Ok(Json(state.simulations.get_job(user.id, id).await?))
}

pub async fn get_simulation_result(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<JobResultView>, ApiError> {
    Ok(Json(state.simulations.get_result(user.id, id).await?))
}

pub async fn cancel_simulation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SimulationJob>, ApiError> {
    Ok(Json(state.simulations.cancel_job(user.id, id).await?))
}
