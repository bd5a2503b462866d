use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;

use super::AppState;
use crate::errors::SchedulerError;
use crate::models::{
    JobExecutionRecord, JobKey, JobScheduleRequest, JobTriggerInfo, JobUpdateRequest,
    StatusResponse,
};

pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn schedule_job(
    State(state): State<AppState>,
    Json(payload): Json<JobScheduleRequest>,
) -> Result<Json<StatusResponse>, SchedulerError> {
    let status = state.coordinator.schedule(payload).await?;
    Ok(Json(StatusResponse { status }))
}

pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobTriggerInfo>> {
    Json(state.coordinator.list())
}

pub async fn delete_job(
    Path((name, group)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, SchedulerError> {
    let status = state.coordinator.delete(&name, &group).await?;
    Ok(Json(StatusResponse { status }))
}

pub async fn pause_job(
    Path((name, group)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, SchedulerError> {
    let status = state.coordinator.pause(&name, &group).await?;
    Ok(Json(StatusResponse { status }))
}

pub async fn resume_job(
    Path((name, group)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, SchedulerError> {
    let status = state.coordinator.resume(&name, &group).await?;
    Ok(Json(StatusResponse { status }))
}

pub async fn restart_job(
    Path((name, group)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, SchedulerError> {
    let status = state.coordinator.restart(&name, &group).await?;
    Ok(Json(StatusResponse { status }))
}

pub async fn update_job(
    Path(name): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<JobUpdateRequest>,
) -> Result<Json<StatusResponse>, SchedulerError> {
    let status = state.coordinator.update(&name, payload).await?;
    Ok(Json(StatusResponse { status }))
}

#[derive(Debug, Deserialize)]
pub struct ExecutionQueryParams {
    pub limit: Option<i64>,
}

pub async fn list_executions(
    Path((name, group)): Path<(String, String)>,
    Query(params): Query<ExecutionQueryParams>,
    State(state): State<AppState>,
) -> Result<Json<Vec<JobExecutionRecord>>, SchedulerError> {
    let key = JobKey::new(name, group);
    let records = state
        .database
        .list_execution_records(&key, params.limit.unwrap_or(50))
        .await?;
    Ok(Json(records))
}
