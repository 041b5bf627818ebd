use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{error::ApiError, response::Envelope};
use crate::app::AppState;
use crate::store::TaskRow;
use crate::task::{RequestSummary, SampleRecord, Statistics};

#[derive(Debug, Deserialize)]
pub struct TaskListRequest {
    /// Restrict to one plan when present.
    pub plan_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TaskQuery {
    pub plan_name: String,
    pub task: String,
}

#[derive(Debug, Serialize)]
pub struct TaskListPayload {
    pub task_list: Vec<TaskRow>,
    pub length: usize,
}

#[derive(Debug, Serialize)]
pub struct TaskPayload {
    pub task: TaskRow,
}

#[derive(Debug, Serialize)]
pub struct StatisticsPayload {
    pub statistics: Statistics,
}

#[derive(Debug, Serialize)]
pub struct SamplesPayload {
    pub samples: Vec<SampleRecord>,
    pub length: usize,
}

#[derive(Debug, Serialize)]
pub struct SummaryPayload {
    pub summary_list: Vec<RequestSummary>,
    pub length: usize,
}

#[derive(Debug, Serialize)]
pub struct RunLogPayload {
    pub log: String,
}

/// Detail-view header: run window plus where the raw samples came from.
#[derive(Debug, Serialize)]
pub struct ReportPayload {
    pub source_file: String,
    pub stime: DateTime<Utc>,
    pub etime: Option<DateTime<Utc>>,
}

/// POST /api/task/all - task rows, optionally restricted to one plan
pub async fn all(
    State(state): State<AppState>,
    Json(req): Json<TaskListRequest>,
) -> Result<Json<Envelope<TaskListPayload>>, ApiError> {
    let task_list = match req.plan_name.as_deref() {
        Some(plan) => state.store.tasks().list_for_plan(plan).await?,
        None => state.store.tasks().list_all().await?,
    };
    let length = task_list.len();
    Ok(Json(Envelope::ok_with("get success", TaskListPayload { task_list, length })))
}

/// POST /api/task/one - a single task row
pub async fn one(
    State(state): State<AppState>,
    Json(req): Json<TaskQuery>,
) -> Result<Json<Envelope<TaskPayload>>, ApiError> {
    let task = find_task(&state, &req).await?;
    Ok(Json(Envelope::ok_with("get success", TaskPayload { task })))
}

/// POST /api/task/statistics - the run's aggregate statistics
pub async fn statistics(
    State(state): State<AppState>,
    Json(req): Json<TaskQuery>,
) -> Result<Json<Envelope<StatisticsPayload>>, ApiError> {
    let statistics = state
        .artifacts
        .read_statistics(&req.plan_name, &req.task)
        .await?
        .ok_or_else(|| not_found_artifact(&req, "statistics"))?;
    Ok(Json(Envelope::ok_with("get success", StatisticsPayload { statistics })))
}

/// POST /api/task/samples - parsed result-log rows, oldest first
pub async fn samples(
    State(state): State<AppState>,
    Json(req): Json<TaskQuery>,
) -> Result<Json<Envelope<SamplesPayload>>, ApiError> {
    let samples = state
        .artifacts
        .read_samples(&req.plan_name, &req.task)
        .await?
        .ok_or_else(|| not_found_artifact(&req, "result log"))?;
    let length = samples.len();
    Ok(Json(Envelope::ok_with("get success", SamplesPayload { samples, length })))
}

/// POST /api/task/summary - per-request summary projection
pub async fn summary(
    State(state): State<AppState>,
    Json(req): Json<TaskQuery>,
) -> Result<Json<Envelope<SummaryPayload>>, ApiError> {
    let summary_list = state
        .artifacts
        .read_summaries(&req.plan_name, &req.task)
        .await?
        .ok_or_else(|| not_found_artifact(&req, "result log"))?;
    let length = summary_list.len();
    Ok(Json(Envelope::ok_with("get success", SummaryPayload { summary_list, length })))
}

/// POST /api/task/log - the tool's own run log, trimmed
pub async fn run_log(
    State(state): State<AppState>,
    Json(req): Json<TaskQuery>,
) -> Result<Json<Envelope<RunLogPayload>>, ApiError> {
    let log = state
        .artifacts
        .read_run_log(&req.plan_name, &req.task)
        .await?
        .ok_or_else(|| not_found_artifact(&req, "run log"))?;
    Ok(Json(Envelope::ok_with("get success", RunLogPayload { log })))
}

/// POST /api/task/report - detail-view header for one run
pub async fn report(
    State(state): State<AppState>,
    Json(req): Json<TaskQuery>,
) -> Result<Json<Envelope<ReportPayload>>, ApiError> {
    let row = find_task(&state, &req).await?;
    let source_file = state
        .artifacts
        .result_file(&req.plan_name, &req.task)
        .display()
        .to_string();
    Ok(Json(Envelope::ok_with(
        "get success",
        ReportPayload { source_file, stime: row.stime, etime: row.etime },
    )))
}

async fn find_task(state: &AppState, req: &TaskQuery) -> Result<TaskRow, ApiError> {
    state
        .store
        .tasks()
        .find_one(&req.plan_name, &req.task)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("task {} of plan {} not found", req.task, req.plan_name))
        })
}

fn not_found_artifact(req: &TaskQuery, what: &str) -> ApiError {
    ApiError::NotFound(format!("no {what} for task {} of plan {}", req.task, req.plan_name))
}
