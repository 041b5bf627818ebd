use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::api::{error::ApiError, response::Envelope};
use crate::app::AppState;
use crate::plan;
use crate::store::RunMode;

#[derive(Debug, Deserialize, Validate)]
pub struct RunRequest {
    pub plan_name: String,
    #[validate(range(min = 1, max = 100_000))]
    pub threads: u32,
    #[serde(default)]
    pub mode: RunMode,
    /// Remote server list, or `All` for the hosts in the properties file.
    #[serde(default)]
    pub hosts: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PropertiesReadRequest {
    #[validate(length(min = 1))]
    pub file: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PropertiesWriteRequest {
    #[validate(length(min = 1))]
    pub file: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct RunPayload {
    pub task: String,
}

#[derive(Debug, Serialize)]
pub struct HostsPayload {
    pub hosts_list: Vec<String>,
    pub length: usize,
}

#[derive(Debug, Serialize)]
pub struct PropertiesPayload {
    pub content: String,
}

/// POST /api/plan/run - launch a run; returns the task id immediately while
/// the subprocess finishes in the background
pub async fn run(
    State(state): State<AppState>,
    Json(req): Json<RunRequest>,
) -> Result<Json<Envelope<RunPayload>>, ApiError> {
    req.validate()?;
    plan::validate_name(&req.plan_name).map_err(|e| ApiError::ValidationError(e.to_string()))?;
    if !state.plans.exists(&req.plan_name).await {
        return Err(ApiError::NotFound(format!("plan {} not found", req.plan_name)));
    }

    let task = state
        .engine
        .start_run(
            &state.store,
            &state.artifacts,
            &req.plan_name,
            req.threads,
            req.mode,
            req.hosts.clone(),
        )
        .await
        .map_err(|e| ApiError::EngineError(e.to_string()))?;

    Ok(Json(Envelope::ok_with("run success", RunPayload { task })))
}

/// POST /api/plan/stop - stop the running test via the tool's shutdown script
pub async fn stop(State(state): State<AppState>) -> Result<Json<Envelope<()>>, ApiError> {
    state.engine.stop().await.map_err(|e| ApiError::EngineError(e.to_string()))?;
    Ok(Json(Envelope::ok("stop success")))
}

/// POST /api/engine/hosts - remote hosts from the tool's properties file
pub async fn hosts(State(state): State<AppState>) -> Result<Json<Envelope<HostsPayload>>, ApiError> {
    let hosts_list = state.engine.remote_hosts().await;
    let length = hosts_list.len();
    Ok(Json(Envelope::ok_with("get success", HostsPayload { hosts_list, length })))
}

/// POST /api/engine/properties/read - properties editor, read side
pub async fn read_properties(
    State(state): State<AppState>,
    Json(req): Json<PropertiesReadRequest>,
) -> Result<Json<Envelope<PropertiesPayload>>, ApiError> {
    req.validate()?;
    let content = state
        .engine
        .read_bin_file(&req.file)
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(Json(Envelope::ok_with("get success", PropertiesPayload { content })))
}

/// POST /api/engine/properties/write - properties editor, write side
pub async fn write_properties(
    State(state): State<AppState>,
    Json(req): Json<PropertiesWriteRequest>,
) -> Result<Json<Envelope<()>>, ApiError> {
    req.validate()?;
    state
        .engine
        .write_bin_file(&req.file, &req.content)
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(Json(Envelope::ok("write success")))
}
