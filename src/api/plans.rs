use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::{error::ApiError, response::Envelope};
use crate::app::AppState;
use crate::plan::{self, PlanEdit, PlanInfo, PlanSummary};

#[derive(Debug, Deserialize)]
pub struct PlanNameRequest {
    pub plan_name: String,
}

#[derive(Debug, Serialize)]
pub struct PlanListPayload {
    pub plan_list: Vec<PlanSummary>,
    pub length: usize,
}

#[derive(Debug, Serialize)]
pub struct PlanInfoPayload {
    pub plan_info: PlanInfo,
}

/// POST /api/plan/all - every plan, newest first
pub async fn all(
    State(state): State<AppState>,
) -> Result<Json<Envelope<PlanListPayload>>, ApiError> {
    let plan_list = state.plans.list().await?;
    let length = plan_list.len();
    Ok(Json(Envelope::ok_with("get success", PlanListPayload { plan_list, length })))
}

/// POST /api/plan/checked - listing with the named plan selected
pub async fn checked(
    State(state): State<AppState>,
    Json(req): Json<PlanNameRequest>,
) -> Result<Json<Envelope<PlanListPayload>>, ApiError> {
    let plan_list = state.plans.list_checked(&req.plan_name).await?;
    let length = plan_list.len();
    Ok(Json(Envelope::ok_with("get success", PlanListPayload { plan_list, length })))
}

/// POST /api/plan/info - attributes parsed from the plan XML
pub async fn info(
    State(state): State<AppState>,
    Json(req): Json<PlanNameRequest>,
) -> Result<Json<Envelope<PlanInfoPayload>>, ApiError> {
    require_plan(&state, &req.plan_name).await?;
    let plan_info = state.plans.info(&req.plan_name).await?;
    Ok(Json(Envelope::ok_with("get success", PlanInfoPayload { plan_info })))
}

/// POST /api/plan/create - new plan from the bundled template
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<PlanNameRequest>,
) -> Result<Json<Envelope<()>>, ApiError> {
    validate_name(&req.plan_name)?;
    if state.plans.exists(&req.plan_name).await {
        return Err(ApiError::Conflict("plan existed".to_string()));
    }
    state.plans.create(&req.plan_name).await?;
    Ok(Json(Envelope::ok("create success")))
}

/// POST /api/plan/import - multipart upload of an existing plan file
pub async fn import(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Envelope<()>>, ApiError> {
    let mut plan_name: Option<String> = None;
    let mut file: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("plan_name") => plan_name = Some(field.text().await?),
            Some("file") => file = Some(field.bytes().await?.to_vec()),
            _ => {}
        }
    }

    let plan_name =
        plan_name.ok_or_else(|| ApiError::BadRequest("missing plan_name field".to_string()))?;
    let file = file.ok_or_else(|| ApiError::BadRequest("missing file field".to_string()))?;

    validate_name(&plan_name)?;
    if state.plans.exists(&plan_name).await {
        return Err(ApiError::Conflict("plan existed".to_string()));
    }
    state.plans.import(&plan_name, &file).await?;
    Ok(Json(Envelope::ok("import success")))
}

/// POST /api/plan/save - rename and rewrite plan attributes
pub async fn save(
    State(state): State<AppState>,
    Json(req): Json<PlanEdit>,
) -> Result<Json<Envelope<()>>, ApiError> {
    validate_name(&req.old_name)?;
    validate_name(&req.new_name)?;
    require_plan(&state, &req.old_name).await?;
    if req.old_name != req.new_name && state.plans.exists(&req.new_name).await {
        return Err(ApiError::Conflict("plan existed".to_string()));
    }
    state.plans.edit(&req).await?;
    Ok(Json(Envelope::ok("save success")))
}

/// POST /api/plan/remove - delete one plan and its task rows
pub async fn remove(
    State(state): State<AppState>,
    Json(req): Json<PlanNameRequest>,
) -> Result<Json<Envelope<()>>, ApiError> {
    require_plan(&state, &req.plan_name).await?;
    state.plans.remove(&req.plan_name).await?;
    state.store.tasks().delete_for_plan(&req.plan_name).await?;
    Ok(Json(Envelope::ok("remove success")))
}

/// POST /api/plan/removeall - delete every plan and its task rows
pub async fn remove_all(
    State(state): State<AppState>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let removed = state.plans.remove_all().await?;
    for plan in &removed {
        state.store.tasks().delete_for_plan(plan).await?;
    }
    Ok(Json(Envelope::ok("remove success")))
}

async fn require_plan(state: &AppState, name: &str) -> Result<(), ApiError> {
    if !state.plans.exists(name).await {
        return Err(ApiError::NotFound(format!("plan {name} not found")));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), ApiError> {
    plan::validate_name(name).map_err(|e| ApiError::ValidationError(e.to_string()))
}
