use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::api::{error::ApiError, response::Envelope};
use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct KeyCreate {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct KeyUpdate {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct LanguagePayload {
    pub language: String,
}

/// POST /api/initialize - first-launch settings bootstrap
pub async fn initialize(
    State(state): State<AppState>,
    Json(req): Json<KeyCreate>,
) -> Result<Json<Envelope<()>>, ApiError> {
    state.store.settings().create(&req.key, &req.value).await?;
    Ok(Json(Envelope::ok("success")))
}

/// POST /api/language/set - update the dashboard language
pub async fn set_language(
    State(state): State<AppState>,
    Json(req): Json<KeyUpdate>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let affected = state.store.settings().update(&req.key, &req.value).await?;
    if affected == 0 {
        return Err(ApiError::NotFound(format!("setting {} not initialized", req.key)));
    }
    Ok(Json(Envelope::ok(format!("Change the language to {}", req.value))))
}

/// POST /api/language/get - current dashboard language
pub async fn get_language(
    State(state): State<AppState>,
    Json(req): Json<KeyQuery>,
) -> Result<Json<Envelope<LanguagePayload>>, ApiError> {
    let value = state
        .store
        .settings()
        .get(&req.key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("setting {} not found", req.key)))?;
    Ok(Json(Envelope::ok_with("success", LanguagePayload { language: value })))
}
