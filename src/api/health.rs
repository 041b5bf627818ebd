use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::time::Instant;

use crate::app::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: chrono::DateTime<chrono::Utc>,
    checks: HealthChecks,
}

/// Individual health checks
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    database: ComponentHealth,
    workspace: ComponentHealth,
    engine: ComponentHealth,
}

/// Health status of a component
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ComponentHealth {
    fn healthy(latency_ms: u64) -> Self {
        Self {
            status: "healthy".to_string(),
            latency_ms: Some(latency_ms),
            error: None,
        }
    }

    fn unhealthy(error: String) -> Self {
        Self {
            status: "unhealthy".to_string(),
            latency_ms: None,
            error: Some(error),
        }
    }

    fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// GET /health - health of the service and its dependencies
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_health = match check_database(&state).await {
        Ok(latency) => ComponentHealth::healthy(latency),
        Err(e) => ComponentHealth::unhealthy(e.to_string()),
    };
    let workspace_health = check_workspace(&state).await;
    let engine_health = check_engine(&state).await;

    let all_healthy =
        db_health.is_healthy() && workspace_health.is_healthy() && engine_health.is_healthy();

    let response = HealthResponse {
        status: if all_healthy { "healthy".to_string() } else { "degraded".to_string() },
        timestamp: chrono::Utc::now(),
        checks: HealthChecks {
            database: db_health,
            workspace: workspace_health,
            engine: engine_health,
        },
    };

    let status_code = if all_healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(response))
}

/// GET /health/ready - readiness probe
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match check_database(&state).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// GET /health/live - liveness probe
pub async fn liveness_check() -> impl IntoResponse {
    StatusCode::OK
}

async fn check_database(state: &AppState) -> anyhow::Result<u64> {
    let start = Instant::now();
    sqlx::query("SELECT 1").execute(&state.store.pool).await?;
    Ok(start.elapsed().as_millis() as u64)
}

/// The workspace root is created lazily by plan operations, so a missing
/// directory on a fresh install is still healthy.
async fn check_workspace(state: &AppState) -> ComponentHealth {
    let start = Instant::now();
    let root = state.plans.root();
    match tokio::fs::metadata(root).await {
        Ok(meta) if meta.is_dir() => {
            ComponentHealth::healthy(start.elapsed().as_millis() as u64)
        }
        Ok(_) => ComponentHealth::unhealthy(format!(
            "workspace root {} is not a directory",
            root.display()
        )),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            ComponentHealth::healthy(start.elapsed().as_millis() as u64)
        }
        Err(e) => ComponentHealth::unhealthy(e.to_string()),
    }
}

async fn check_engine(state: &AppState) -> ComponentHealth {
    let start = Instant::now();
    match tokio::fs::metadata(state.engine.bin_dir()).await {
        Ok(_) => ComponentHealth::healthy(start.elapsed().as_millis() as u64),
        Err(e) => ComponentHealth::unhealthy(format!(
            "load-test tool not installed: {e}"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_health_healthy() {
        let health = ComponentHealth::healthy(42);
        assert_eq!(health.status, "healthy");
        assert_eq!(health.latency_ms, Some(42));
        assert!(health.error.is_none());
    }

    #[test]
    fn test_component_health_unhealthy() {
        let health = ComponentHealth::unhealthy("Connection failed".to_string());
        assert_eq!(health.status, "unhealthy");
        assert!(health.latency_ms.is_none());
        assert_eq!(health.error, Some("Connection failed".to_string()));
    }
}
