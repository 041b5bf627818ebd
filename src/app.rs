use anyhow::Result;
use std::sync::Arc;

use crate::config::Config;
use crate::engine::Engine;
use crate::plan::PlanStore;
use crate::store::Store;
use crate::task::TaskArtifacts;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub plans: Arc<PlanStore>,
    pub engine: Arc<Engine>,
    pub artifacts: TaskArtifacts,
    pub store: Store,
}

impl AppState {
    pub async fn new(cfg: Config) -> Result<Self> {
        let store = Store::connect(&cfg.db.url).await?;
        let plans = Arc::new(PlanStore::new(&cfg.workspace.root_dir));
        let engine = Arc::new(Engine::new(&cfg.engine, &cfg.workspace.root_dir));
        let artifacts = TaskArtifacts::new(&cfg.workspace.root_dir);
        Ok(Self { cfg, plans, engine, artifacts, store })
    }
}
