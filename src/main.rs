use anyhow::Result;
use loadmeter::{api, app::AppState, config::Config, telemetry};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let cfg = Config::load()?;

    let state = AppState::new(cfg.clone()).await?;

    // The dashboard must come up even on a box without the tool installed,
    // so preflight failures are warnings rather than aborts.
    if let Err(e) = state.engine.check_java().await {
        warn!(error = %e, "java preflight failed");
    }
    if let Err(e) = state.engine.check_tool().await {
        warn!(error = %e, "load-test tool preflight failed");
    }

    let app = api::router(state, &cfg);

    let addr = cfg.server.socket_addr()?;

    if cfg.server.host == "0.0.0.0" {
        warn!(
            "Server binding to 0.0.0.0 - service will be accessible from network! \
            For production, bind to 127.0.0.1 unless behind a firewall/reverse proxy."
        );
    }

    info!(%addr, "starting loadmeter");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    warn!("shutdown complete");
    Ok(())
}
