use anyhow::Result;
use api::{router, ApiState};
use bot::AppState;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    shared::init_tracing();

    info!("Starting ScriptTrader API server...");

    let app_state = AppState::new().await?;
    let bind_addr = app_state.config.api_bind_addr.clone();
    let app = router(ApiState::from(&app_state));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("API server listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    Ok(())
}
