use anyhow::Result;
use bot::AppState;
use migration::{Migrator, MigratorTrait};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    shared::init_tracing();

    tracing::info!("Starting ScriptTrader scheduler...");

    let app_state = AppState::new().await?;
    tracing::info!("AppState initialized");

    if app_state.config.run_migrations {
        Migrator::up(app_state.db.as_ref(), None).await?;
        tracing::info!("Database migrations applied");
    }

    let interval = Duration::from_secs(app_state.config.run_interval_secs.max(1));
    tracing::info!("Scheduler running every {:?}", interval);

    app_state
        .scheduler
        .run_loop(interval, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}
