use anyhow::Context;
use comfyboard::{init_tracing, Engine};
use configs::Settings;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading configuration")?;
    init_tracing(&settings.log);

    if settings.dev_mode {
        warn!("dev mode is on: every caller is treated as an admin");
    }

    let engine = Engine::build(settings).await?;
    engine.announce().await?;
    let sweeper = engine.start_sweeper();

    info!("comfyboard engine ready; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;

    info!("shutting down");
    sweeper.abort();
    engine.store.pool().close().await;
    match engine.metrics.encode() {
        Ok(snapshot) => debug!(%snapshot, "final metrics"),
        Err(err) => warn!(error = %err, "failed to encode metrics"),
    }
    Ok(())
}
