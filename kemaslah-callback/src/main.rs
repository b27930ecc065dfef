use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use kemaslah_auth::SqliteCredentialStore;
use kemaslah_callback::config::CallbackConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kemaslah_shared::middleware::init_tracing("kemaslah-callback");
    let metrics = kemaslah_shared::middleware::init_metrics()?;

    let config = CallbackConfig::load()?;
    let store = Arc::new(SqliteCredentialStore::open(&config.database_url, config.store_settings())?);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "could not listen for ctrl-c");
            return;
        }
        tracing::info!("shutdown requested");
        signal.cancel();
    });

    kemaslah_callback::run(config, store, Some(metrics), shutdown).await
}
