use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod provider;
pub mod routes;
pub mod session;

use config::CallbackConfig;
use kemaslah_auth::CredentialStore;
use provider::{GoogleProvider, IdentityProvider};
use session::SessionSigner;

pub struct AppState {
    pub store: Arc<dyn CredentialStore>,
    pub provider: Arc<dyn IdentityProvider>,
    pub sessions: SessionSigner,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Cookie lifetime follows the handshake lifetime configured on the store.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        provider: Arc<dyn IdentityProvider>,
        session_secret: &str,
        metrics: Option<PrometheusHandle>,
    ) -> anyhow::Result<Self> {
        let max_age = store.settings().login_state_ttl.num_seconds();
        Ok(Self {
            store,
            provider,
            sessions: SessionSigner::new(session_secret, max_age)?,
            metrics,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/login/google", get(routes::login::google_login))
        .route("/callback/google", get(routes::login::google_callback))
        .route("/verify", get(routes::verify::verify_email))
        .layer(middleware::from_fn(kemaslah_shared::middleware::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves until `shutdown` fires. Used by the standalone binary and by the
/// desktop app when it hosts the server in-process.
pub async fn run(
    config: CallbackConfig,
    store: Arc<dyn CredentialStore>,
    metrics: Option<PrometheusHandle>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let purged = store.purge_login_requests(store.settings().login_state_ttl)?;
    tracing::info!(purged, "startup cleanup of login requests done");

    let provider = Arc::new(GoogleProvider::new(&config));
    let state = Arc::new(AppState::new(store, provider, &config.session_secret, metrics)?);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "kemaslah-callback starting");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("kemaslah-callback stopped");
    Ok(())
}
