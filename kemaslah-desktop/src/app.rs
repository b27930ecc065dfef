use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use kemaslah_auth::controller::{LocaleRegistry, LoginController, SystemBrowser};
use kemaslah_auth::dispatch::EmailWorker;
use kemaslah_auth::SqliteCredentialStore;
use kemaslah_callback::config::CallbackConfig;
use kemaslah_shared::clients::email::EmailClient;
use kemaslah_shared::errors::AppResult;

use crate::config::DesktopConfig;
use crate::ui::{self, TerminalLocale};

struct EmbeddedServer {
    shutdown: CancellationToken,
    task: JoinHandle<anyhow::Result<()>>,
}

/// Everything a command needs: the shared store, the locale fan-out and,
/// optionally, the callback server running in this process.
pub struct Desktop {
    pub config: DesktopConfig,
    pub store: Arc<SqliteCredentialStore>,
    pub locales: LocaleRegistry,
    pub locale: Arc<TerminalLocale>,
    server: Option<EmbeddedServer>,
}

impl Desktop {
    pub fn open(config: DesktopConfig) -> anyhow::Result<Self> {
        let store = Arc::new(SqliteCredentialStore::open(&config.database_url, config.store_settings())?);
        let locales = LocaleRegistry::new();
        let locale = Arc::new(TerminalLocale::default());
        locales.subscribe(locale.clone());

        Ok(Self {
            config,
            store,
            locales,
            locale,
            server: None,
        })
    }

    /// Hosts the callback server on a background task against the same
    /// database file.
    pub fn start_embedded_server(&mut self) -> anyhow::Result<()> {
        if self.server.is_some() {
            return Ok(());
        }
        let mut callback = CallbackConfig::load()?;
        callback.database_url = self.config.database_url.clone();
        callback.login_state_ttl_secs = self.config.login_state_ttl_secs;

        let shutdown = CancellationToken::new();
        let store = self.store.clone();
        let token = shutdown.clone();
        let task = tokio::spawn(async move {
            let result = kemaslah_callback::run(callback, store, None, token).await;
            if let Err(e) = &result {
                tracing::error!(error = %e, "embedded callback server stopped");
            }
            result
        });

        tracing::info!("embedded callback server started");
        self.server = Some(EmbeddedServer { shutdown, task });
        Ok(())
    }

    pub async fn shutdown(self) {
        if let Some(server) = self.server {
            server.shutdown.cancel();
            match server.task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "embedded server exited with error"),
                Err(e) => tracing::warn!(error = %e, "embedded server task panicked"),
            }
        }
    }

    pub fn controller(&self) -> LoginController {
        LoginController::new(
            self.store.clone(),
            Arc::new(SystemBrowser),
            self.locales.clone(),
            &self.config.callback_base_url,
            self.config.poll_interval(),
        )
    }

    pub fn email_worker(&self) -> EmailWorker {
        let mailer = EmailClient::new(
            &self.config.resend_api_key,
            &self.config.from_email,
            &self.config.callback_base_url,
        );
        EmailWorker::new(self.store.clone(), Arc::new(mailer))
    }

    /// Password sign-in for commands that act on an account.
    pub fn sign_in(&self, email: &str) -> AppResult<LoginController> {
        let mut controller = self.controller();
        let password = ui::password("Password")?;
        let user = controller.login_with_password(email, &password)?;
        println!("Signed in as {}.", user.shown_name());
        Ok(controller)
    }
}

/// A token that fires on Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let fire = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            fire.cancel();
        }
    });
    token
}
