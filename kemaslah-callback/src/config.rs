use rand::RngCore;
use serde::Deserialize;

use kemaslah_auth::StoreSettings;

#[derive(Debug, Deserialize, Clone)]
pub struct CallbackConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db")]
    pub database_url: String,
    #[serde(default = "default_session_secret")]
    pub session_secret: String,
    #[serde(default)]
    pub google_client_id: String,
    #[serde(default)]
    pub google_client_secret: String,
    #[serde(default = "default_google_redirect_uri")]
    pub google_redirect_uri: String,
    #[serde(default = "default_login_state_ttl")]
    pub login_state_ttl_secs: i64,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 5000 }
fn default_db() -> String { "kemaslah.db".into() }
fn default_google_redirect_uri() -> String { "http://127.0.0.1:5000/callback/google".into() }
fn default_login_state_ttl() -> i64 { 600 }

// A fresh key per process: cookies only need to survive one handshake.
fn default_session_secret() -> String {
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    hex::encode(key)
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_url: default_db(),
            session_secret: default_session_secret(),
            google_client_id: String::new(),
            google_client_secret: String::new(),
            google_redirect_uri: default_google_redirect_uri(),
            login_state_ttl_secs: default_login_state_ttl(),
        }
    }
}

impl CallbackConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("KEMASLAH_CALLBACK").separator("__"))
            .build()?;
        Ok(config.try_deserialize().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "invalid KEMASLAH_CALLBACK__ settings, using defaults");
            Self::default()
        }))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn login_state_ttl(&self) -> chrono::Duration {
        self.store_settings().login_state_ttl
    }

    pub fn store_settings(&self) -> StoreSettings {
        let defaults = StoreSettings::default();
        StoreSettings::from_secs(
            defaults.otp_ttl.num_seconds(),
            defaults.otp_resend_cooldown.num_seconds(),
            self.login_state_ttl_secs,
        )
    }
}
