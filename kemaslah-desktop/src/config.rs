use std::time::Duration;

use serde::Deserialize;

use kemaslah_auth::StoreSettings;

#[derive(Debug, Deserialize, Clone)]
pub struct DesktopConfig {
    #[serde(default = "default_db")]
    pub database_url: String,
    #[serde(default = "default_callback_base_url")]
    pub callback_base_url: String,
    #[serde(default = "default_resend_api_key")]
    pub resend_api_key: String,
    #[serde(default = "default_from_email")]
    pub from_email: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_verify_poll_interval")]
    pub verify_poll_interval_ms: u64,
    #[serde(default = "default_login_state_ttl")]
    pub login_state_ttl_secs: i64,
    #[serde(default = "default_otp_ttl")]
    pub otp_ttl_secs: i64,
    #[serde(default = "default_otp_resend_cooldown")]
    pub otp_resend_cooldown_secs: i64,
}

fn default_db() -> String { "kemaslah.db".into() }
fn default_callback_base_url() -> String { "http://127.0.0.1:5000".into() }
fn default_resend_api_key() -> String { "re_test_key".into() }
fn default_from_email() -> String { "onboarding@resend.dev".into() }
fn default_poll_interval() -> u64 { 1000 }
fn default_verify_poll_interval() -> u64 { 3000 }
fn default_login_state_ttl() -> i64 { 600 }
fn default_otp_ttl() -> i64 { 600 }
fn default_otp_resend_cooldown() -> i64 { 60 }

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            database_url: default_db(),
            callback_base_url: default_callback_base_url(),
            resend_api_key: default_resend_api_key(),
            from_email: default_from_email(),
            poll_interval_ms: default_poll_interval(),
            verify_poll_interval_ms: default_verify_poll_interval(),
            login_state_ttl_secs: default_login_state_ttl(),
            otp_ttl_secs: default_otp_ttl(),
            otp_resend_cooldown_secs: default_otp_resend_cooldown(),
        }
    }
}

impl DesktopConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("KEMASLAH_DESKTOP").separator("__"))
            .build()?;
        Ok(config.try_deserialize().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "invalid KEMASLAH_DESKTOP__ settings, using defaults");
            Self::default()
        }))
    }

    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings::from_secs(self.otp_ttl_secs, self.otp_resend_cooldown_secs, self.login_state_ttl_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn verify_poll_interval(&self) -> Duration {
        Duration::from_millis(self.verify_poll_interval_ms)
    }
}
