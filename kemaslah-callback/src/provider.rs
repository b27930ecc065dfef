use async_trait::async_trait;
use serde::Deserialize;

use kemaslah_shared::errors::{AppError, AppResult, ErrorCode};

use crate::config::CallbackConfig;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

/// Who the provider says signed in.
#[derive(Debug, Clone, Default)]
pub struct ProviderProfile {
    pub email: Option<String>,
    pub name: Option<String>,
    pub email_verified: Option<bool>,
}

impl ProviderProfile {
    /// The email, unless the provider returned none or flagged it unverified.
    pub fn verified_email(&self) -> Option<&str> {
        if self.email_verified == Some(false) {
            return None;
        }
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Where to send the browser. `state` comes back unchanged on the callback.
    fn authorization_url(&self, state: &str) -> AppResult<String>;

    async fn exchange_code(&self, code: &str) -> AppResult<ProviderProfile>;
}

pub struct GoogleProvider {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    email: Option<String>,
    name: Option<String>,
    email_verified: Option<bool>,
}

impl GoogleProvider {
    pub fn new(config: &CallbackConfig) -> Self {
        if config.google_client_id.is_empty() {
            tracing::warn!("KEMASLAH_CALLBACK__GOOGLE_CLIENT_ID is not set; Google sign-in will fail");
        }
        Self {
            client: reqwest::Client::new(),
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            redirect_uri: config.google_redirect_uri.clone(),
        }
    }
}

fn oauth_error(message: String) -> AppError {
    AppError::new(ErrorCode::OAuthError, message)
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn authorization_url(&self, state: &str) -> AppResult<String> {
        let url = url::Url::parse_with_params(
            GOOGLE_AUTH_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
                ("prompt", "select_account"),
            ],
        )
        .map_err(|e| AppError::internal(format!("bad authorization url: {e}")))?;
        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> AppResult<ProviderProfile> {
        let token_response = self
            .client
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| oauth_error(format!("google token exchange failed: {e}")))?;

        if !token_response.status().is_success() {
            let body = token_response.text().await.unwrap_or_default();
            return Err(oauth_error(format!("google token error: {body}")));
        }

        let token: GoogleTokenResponse = token_response
            .json()
            .await
            .map_err(|e| oauth_error(format!("invalid token response: {e}")))?;

        let user_info_response = self
            .client
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| oauth_error(format!("google userinfo failed: {e}")))?;

        if !user_info_response.status().is_success() {
            let status = user_info_response.status();
            return Err(oauth_error(format!("google userinfo returned {status}")));
        }

        let info: GoogleUserInfo = user_info_response
            .json()
            .await
            .map_err(|e| oauth_error(format!("invalid userinfo response: {e}")))?;

        Ok(ProviderProfile {
            email: info.email,
            name: info.name,
            email_verified: info.email_verified,
        })
    }
}
