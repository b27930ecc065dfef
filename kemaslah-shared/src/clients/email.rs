use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("email send failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("email API error ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Outbound mail used by the authentication core. Both methods are fire and
/// forget from the caller's point of view; failures are reported, never retried.
#[async_trait]
pub trait EmailDispatch: Send + Sync {
    /// Sends the pre-registration link. `link_token` is placed in the
    /// `/verify?token=` query string of the callback server.
    async fn send_verification_email(&self, to: &str, link_token: &str) -> Result<(), EmailError>;

    async fn send_otp_email(&self, to: &str, otp_code: &str) -> Result<(), EmailError>;
}

#[derive(Clone)]
pub struct EmailClient {
    client: Client,
    api_key: String,
    from_email: String,
    callback_base_url: String,
}

#[derive(Debug, Serialize)]
struct ResendRequest {
    from: String,
    to: Vec<String>,
    subject: String,
    html: String,
}

impl EmailClient {
    pub fn new(api_key: &str, from_email: &str, callback_base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            from_email: from_email.to_string(),
            callback_base_url: callback_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn send_email(
        &self,
        to: &str,
        from_name: &str,
        subject: &str,
        html: &str,
    ) -> Result<(), EmailError> {
        let request = ResendRequest {
            from: format!("{} <{}>", from_name, self.from_email),
            to: vec![to.to_string()],
            subject: subject.to_string(),
            html: html.to_string(),
        };

        let response = self.client
            .post("https://api.resend.com/emails")
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(EmailError::Rejected { status, body });
        }

        tracing::debug!(to = %to, subject = %subject, "email sent");
        Ok(())
    }

    pub fn verification_url(&self, link_token: &str) -> String {
        let base = format!("{}/verify", self.callback_base_url);
        match url::Url::parse(&base) {
            Ok(mut url) => {
                url.query_pairs_mut().append_pair("token", link_token);
                url.to_string()
            }
            Err(e) => {
                tracing::warn!(error = %e, base = %base, "callback base url is not absolute");
                format!("{base}?token={link_token}")
            }
        }
    }
}

#[async_trait]
impl EmailDispatch for EmailClient {
    async fn send_verification_email(&self, to: &str, link_token: &str) -> Result<(), EmailError> {
        let html = verification_template(&self.verification_url(link_token));
        self.send_email(to, "Kemaslah Manager", "Verify Your Kemaslah Account", &html).await
    }

    async fn send_otp_email(&self, to: &str, otp_code: &str) -> Result<(), EmailError> {
        let html = otp_template(otp_code);
        self.send_email(to, "Kemaslah Security", "Your Kemaslah Password Reset Code", &html).await
    }
}

fn verification_template(verify_url: &str) -> String {
    format!(
        r#"<div style="font-family: 'Segoe UI', Tahoma, sans-serif; background-color: #0B1426; padding: 40px 20px; text-align: center;">
        <div style="background-color: #1A202C; border-radius: 25px; padding: 40px; max-width: 400px; margin: 0 auto;">
        <h1 style="color: #FFFFFF; font-size: 24px;">Welcome to Kemaslah</h1>
        <p style="color: #718096; font-size: 14px;">Your smarter file manager</p>
        <p style="color: #CBD5E0; font-size: 16px;">Please verify your email address to complete registration:</p>
        <a href="{verify_url}" style="display: inline-block; background-color: #0D3B66; color: #FFFFFF; padding: 12px 35px; font-weight: bold; text-decoration: none; border-radius: 22px;">Verify Email</a>
        <p style="color: #718096; font-size: 11px; margin-top: 40px;">If you didn't request this email, you can safely ignore it.</p>
        </div></div>"#
    )
}

fn otp_template(otp_code: &str) -> String {
    format!(
        r#"<div style="font-family: 'Segoe UI', sans-serif; background-color: #0B1426; padding: 40px 20px; text-align: center;">
        <div style="background-color: #1A202C; border-radius: 25px; padding: 40px; max-width: 400px; margin: 0 auto;">
        <h1 style="color: #FFFFFF; font-size: 24px;">Reset Your Password</h1>
        <p style="color: #CBD5E0; font-size: 16px;">Use the 6-digit code below to reset your password:</p>
        <div style="background-color: #0B1426; padding: 20px; border-radius: 15px; border: 1px solid #2D3748; font-size: 32px; font-weight: bold; letter-spacing: 8px; color: #3182CE;">{otp_code}</div>
        <p style="color: #718096; font-size: 11px; margin-top: 40px;">This code expires in 10 minutes. If you did not request a password reset, please secure your account.</p>
        </div></div>"#
    )
}
