use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use kemaslah_shared::clients::email::EmailDispatch;
use kemaslah_shared::errors::{AppError, AppResult, ErrorCode};

use crate::services::{otp_service, password_service};
use crate::store::CredentialStore;

pub const RESET_REQUESTED_MESSAGE: &str =
    "If an account exists for this email, a reset code is on its way.";
pub const VERIFICATION_SENT_MESSAGE: &str = "Verification link sent. Check your inbox.";
const DELIVERY_FAILED_MESSAGE: &str = "Failed to send email. Please try again later.";

/// What a background email job reports back to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub success: bool,
    pub message: String,
}

impl DispatchReport {
    fn sent(message: &str) -> Self {
        Self { success: true, message: message.to_string() }
    }

    fn failed(message: &str) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Runs outbound email off the caller's task. Input is validated up front;
/// delivery is reported on the returned channel.
#[derive(Clone)]
pub struct EmailWorker {
    store: Arc<dyn CredentialStore>,
    mailer: Arc<dyn EmailDispatch>,
}

impl EmailWorker {
    pub fn new(store: Arc<dyn CredentialStore>, mailer: Arc<dyn EmailDispatch>) -> Self {
        Self { store, mailer }
    }

    /// Issues a password reset code. Whether the email is registered is never
    /// revealed: the report reads the same either way, and a repeat request
    /// inside the resend cooldown is answered the same without sending.
    pub fn request_password_reset(&self, email: &str) -> AppResult<oneshot::Receiver<DispatchReport>> {
        let email = password_service::normalize_email(email);
        password_service::validate_email(&email)?;

        let (tx, rx) = oneshot::channel();
        let store = Arc::clone(&self.store);
        let mailer = Arc::clone(&self.mailer);

        tokio::spawn(async move {
            let report = match store.find_user(&email) {
                Ok(Some(_)) => match in_resend_cooldown(store.as_ref(), &email) {
                    Ok(true) => {
                        tracing::info!(email = %email, "reset code requested again inside cooldown");
                        DispatchReport::sent(RESET_REQUESTED_MESSAGE)
                    }
                    Ok(false) => issue_reset_code(store.as_ref(), mailer.as_ref(), &email).await,
                    Err(e) => {
                        tracing::error!(email = %email, error = %e, "reset cooldown lookup failed");
                        DispatchReport::failed(&e.user_message())
                    }
                },
                Ok(None) => {
                    tracing::info!(email = %email, "reset requested for unregistered email");
                    DispatchReport::sent(RESET_REQUESTED_MESSAGE)
                }
                Err(e) => {
                    tracing::error!(email = %email, error = %e, "reset lookup failed");
                    DispatchReport::failed(&e.user_message())
                }
            };
            let _ = tx.send(report);
        });

        Ok(rx)
    }

    /// Sends the pre-registration verification link for an unregistered email.
    pub fn request_verification_link(&self, email: &str) -> AppResult<oneshot::Receiver<DispatchReport>> {
        let email = password_service::normalize_email(email);
        password_service::validate_email(&email)?;
        if self.store.find_user(&email)?.is_some() {
            return Err(AppError::new(ErrorCode::EmailAlreadyExists, "Email is already registered."));
        }

        let (tx, rx) = oneshot::channel();
        let mailer = Arc::clone(&self.mailer);

        tokio::spawn(async move {
            let report = match mailer.send_verification_email(&email, &email).await {
                Ok(()) => {
                    tracing::info!(email = %email, "verification link sent");
                    DispatchReport::sent(VERIFICATION_SENT_MESSAGE)
                }
                Err(e) => {
                    tracing::error!(email = %email, error = %e, "verification email failed");
                    DispatchReport::failed(DELIVERY_FAILED_MESSAGE)
                }
            };
            let _ = tx.send(report);
        });

        Ok(rx)
    }
}

/// Stores a fresh code before mailing it, so a failed send leaves nothing
/// the user could not have received.
async fn issue_reset_code(store: &dyn CredentialStore, mailer: &dyn EmailDispatch, email: &str) -> DispatchReport {
    let otp = otp_service::generate_otp();
    if let Err(e) = store.store_otp(email, &otp) {
        tracing::error!(email = %email, error = %e, "reset code not stored");
        return DispatchReport::failed(&e.user_message());
    }
    match mailer.send_otp_email(email, &otp).await {
        Ok(()) => DispatchReport::sent(RESET_REQUESTED_MESSAGE),
        Err(e) => {
            tracing::error!(email = %email, error = %e, "reset code email failed");
            DispatchReport::failed(DELIVERY_FAILED_MESSAGE)
        }
    }
}

/// True while the newest code for `email` is younger than the resend cooldown.
fn in_resend_cooldown(store: &dyn CredentialStore, email: &str) -> AppResult<bool> {
    let cooldown = store.settings().otp_resend_cooldown;
    Ok(store
        .last_otp_issued_at(email)?
        .is_some_and(|issued_at| Utc::now().naive_utc() - issued_at < cooldown))
}

/// Polls until the verification link for `email` has been followed.
/// Returns `false` when cancelled first.
pub async fn wait_for_verification(
    store: &dyn CredentialStore,
    email: &str,
    interval: StdDuration,
    cancel: &CancellationToken,
) -> AppResult<bool> {
    let mut ticker = tokio::time::interval(interval.max(StdDuration::from_millis(1)));
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(false),
            _ = ticker.tick() => {
                if store.is_email_verified(email)? {
                    return Ok(true);
                }
            }
        }
    }
}
