use clap::Args;

use kemaslah_auth::CredentialStore;
use kemaslah_shared::errors::{AppError, AppResult, ErrorCode};

use crate::app::Desktop;
use crate::ui;

#[derive(Args)]
pub struct ForgotPasswordArgs {
    #[arg(long)]
    email: String,
}

/// Sends a reset code, checks it, then sets the new password.
pub async fn forgot_password(desktop: &Desktop, args: ForgotPasswordArgs) -> AppResult<()> {
    let report = desktop
        .email_worker()
        .request_password_reset(&args.email)?
        .await
        .map_err(|_| AppError::internal("email worker dropped its report"))?;
    println!("{}", report.message);
    if !report.success {
        return Err(AppError::new(ErrorCode::EmailDeliveryFailed, report.message));
    }

    let code = ui::text("Six-digit code")?;
    if !desktop.store.verify_otp(&args.email, &code)? {
        return Err(AppError::new(ErrorCode::OtpInvalid, "Invalid or expired code."));
    }

    let password = ui::new_password()?;
    if desktop.store.update_password(&args.email, &password)? {
        println!("Password updated. You can now sign in.");
        Ok(())
    } else {
        Err(AppError::new(ErrorCode::OtpInvalid, "Invalid or expired code."))
    }
}
