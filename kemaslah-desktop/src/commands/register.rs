use clap::Args;

use kemaslah_auth::dispatch;
use kemaslah_auth::{CredentialStore, Registration};
use kemaslah_shared::errors::{AppError, AppResult, ErrorCode};

use crate::app::{cancel_on_ctrl_c, Desktop};
use crate::ui;

#[derive(Args)]
pub struct VerifyEmailArgs {
    /// Email address to verify before registering
    #[arg(long)]
    email: String,

    /// Return after sending instead of waiting for the link to be followed
    #[arg(long)]
    no_wait: bool,
}

pub async fn verify_email(desktop: &Desktop, args: VerifyEmailArgs) -> AppResult<()> {
    let report = desktop
        .email_worker()
        .request_verification_link(&args.email)?
        .await
        .map_err(|_| AppError::internal("email worker dropped its report"))?;
    println!("{}", report.message);
    if !report.success || args.no_wait {
        return Ok(());
    }

    println!("Waiting for the link to be opened (Ctrl-C to stop)...");
    let cancel = cancel_on_ctrl_c();
    let verified = dispatch::wait_for_verification(
        desktop.store.as_ref(),
        &args.email,
        desktop.config.verify_poll_interval(),
        &cancel,
    )
    .await?;

    if verified {
        println!("Email verified. Run `kemaslah register` to finish.");
    } else {
        println!("Stopped waiting. The link stays valid.");
    }
    Ok(())
}

#[derive(Args)]
pub struct RegisterArgs {
    #[arg(long)]
    username: String,

    #[arg(long)]
    email: String,
}

pub fn register(desktop: &Desktop, args: RegisterArgs) -> AppResult<()> {
    if !desktop.store.is_email_verified(&args.email)? {
        return Err(AppError::new(
            ErrorCode::EmailNotVerified,
            "Please verify your email first with `kemaslah verify-email`.",
        ));
    }

    let password = ui::new_password()?;
    match desktop.store.create_user(&args.username, &args.email, &password)? {
        Registration::Created => println!("Account created. You can now sign in."),
        Registration::UsernameExists => {
            return Err(AppError::new(ErrorCode::UsernameAlreadyExists, "Username already exists."))
        }
        Registration::EmailExists => {
            return Err(AppError::new(ErrorCode::EmailAlreadyExists, "Email is already registered."))
        }
    }
    Ok(())
}
