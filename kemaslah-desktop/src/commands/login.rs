use clap::Args;

use kemaslah_auth::controller::LoginOutcome;
use kemaslah_shared::errors::{AppError, AppResult, ErrorCode};

use crate::app::{cancel_on_ctrl_c, Desktop};

#[derive(Args)]
pub struct LoginArgs {
    #[arg(long)]
    email: String,
}

pub fn login(desktop: &Desktop, args: LoginArgs) -> AppResult<()> {
    let controller = desktop.sign_in(&args.email)?;
    if let Some(user) = controller.current_user() {
        describe(user);
    }
    Ok(())
}

pub async fn google(desktop: &Desktop) -> AppResult<()> {
    let mut controller = desktop.controller();
    let url = controller.begin()?;
    println!("Continue in your browser. If it did not open, visit:\n  {url}");
    println!("Waiting for Google sign-in (Ctrl-C to cancel)...");

    match controller.wait(&cancel_on_ctrl_c()).await? {
        LoginOutcome::Succeeded(user) => {
            println!("Signed in as {}.", user.shown_name());
            describe(&user);
            Ok(())
        }
        LoginOutcome::Cancelled => {
            println!("Sign-in cancelled.");
            Ok(())
        }
        LoginOutcome::TimedOut => Err(AppError::new(
            ErrorCode::LoginTimedOut,
            "Google sign-in timed out. Please try again.",
        )),
        LoginOutcome::Failed(message) => Err(AppError::new(ErrorCode::OAuthError, message)),
        LoginOutcome::Pending => Err(AppError::internal("sign-in wait returned while still pending")),
    }
}

fn describe(user: &kemaslah_auth::models::UserRecord) {
    println!("  username: {}", user.username);
    println!("  email:    {}", user.email);
    println!("  language: {}", user.language_name.as_deref().unwrap_or(&user.language_code));
    if let Some(last_login) = user.last_login {
        println!("  last login: {}", last_login.format("%Y-%m-%d %H:%M:%S UTC"));
    }
}
