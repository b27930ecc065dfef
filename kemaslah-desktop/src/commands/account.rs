use clap::Args;

use kemaslah_auth::CredentialStore;
use kemaslah_shared::errors::AppResult;

use crate::app::Desktop;
use crate::ui;

#[derive(Args)]
pub struct DisplayNameArgs {
    #[arg(long)]
    email: String,

    #[arg(long)]
    name: String,
}

pub fn set_display_name(desktop: &Desktop, args: DisplayNameArgs) -> AppResult<()> {
    let controller = desktop.sign_in(&args.email)?;
    let Some(user) = controller.current_user() else {
        return Ok(());
    };
    if desktop.store.update_display_name(&user.email, &args.name)? {
        println!("Display name set to {}.", args.name.trim());
    }
    Ok(())
}

#[derive(Args)]
pub struct DeleteAccountArgs {
    #[arg(long)]
    email: String,

    /// Skip the confirmation prompt
    #[arg(long)]
    yes: bool,
}

pub fn delete_account(desktop: &Desktop, args: DeleteAccountArgs) -> AppResult<()> {
    let mut controller = desktop.sign_in(&args.email)?;
    if !args.yes && !ui::confirm("Delete this account and all its data?")? {
        println!("Nothing deleted.");
        return Ok(());
    }

    let email = controller.current_user().map(|u| u.email.clone()).unwrap_or(args.email);
    if desktop.store.delete_user_account(&email)? {
        controller.logout();
        println!("Account deleted.");
    } else {
        println!("No account found.");
    }
    Ok(())
}
