use clap::Args;

use kemaslah_auth::CredentialStore;
use kemaslah_shared::errors::{AppError, AppResult};

use crate::app::Desktop;

pub fn list(desktop: &Desktop) -> AppResult<()> {
    for language in desktop.store.list_languages()? {
        println!(
            "{:>3}  {:<8} {}",
            language.language_id,
            language.language_code.as_deref().unwrap_or("-"),
            language.language_name
        );
    }
    Ok(())
}

#[derive(Args)]
pub struct SetLanguageArgs {
    /// Account email
    #[arg(long)]
    email: String,

    /// Language code (en, ms, zh-CN, ta) or numeric id
    #[arg(long)]
    language: String,
}

pub fn set(desktop: &Desktop, args: SetLanguageArgs) -> AppResult<()> {
    let language_id = resolve_language(desktop, &args.language)?;
    let mut controller = desktop.sign_in(&args.email)?;
    if controller.change_language(language_id)? {
        let code = desktop.locale.current().unwrap_or_default();
        println!("Language updated to {code}.");
    } else {
        println!("Language could not be updated.");
    }
    Ok(())
}

fn resolve_language(desktop: &Desktop, wanted: &str) -> AppResult<i32> {
    let languages = desktop.store.list_languages()?;
    languages
        .iter()
        .find(|l| {
            l.language_code.as_deref().is_some_and(|c| c.eq_ignore_ascii_case(wanted))
                || l.language_id.to_string() == wanted
        })
        .map(|l| l.language_id)
        .ok_or_else(|| AppError::Validation(format!("Unknown language: {wanted}")))
}
