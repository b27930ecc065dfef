use std::sync::Mutex;

use dialoguer::{Confirm, Input, Password};

use kemaslah_auth::controller::LocaleObserver;
use kemaslah_auth::services::password_service;
use kemaslah_shared::errors::{AppError, AppResult, ErrorCode};

/// The terminal's stand-in for the app's pages: remembers the active
/// language code and tells the user when it changes.
#[derive(Default)]
pub struct TerminalLocale {
    current: Mutex<Option<String>>,
}

impl TerminalLocale {
    pub fn current(&self) -> Option<String> {
        self.current.lock().ok().and_then(|c| c.clone())
    }
}

impl LocaleObserver for TerminalLocale {
    fn apply_locale(&self, language_code: &str) {
        let Ok(mut current) = self.current.lock() else {
            return;
        };
        if current.as_deref() != Some(language_code) {
            println!("Interface language: {language_code}");
            *current = Some(language_code.to_string());
        }
    }
}

fn prompt_failed(e: dialoguer::Error) -> AppError {
    AppError::Internal(anyhow::Error::new(e).context("terminal prompt failed"))
}

pub fn password(prompt: &str) -> AppResult<String> {
    Password::new().with_prompt(prompt).interact().map_err(prompt_failed)
}

/// Asks twice and applies the strength rules before anything is sent to the store.
pub fn new_password() -> AppResult<String> {
    let first = password("New password")?;
    password_service::validate_password(&first)?;
    let second = password("Confirm password")?;
    if first != second {
        return Err(AppError::new(ErrorCode::PasswordMismatch, "Passwords do not match."));
    }
    Ok(first)
}

pub fn text(prompt: &str) -> AppResult<String> {
    Input::<String>::new().with_prompt(prompt).interact_text().map_err(prompt_failed)
}

pub fn confirm(prompt: &str) -> AppResult<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(prompt_failed)
}
