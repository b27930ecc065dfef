mod locale;
mod login_controller;

pub use locale::{LocaleObserver, LocaleRegistry};
pub use login_controller::{
    BrowserLauncher, LoginController, LoginOutcome, LoginPhase, SystemBrowser, INVALID_CREDENTIALS_MESSAGE,
};
