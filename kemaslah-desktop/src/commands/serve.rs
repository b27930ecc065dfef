use kemaslah_callback::config::CallbackConfig;

use crate::app::{cancel_on_ctrl_c, Desktop};

/// Runs the callback server in the foreground against the desktop database
/// until Ctrl-C.
pub async fn run(desktop: &Desktop) -> anyhow::Result<()> {
    let mut config = CallbackConfig::load()?;
    config.database_url = desktop.config.database_url.clone();
    config.login_state_ttl_secs = desktop.config.login_state_ttl_secs;

    println!("Serving sign-in callbacks on http://{} (Ctrl-C to stop)", config.addr());
    kemaslah_callback::run(config, desktop.store.clone(), None, cancel_on_ctrl_c()).await
}
