use clap::{Parser, Subcommand};

mod app;
mod commands;
mod config;
mod ui;

use app::Desktop;
use config::DesktopConfig;

/// Kemaslah account tools: register, sign in, reset passwords
#[derive(Parser)]
#[command(name = "kemaslah", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Host the local callback server inside this process
    #[arg(long, global = true)]
    embedded_server: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the interface languages
    Languages,

    /// Email a verification link, required before registering
    VerifyEmail(commands::register::VerifyEmailArgs),

    /// Create an account for a verified email
    Register(commands::register::RegisterArgs),

    /// Sign in with email and password
    Login(commands::login::LoginArgs),

    /// Sign in with Google through the browser
    Google,

    /// Reset a forgotten password with an emailed code
    ForgotPassword(commands::password::ForgotPasswordArgs),

    /// Change the interface language of an account
    SetLanguage(commands::language::SetLanguageArgs),

    /// Change the name shown for an account
    SetDisplayName(commands::account::DisplayNameArgs),

    /// Permanently delete an account
    DeleteAccount(commands::account::DeleteAccountArgs),

    /// Run the local callback server in the foreground
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kemaslah_shared::middleware::init_tracing("kemaslah-desktop");

    let cli = Cli::parse();
    let config = DesktopConfig::load()?;
    let mut desktop = Desktop::open(config)?;

    if let Commands::Serve = cli.command {
        return commands::serve::run(&desktop).await;
    }

    if cli.embedded_server {
        desktop.start_embedded_server()?;
    }

    let result = match cli.command {
        Commands::Languages => commands::language::list(&desktop),
        Commands::VerifyEmail(args) => commands::register::verify_email(&desktop, args).await,
        Commands::Register(args) => commands::register::register(&desktop, args),
        Commands::Login(args) => commands::login::login(&desktop, args),
        Commands::Google => commands::login::google(&desktop).await,
        Commands::ForgotPassword(args) => commands::password::forgot_password(&desktop, args).await,
        Commands::SetLanguage(args) => commands::language::set(&desktop, args),
        Commands::SetDisplayName(args) => commands::account::set_display_name(&desktop, args),
        Commands::DeleteAccount(args) => commands::account::delete_account(&desktop, args),
        Commands::Serve => Ok(()),
    };

    desktop.shutdown().await;

    if let Err(e) = result {
        tracing::debug!(error = ?e, code = e.code().code(), "command failed");
        eprintln!("error: {}", e.user_message());
        std::process::exit(1);
    }
    Ok(())
}
