pub mod controller;
pub mod dispatch;
pub mod migrations;
pub mod models;
pub mod schema;
pub mod services;
pub mod store;

pub use store::{CredentialStore, Registration, SqliteCredentialStore, StoreSettings};

/// Language every account starts with, and the fallback when a row has no code.
pub const DEFAULT_LANGUAGE_ID: i32 = 1;
pub const DEFAULT_LANGUAGE_CODE: &str = "en";
