use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel::sqlite::SqliteConnection;

use kemaslah_shared::errors::AppResult;

use crate::services::language_service;

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS "Language" (
    language_id INTEGER PRIMARY KEY AUTOINCREMENT,
    language_name TEXT NOT NULL UNIQUE,
    language_code TEXT UNIQUE
);

CREATE TABLE IF NOT EXISTS "User" (
    user_id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE COLLATE NOCASE,
    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
    password_hash TEXT NOT NULL,
    profile_picture TEXT,
    initials TEXT,
    registration_date TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    last_login TIMESTAMP,
    is_active BOOLEAN DEFAULT 1,
    preferred_language_id INTEGER DEFAULT 1 REFERENCES "Language"(language_id),
    origin TEXT NOT NULL DEFAULT 'local'
);

CREATE TABLE IF NOT EXISTS "UserProfile" (
    profile_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER REFERENCES "User"(user_id),
    display_name TEXT,
    pfp_path TEXT,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS "VerifiedEmails" (
    email TEXT PRIMARY KEY,
    is_verified BOOLEAN DEFAULT 0,
    verified_at TIMESTAMP
);

CREATE TABLE IF NOT EXISTS "PasswordReset" (
    reset_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER REFERENCES "User"(user_id),
    email TEXT NOT NULL,
    otp_code TEXT NOT NULL,
    otp_generated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    otp_expires_at TIMESTAMP,
    otp_verified BOOLEAN DEFAULT 0,
    reset_completed BOOLEAN DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_password_reset_email ON "PasswordReset"(email);

CREATE TABLE IF NOT EXISTS "LoginState" (
    state_id TEXT PRIMARY KEY,
    status TEXT DEFAULT 'PENDING',
    user_email TEXT,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
"#;

#[derive(QueryableByName)]
struct ColumnInfo {
    #[diesel(sql_type = Text)]
    name: String,
}

fn has_column(conn: &mut SqliteConnection, table: &str, column: &str) -> AppResult<bool> {
    let columns: Vec<ColumnInfo> = diesel::sql_query(format!("PRAGMA table_info(\"{table}\")")).load(conn)?;
    Ok(columns.iter().any(|c| c.name.eq_ignore_ascii_case(column)))
}

/// Brings any kemaslah.db up to the current layout: creates missing tables,
/// adds columns older releases lacked, and seeds the language list.
pub fn run_migrations(conn: &mut SqliteConnection) -> AppResult<()> {
    conn.immediate_transaction::<_, kemaslah_shared::AppError, _>(|conn| {
        conn.batch_execute(CREATE_TABLES)?;

        if !has_column(conn, "Language", "language_code")? {
            // SQLite cannot add a UNIQUE column in place.
            conn.batch_execute(
                r#"ALTER TABLE "Language" ADD COLUMN language_code TEXT;
                   CREATE UNIQUE INDEX IF NOT EXISTS idx_language_code ON "Language"(language_code);"#,
            )?;
            tracing::info!("added Language.language_code");
        }

        if !has_column(conn, "User", "origin")? {
            conn.batch_execute(r#"ALTER TABLE "User" ADD COLUMN origin TEXT NOT NULL DEFAULT 'local';"#)?;
            tracing::info!("added User.origin");
        }

        language_service::seed_languages(conn)
    })?;

    tracing::debug!("schema up to date");
    Ok(())
}
