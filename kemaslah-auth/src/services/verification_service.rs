use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use kemaslah_shared::errors::AppResult;

use super::lower;
use crate::models::NewVerifiedEmail;
use crate::schema::verified_emails;

/// Records that the link sent to `email` was followed. Following it again
/// refreshes the timestamp.
pub fn mark_email_verified(conn: &mut SqliteConnection, email: &str, now: NaiveDateTime) -> AppResult<()> {
    let row = NewVerifiedEmail {
        email,
        is_verified: true,
        verified_at: now,
    };
    diesel::insert_into(verified_emails::table)
        .values(&row)
        .on_conflict(verified_emails::email)
        .do_update()
        .set((
            verified_emails::is_verified.eq(Some(true)),
            verified_emails::verified_at.eq(Some(now)),
        ))
        .execute(conn)?;

    tracing::info!(email = %email, "email verified");
    Ok(())
}

pub fn is_email_verified(conn: &mut SqliteConnection, email: &str) -> AppResult<bool> {
    let hit = verified_emails::table
        .filter(lower(verified_emails::email).eq(email))
        .filter(verified_emails::is_verified.eq(true))
        .select(verified_emails::email)
        .first::<String>(conn)
        .optional()?;
    Ok(hit.is_some())
}
