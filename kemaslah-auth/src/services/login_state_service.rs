use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use uuid::Uuid;

use kemaslah_shared::errors::AppResult;

use crate::models::{LoginState, LoginStatus, NewLoginState};
use crate::schema::login_states;

/// Opens a handshake row in PENDING and returns its id.
pub fn create_login_request(conn: &mut SqliteConnection, now: NaiveDateTime) -> AppResult<String> {
    let state_id = Uuid::new_v4().to_string();
    diesel::insert_into(login_states::table)
        .values(&NewLoginState {
            state_id: &state_id,
            status: LoginStatus::Pending,
            created_at: now,
        })
        .execute(conn)?;

    tracing::debug!(state_id = %state_id, "login request created");
    Ok(state_id)
}

/// Marks the handshake successful for `email`. An unknown id is a no-op and
/// a second completion overwrites the first.
pub fn complete_login_request(conn: &mut SqliteConnection, state_id: &str, email: &str) -> AppResult<bool> {
    let updated = diesel::update(login_states::table.find(state_id))
        .set((
            login_states::status.eq(Some(LoginStatus::Success)),
            login_states::user_email.eq(Some(email)),
        ))
        .execute(conn)?;

    if updated > 0 {
        metrics::counter!("login_requests_completed_total").increment(1);
        tracing::info!(state_id = %state_id, email = %email, "login request completed");
    } else {
        tracing::warn!(state_id = %state_id, "completion for unknown login request ignored");
    }
    Ok(updated > 0)
}

/// Moves a PENDING handshake to FAILED. Settled rows are left alone.
pub fn fail_login_request(conn: &mut SqliteConnection, state_id: &str) -> AppResult<bool> {
    let updated = diesel::update(
        login_states::table
            .find(state_id)
            .filter(login_states::status.eq(LoginStatus::Pending).or(login_states::status.is_null())),
    )
    .set(login_states::status.eq(Some(LoginStatus::Failed)))
    .execute(conn)?;

    if updated > 0 {
        tracing::info!(state_id = %state_id, "login request failed");
    }
    Ok(updated > 0)
}

pub fn login_request(conn: &mut SqliteConnection, state_id: &str) -> AppResult<Option<LoginState>> {
    let row = login_states::table
        .find(state_id)
        .select(LoginState::as_select())
        .first(conn)
        .optional()?;
    Ok(row)
}

/// The email bound to a successful handshake. Never mutates the row.
pub fn check_login_status(conn: &mut SqliteConnection, state_id: &str) -> AppResult<Option<String>> {
    let Some(state) = login_request(conn, state_id)? else {
        return Ok(None);
    };
    Ok(match state.status() {
        LoginStatus::Success => state.user_email,
        LoginStatus::Pending | LoginStatus::Failed => None,
    })
}

/// Deletes handshake rows created before `cutoff`.
pub fn purge_login_requests(conn: &mut SqliteConnection, cutoff: NaiveDateTime) -> AppResult<usize> {
    let purged = diesel::delete(
        login_states::table.filter(
            login_states::created_at
                .lt(cutoff)
                .or(login_states::created_at.is_null()),
        ),
    )
    .execute(conn)?;

    if purged > 0 {
        tracing::info!(purged, "stale login requests removed");
    }
    Ok(purged)
}
