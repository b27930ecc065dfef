use chrono::{Duration, NaiveDateTime};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use rand::Rng;

use kemaslah_shared::errors::AppResult;

use super::lower;
use crate::models::{NewPasswordReset, PasswordReset};
use crate::schema::{password_resets, users};

pub const OTP_LOWER_BOUND: u32 = 100_000;
pub const OTP_UPPER_BOUND: u32 = 999_999;

/// Six-digit code, uniform over `[100000, 999999]`.
pub fn generate_otp() -> String {
    let mut rng = rand::thread_rng();
    rng.gen_range(OTP_LOWER_BOUND..=OTP_UPPER_BOUND).to_string()
}

/// Records a new reset code. Earlier outstanding codes for the same email stay valid.
pub fn store_otp(
    conn: &mut SqliteConnection,
    email: &str,
    otp: &str,
    now: NaiveDateTime,
    ttl: Duration,
) -> AppResult<()> {
    let user_id = users::table
        .filter(lower(users::email).eq(email))
        .select(users::user_id)
        .first::<i32>(conn)
        .optional()?;

    let reset = NewPasswordReset {
        user_id,
        email,
        otp_code: otp,
        otp_generated_at: now,
        otp_expires_at: now + ttl,
        otp_verified: false,
        reset_completed: false,
    };
    diesel::insert_into(password_resets::table)
        .values(&reset)
        .execute(conn)?;

    tracing::info!(email = %email, registered = user_id.is_some(), "password reset code stored");
    Ok(())
}

/// Marks the newest unexpired, unverified row matching `email` and `otp` as
/// verified. Returns `false` for every kind of mismatch.
pub fn verify_otp(
    conn: &mut SqliteConnection,
    email: &str,
    otp: &str,
    now: NaiveDateTime,
) -> AppResult<bool> {
    let verified = conn.immediate_transaction::<_, kemaslah_shared::AppError, _>(|conn| {
        let candidate = password_resets::table
            .filter(lower(password_resets::email).eq(email))
            .filter(password_resets::otp_code.eq(otp))
            .filter(password_resets::otp_expires_at.gt(now))
            .filter(password_resets::otp_verified.eq(false))
            .order((password_resets::otp_generated_at.desc(), password_resets::reset_id.desc()))
            .select(PasswordReset::as_select())
            .first(conn)
            .optional()?;

        let Some(reset) = candidate else {
            return Ok(false);
        };

        diesel::update(&reset)
            .set(password_resets::otp_verified.eq(true))
            .execute(conn)?;
        tracing::debug!(reset_id = reset.reset_id, registered = reset.user_id.is_some(), "reset code consumed");
        Ok(true)
    })?;

    let outcome = if verified { "accepted" } else { "rejected" };
    metrics::counter!("otp_verifications_total", "outcome" => outcome).increment(1);
    tracing::info!(email = %email, outcome, "password reset code checked");

    Ok(verified)
}

/// When the most recent code for `email` was generated, if any.
pub fn last_issued_at(conn: &mut SqliteConnection, email: &str) -> AppResult<Option<NaiveDateTime>> {
    let latest = password_resets::table
        .filter(lower(password_resets::email).eq(email))
        .select(diesel::dsl::max(password_resets::otp_generated_at))
        .first::<Option<NaiveDateTime>>(conn)?;
    Ok(latest)
}
