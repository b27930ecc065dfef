use chrono::{Duration, NaiveDateTime};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sqlite::SqliteConnection;
use rand::Rng;

use kemaslah_shared::errors::{AppError, AppResult};

use super::lower;
use super::password_service::{self, PasswordCheck};
use crate::models::{
    AccountOrigin, Language, NewUser, NewUserProfile, User, UserProfile, UserRecord,
};
use crate::schema::{languages, password_resets, user_profiles, users, verified_emails};
use crate::DEFAULT_LANGUAGE_ID;

/// Result of a registration attempt. Collisions are ordinary outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Created,
    UsernameExists,
    EmailExists,
}

pub struct NewAccount<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub origin: AccountOrigin,
}

/// Inserts User + UserProfile and consumes the VerifiedEmails row, or reports
/// which field collided. `account.email` must already be normalised.
pub fn create_user(
    conn: &mut SqliteConnection,
    account: &NewAccount<'_>,
    now: NaiveDateTime,
) -> AppResult<Registration> {
    let username_lc = account.username.to_ascii_lowercase();

    conn.immediate_transaction::<_, AppError, _>(|conn| {
        let existing: Vec<(String, String)> = users::table
            .filter(
                lower(users::username)
                    .eq(&username_lc)
                    .or(lower(users::email).eq(account.email)),
            )
            .select((users::username, users::email))
            .load(conn)?;

        if existing.iter().any(|(u, _)| u.eq_ignore_ascii_case(account.username)) {
            return Ok(Registration::UsernameExists);
        }
        if existing.iter().any(|(_, e)| e.eq_ignore_ascii_case(account.email)) {
            return Ok(Registration::EmailExists);
        }

        let initials = password_service::initials(account.username);
        let new_user = NewUser {
            username: account.username,
            email: account.email,
            password_hash: account.password_hash,
            initials: &initials,
            registration_date: now,
            is_active: true,
            preferred_language_id: DEFAULT_LANGUAGE_ID,
            origin: account.origin,
        };
        match diesel::insert_into(users::table).values(&new_user).execute(conn) {
            Ok(_) => {}
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)) => {
                tracing::warn!(email = %account.email, detail = info.message(), "registration lost a uniqueness race");
                return Ok(if info.message().contains("username") {
                    Registration::UsernameExists
                } else {
                    Registration::EmailExists
                });
            }
            Err(e) => return Err(e.into()),
        }

        let user_id = users::table
            .filter(users::email.eq(account.email))
            .select(users::user_id)
            .first::<i32>(conn)?;

        diesel::insert_into(user_profiles::table)
            .values(&NewUserProfile {
                user_id,
                display_name: account.username,
                updated_at: now,
            })
            .execute(conn)?;

        diesel::delete(verified_emails::table.filter(lower(verified_emails::email).eq(account.email)))
            .execute(conn)?;

        tracing::info!(user_id, email = %account.email, origin = account.origin.as_str(), "user registered");
        Ok(Registration::Created)
    })
}

const PROVIDER_USERNAME_ATTEMPTS: usize = 5;

/// Provisions an account for someone who signed in through the identity
/// provider. The username comes from the provider's display name, else the
/// email local part, with a numeric suffix when taken.
pub fn create_provider_user(
    conn: &mut SqliteConnection,
    display_name: Option<&str>,
    email: &str,
    now: NaiveDateTime,
) -> AppResult<UserRecord> {
    let base = provider_username(display_name, email);
    let password_hash = password_service::hash_password(&password_service::unusable_password())?;

    for attempt in 0..PROVIDER_USERNAME_ATTEMPTS {
        let username = if attempt == 0 {
            base.clone()
        } else {
            format!("{base}{}", rand::thread_rng().gen_range(1000..10000))
        };
        let account = NewAccount {
            username: &username,
            email,
            password_hash: &password_hash,
            origin: AccountOrigin::Provider,
        };
        match create_user(conn, &account, now)? {
            Registration::UsernameExists => continue,
            Registration::Created | Registration::EmailExists => {
                let user = find_user(conn, email)?
                    .ok_or_else(|| AppError::internal("provider account vanished after insert"))?;
                return load_record(conn, user);
            }
        }
    }

    Err(AppError::internal(format!(
        "no free username derived from {base:?} after {PROVIDER_USERNAME_ATTEMPTS} attempts"
    )))
}

fn provider_username(display_name: Option<&str>, email: &str) -> String {
    let from_name = display_name.map(str::trim).filter(|n| !n.is_empty());
    let raw = from_name.unwrap_or_else(|| email.split('@').next().unwrap_or(email));
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-'))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "kemaslah user".to_string()
    } else {
        cleaned.to_string()
    }
}

pub fn find_user(conn: &mut SqliteConnection, email: &str) -> AppResult<Option<User>> {
    let user = users::table
        .filter(lower(users::email).eq(email))
        .select(User::as_select())
        .first(conn)
        .optional()?;
    Ok(user)
}

/// Joins the profile and preferred language onto a User row.
pub fn load_record(conn: &mut SqliteConnection, user: User) -> AppResult<UserRecord> {
    let profile = user_profiles::table
        .filter(user_profiles::user_id.eq(user.user_id))
        .order(user_profiles::profile_id.asc())
        .select(UserProfile::as_select())
        .first(conn)
        .optional()?;

    let language = match user.preferred_language_id {
        Some(language_id) => languages::table
            .find(language_id)
            .select(Language::as_select())
            .first(conn)
            .optional()?,
        None => None,
    };

    Ok(UserRecord::from_parts(user, profile, language))
}

/// Checks credentials. Unknown emails, wrong passwords, provider-only and
/// inactive accounts all come back as `None` after the same hashing work.
pub fn validate_login(
    conn: &mut SqliteConnection,
    email: &str,
    password: &str,
    now: NaiveDateTime,
) -> AppResult<Option<UserRecord>> {
    let Some(mut user) = find_user(conn, email)? else {
        password_service::equalize_timing(password);
        return Ok(None);
    };

    let check = password_service::verify_password(password, &user.password_hash);
    let usable = user.origin == AccountOrigin::Local && user.is_active.unwrap_or(true);
    let PasswordCheck::Valid { needs_rehash } = check else {
        return Ok(None);
    };
    if !usable {
        return Ok(None);
    }

    if needs_rehash {
        let upgraded = password_service::hash_password(password)?;
        diesel::update(users::table.find(user.user_id))
            .set(users::password_hash.eq(&upgraded))
            .execute(conn)?;
        tracing::info!(user_id = user.user_id, "legacy password hash upgraded");
        user.password_hash = upgraded;
    }

    let stamp = next_login_stamp(user.last_login, now);
    diesel::update(users::table.find(user.user_id))
        .set(users::last_login.eq(Some(stamp)))
        .execute(conn)?;
    user.last_login = Some(stamp);

    tracing::info!(user_id = user.user_id, "user logged in");
    load_record(conn, user).map(Some)
}

/// The clock may not have advanced since the previous login; the stored stamp
/// must still strictly increase.
fn next_login_stamp(previous: Option<NaiveDateTime>, now: NaiveDateTime) -> NaiveDateTime {
    match previous {
        Some(prev) if prev >= now => prev + Duration::microseconds(1),
        _ => now,
    }
}

/// Overwrites the password and closes out the most recent verified,
/// unconsumed reset for the email. Both writes commit together.
pub fn update_password(
    conn: &mut SqliteConnection,
    email: &str,
    password_hash: &str,
) -> AppResult<bool> {
    conn.immediate_transaction::<_, AppError, _>(|conn| {
        let updated = diesel::update(users::table.filter(lower(users::email).eq(email)))
            .set(users::password_hash.eq(password_hash))
            .execute(conn)?;
        if updated == 0 {
            return Ok(false);
        }

        let consumed = password_resets::table
            .filter(lower(password_resets::email).eq(email))
            .filter(password_resets::otp_verified.eq(true))
            .filter(password_resets::reset_completed.eq(false))
            .order((password_resets::otp_generated_at.desc(), password_resets::reset_id.desc()))
            .select(password_resets::reset_id)
            .first::<i32>(conn)
            .optional()?;

        if let Some(reset_id) = consumed {
            diesel::update(password_resets::table.find(reset_id))
                .set(password_resets::reset_completed.eq(true))
                .execute(conn)?;
        }

        tracing::info!(email = %email, reset_id = ?consumed, "password updated");
        Ok(true)
    })
}

/// Removes the account and everything that references it. Returns `true`
/// when a User row was deleted.
pub fn delete_user_account(conn: &mut SqliteConnection, email: &str) -> AppResult<bool> {
    conn.immediate_transaction::<_, AppError, _>(|conn| {
        let user_id = users::table
            .filter(lower(users::email).eq(email))
            .select(users::user_id)
            .first::<i32>(conn)
            .optional()?;

        if let Some(user_id) = user_id {
            diesel::delete(user_profiles::table.filter(user_profiles::user_id.eq(user_id)))
                .execute(conn)?;
            diesel::delete(password_resets::table.filter(password_resets::user_id.eq(user_id)))
                .execute(conn)?;
        }
        diesel::delete(password_resets::table.filter(lower(password_resets::email).eq(email)))
            .execute(conn)?;
        diesel::delete(verified_emails::table.filter(lower(verified_emails::email).eq(email)))
            .execute(conn)?;
        let deleted = diesel::delete(users::table.filter(lower(users::email).eq(email)))
            .execute(conn)?;

        tracing::info!(email = %email, ?user_id, deleted, "account deleted");
        Ok(deleted > 0)
    })
}

pub fn update_user_language(
    conn: &mut SqliteConnection,
    email: &str,
    language_id: i32,
) -> AppResult<bool> {
    conn.immediate_transaction::<_, AppError, _>(|conn| {
        let known = languages::table
            .find(language_id)
            .select(languages::language_id)
            .first::<i32>(conn)
            .optional()?
            .is_some();
        if !known {
            return Ok(false);
        }

        let updated = diesel::update(users::table.filter(lower(users::email).eq(email)))
            .set(users::preferred_language_id.eq(Some(language_id)))
            .execute(conn)?;
        Ok(updated > 0)
    })
}

/// Sets the profile display name, creating the profile row when an older
/// database never got one.
pub fn update_display_name(
    conn: &mut SqliteConnection,
    email: &str,
    display_name: &str,
    now: NaiveDateTime,
) -> AppResult<bool> {
    conn.immediate_transaction::<_, AppError, _>(|conn| {
        let Some(user_id) = users::table
            .filter(lower(users::email).eq(email))
            .select(users::user_id)
            .first::<i32>(conn)
            .optional()?
        else {
            return Ok(false);
        };

        let updated = diesel::update(user_profiles::table.filter(user_profiles::user_id.eq(user_id)))
            .set((
                user_profiles::display_name.eq(Some(display_name)),
                user_profiles::updated_at.eq(Some(now)),
            ))
            .execute(conn)?;

        if updated == 0 {
            diesel::insert_into(user_profiles::table)
                .values(&NewUserProfile {
                    user_id,
                    display_name,
                    updated_at: now,
                })
                .execute(conn)?;
        }
        Ok(true)
    })
}
