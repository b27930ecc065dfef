use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use diesel::backend::Backend;
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use diesel::sqlite::Sqlite;
use serde::Serialize;

use crate::schema::{languages, login_states, password_resets, user_profiles, users, verified_emails};

// --- Account origin ---

/// How an account came to exist. Provider accounts hold an unusable password
/// and can only sign in through the browser handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsExpression, FromSqlRow, Serialize)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum AccountOrigin {
    Local,
    Provider,
}

impl AccountOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Provider => "provider",
        }
    }
}

impl FromStr for AccountOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "provider" => Ok(Self::Provider),
            other => Err(format!("unknown account origin: {other}")),
        }
    }
}

impl ToSql<Text, Sqlite> for AccountOrigin {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(self.as_str());
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Sqlite> for AccountOrigin {
    fn from_sql(bytes: <Sqlite as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
        let raw = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        raw.parse().map_err(Into::into)
    }
}

// --- Login handshake status ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsExpression, FromSqlRow, Serialize)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoginStatus {
    Pending,
    Success,
    Failed,
}

impl LoginStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for LoginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoginStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown login status: {other}")),
        }
    }
}

impl ToSql<Text, Sqlite> for LoginStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(self.as_str());
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Sqlite> for LoginStatus {
    fn from_sql(bytes: <Sqlite as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
        let raw = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        raw.parse().map_err(Into::into)
    }
}

// --- Users ---

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users, primary_key(user_id))]
pub struct User {
    pub user_id: i32,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub profile_picture: Option<String>,
    pub initials: Option<String>,
    pub registration_date: Option<NaiveDateTime>,
    pub last_login: Option<NaiveDateTime>,
    pub is_active: Option<bool>,
    pub preferred_language_id: Option<i32>,
    pub origin: AccountOrigin,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub initials: &'a str,
    pub registration_date: NaiveDateTime,
    pub is_active: bool,
    pub preferred_language_id: i32,
    pub origin: AccountOrigin,
}

// --- Profiles ---

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = user_profiles, primary_key(profile_id))]
pub struct UserProfile {
    pub profile_id: i32,
    pub user_id: Option<i32>,
    pub display_name: Option<String>,
    pub pfp_path: Option<String>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = user_profiles)]
pub struct NewUserProfile<'a> {
    pub user_id: i32,
    pub display_name: &'a str,
    pub updated_at: NaiveDateTime,
}

// --- Languages ---

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = languages, primary_key(language_id))]
pub struct Language {
    pub language_id: i32,
    pub language_name: String,
    pub language_code: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = languages)]
pub struct NewLanguage<'a> {
    pub language_name: &'a str,
    pub language_code: &'a str,
}

// --- Pre-registration email verification ---

#[derive(Debug, Insertable)]
#[diesel(table_name = verified_emails)]
pub struct NewVerifiedEmail<'a> {
    pub email: &'a str,
    pub is_verified: bool,
    pub verified_at: NaiveDateTime,
}

// --- Password resets ---

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = password_resets, primary_key(reset_id))]
pub struct PasswordReset {
    pub reset_id: i32,
    pub user_id: Option<i32>,
    pub email: String,
    pub otp_code: String,
    pub otp_generated_at: Option<NaiveDateTime>,
    pub otp_expires_at: Option<NaiveDateTime>,
    pub otp_verified: Option<bool>,
    pub reset_completed: Option<bool>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = password_resets)]
pub struct NewPasswordReset<'a> {
    pub user_id: Option<i32>,
    pub email: &'a str,
    pub otp_code: &'a str,
    pub otp_generated_at: NaiveDateTime,
    pub otp_expires_at: NaiveDateTime,
    pub otp_verified: bool,
    pub reset_completed: bool,
}

// --- Login handshake ---

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = login_states, primary_key(state_id))]
pub struct LoginState {
    pub state_id: String,
    pub status: Option<LoginStatus>,
    pub user_email: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl LoginState {
    /// Rows written without an explicit status default to PENDING in the table DDL.
    pub fn status(&self) -> LoginStatus {
        self.status.unwrap_or(LoginStatus::Pending)
    }

    pub fn is_expired(&self, now: NaiveDateTime, ttl: chrono::Duration) -> bool {
        match self.created_at {
            Some(created_at) => created_at + ttl <= now,
            None => true,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = login_states)]
pub struct NewLoginState<'a> {
    pub state_id: &'a str,
    pub status: LoginStatus,
    pub created_at: NaiveDateTime,
}

// --- Joined view handed to the UI ---

/// A signed-in user: the User row merged with its profile and language.
#[derive(Debug, Clone, Serialize)]
pub struct UserRecord {
    pub user_id: i32,
    pub username: String,
    pub email: String,
    pub initials: Option<String>,
    pub profile_picture: Option<String>,
    pub registration_date: Option<NaiveDateTime>,
    pub last_login: Option<NaiveDateTime>,
    pub is_active: bool,
    pub origin: AccountOrigin,
    pub preferred_language_id: Option<i32>,
    pub display_name: Option<String>,
    pub pfp_path: Option<String>,
    pub language_name: Option<String>,
    pub language_code: String,
}

impl UserRecord {
    pub fn from_parts(user: User, profile: Option<UserProfile>, language: Option<Language>) -> Self {
        let (display_name, pfp_path) = profile
            .map(|p| (p.display_name, p.pfp_path))
            .unwrap_or((None, None));
        let (language_name, language_code) = language
            .map(|l| (Some(l.language_name), l.language_code))
            .unwrap_or((None, None));

        Self {
            user_id: user.user_id,
            username: user.username,
            email: user.email,
            initials: user.initials,
            profile_picture: user.profile_picture,
            registration_date: user.registration_date,
            last_login: user.last_login,
            is_active: user.is_active.unwrap_or(true),
            origin: user.origin,
            preferred_language_id: user.preferred_language_id,
            display_name,
            pfp_path,
            language_name,
            language_code: language_code.unwrap_or_else(|| crate::DEFAULT_LANGUAGE_CODE.to_string()),
        }
    }

    /// The name shown in the UI: the profile override, else the username.
    pub fn shown_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}
