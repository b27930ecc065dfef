use chrono::{Duration, NaiveDateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::sqlite::SqliteConnection;

use kemaslah_shared::clients::db::{self, DbPool};
use kemaslah_shared::errors::{AppError, AppResult};

use crate::migrations;
use crate::models::{AccountOrigin, Language, LoginState, UserRecord};
use crate::services::user_service::NewAccount;
use crate::services::{
    language_service, login_state_service, otp_service, password_service, user_service,
    verification_service,
};

pub use crate::services::user_service::Registration;

type PooledConn = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Lifetimes the store enforces on time-boxed rows.
#[derive(Debug, Clone, Copy)]
pub struct StoreSettings {
    pub otp_ttl: Duration,
    pub otp_resend_cooldown: Duration,
    pub login_state_ttl: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            otp_ttl: Duration::minutes(10),
            otp_resend_cooldown: Duration::seconds(60),
            login_state_ttl: Duration::minutes(10),
        }
    }
}

impl StoreSettings {
    /// Builds settings from raw second counts as read from the environment.
    /// Negative or out-of-range values fall back to the defaults, and a code
    /// lifetime of zero is refused since every code would expire on creation.
    pub fn from_secs(otp_ttl: i64, otp_resend_cooldown: i64, login_state_ttl: i64) -> Self {
        let defaults = Self::default();
        Self {
            otp_ttl: seconds_or(otp_ttl, 1, defaults.otp_ttl),
            otp_resend_cooldown: seconds_or(otp_resend_cooldown, 0, defaults.otp_resend_cooldown),
            login_state_ttl: seconds_or(login_state_ttl, 0, defaults.login_state_ttl),
        }
    }
}

fn seconds_or(secs: i64, min: i64, fallback: Duration) -> Duration {
    if secs < min {
        tracing::warn!(secs, min, "duration setting below minimum, using default");
        return fallback;
    }
    Duration::try_seconds(secs).unwrap_or_else(|| {
        tracing::warn!(secs, "duration setting out of range, using default");
        fallback
    })
}

/// Everything the desktop app and the callback server persist. Emails are
/// normalised here, so callers may pass them as typed.
pub trait CredentialStore: Send + Sync {
    fn settings(&self) -> &StoreSettings;
    fn ping(&self) -> AppResult<()>;

    fn create_user(&self, username: &str, email: &str, password: &str) -> AppResult<Registration>;
    fn create_provider_user(&self, display_name: Option<&str>, email: &str) -> AppResult<UserRecord>;
    fn validate_login(&self, email: &str, password: &str) -> AppResult<Option<UserRecord>>;
    fn find_user(&self, email: &str) -> AppResult<Option<UserRecord>>;
    fn update_password(&self, email: &str, new_password: &str) -> AppResult<bool>;
    fn delete_user_account(&self, email: &str) -> AppResult<bool>;
    fn update_user_language(&self, email: &str, language_id: i32) -> AppResult<bool>;
    fn update_display_name(&self, email: &str, display_name: &str) -> AppResult<bool>;

    fn list_languages(&self) -> AppResult<Vec<Language>>;
    fn language_code(&self, language_id: i32) -> AppResult<String>;

    fn mark_email_verified(&self, email: &str) -> AppResult<()>;
    fn is_email_verified(&self, email: &str) -> AppResult<bool>;

    fn store_otp(&self, email: &str, otp: &str) -> AppResult<()>;
    fn verify_otp(&self, email: &str, otp: &str) -> AppResult<bool>;
    fn last_otp_issued_at(&self, email: &str) -> AppResult<Option<NaiveDateTime>>;

    fn create_login_request(&self) -> AppResult<String>;
    fn complete_login_request(&self, state_id: &str, email: &str) -> AppResult<bool>;
    fn fail_login_request(&self, state_id: &str) -> AppResult<bool>;
    fn check_login_status(&self, state_id: &str) -> AppResult<Option<String>>;
    fn login_request(&self, state_id: &str) -> AppResult<Option<LoginState>>;
    fn purge_login_requests(&self, older_than: Duration) -> AppResult<usize>;
}

pub struct SqliteCredentialStore {
    pool: DbPool,
    settings: StoreSettings,
}

impl SqliteCredentialStore {
    /// Opens (creating if needed) the database file and migrates it.
    pub fn open(database_url: &str, settings: StoreSettings) -> AppResult<Self> {
        let pool = db::create_pool(database_url)?;
        Self::from_pool(pool, settings)
    }

    pub fn from_pool(pool: DbPool, settings: StoreSettings) -> AppResult<Self> {
        let store = Self { pool, settings };
        migrations::run_migrations(&mut *store.conn()?)?;
        Ok(store)
    }

    fn conn(&self) -> AppResult<PooledConn> {
        self.pool
            .get()
            .map_err(|e| AppError::Internal(anyhow::Error::new(e).context("database pool exhausted")))
    }
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

impl CredentialStore for SqliteCredentialStore {
    fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    fn ping(&self) -> AppResult<()> {
        self.conn()?.batch_execute("SELECT 1")?;
        Ok(())
    }

    fn create_user(&self, username: &str, email: &str, password: &str) -> AppResult<Registration> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::Validation("Username is required.".into()));
        }
        let email = password_service::normalize_email(email);
        password_service::validate_email(&email)?;
        password_service::validate_password(password)?;

        let password_hash = password_service::hash_password(password)?;
        let account = NewAccount {
            username,
            email: &email,
            password_hash: &password_hash,
            origin: AccountOrigin::Local,
        };
        user_service::create_user(&mut *self.conn()?, &account, now())
    }

    fn create_provider_user(&self, display_name: Option<&str>, email: &str) -> AppResult<UserRecord> {
        let email = password_service::normalize_email(email);
        password_service::validate_email(&email)?;
        user_service::create_provider_user(&mut *self.conn()?, display_name, &email, now())
    }

    fn validate_login(&self, email: &str, password: &str) -> AppResult<Option<UserRecord>> {
        let email = password_service::normalize_email(email);
        user_service::validate_login(&mut *self.conn()?, &email, password, now())
    }

    fn find_user(&self, email: &str) -> AppResult<Option<UserRecord>> {
        let email = password_service::normalize_email(email);
        let mut conn = self.conn()?;
        match user_service::find_user(&mut conn, &email)? {
            Some(user) => user_service::load_record(&mut conn, user).map(Some),
            None => Ok(None),
        }
    }

    fn update_password(&self, email: &str, new_password: &str) -> AppResult<bool> {
        password_service::validate_password(new_password)?;
        let email = password_service::normalize_email(email);
        let password_hash = password_service::hash_password(new_password)?;
        user_service::update_password(&mut *self.conn()?, &email, &password_hash)
    }

    fn delete_user_account(&self, email: &str) -> AppResult<bool> {
        let email = password_service::normalize_email(email);
        user_service::delete_user_account(&mut *self.conn()?, &email)
    }

    fn update_user_language(&self, email: &str, language_id: i32) -> AppResult<bool> {
        let email = password_service::normalize_email(email);
        user_service::update_user_language(&mut *self.conn()?, &email, language_id)
    }

    fn update_display_name(&self, email: &str, display_name: &str) -> AppResult<bool> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(AppError::Validation("Display name cannot be empty.".into()));
        }
        let email = password_service::normalize_email(email);
        user_service::update_display_name(&mut *self.conn()?, &email, display_name, now())
    }

    fn list_languages(&self) -> AppResult<Vec<Language>> {
        language_service::list_languages(&mut *self.conn()?)
    }

    fn language_code(&self, language_id: i32) -> AppResult<String> {
        language_service::language_code(&mut *self.conn()?, language_id)
    }

    fn mark_email_verified(&self, email: &str) -> AppResult<()> {
        let email = password_service::normalize_email(email);
        password_service::validate_email(&email)?;
        verification_service::mark_email_verified(&mut *self.conn()?, &email, now())
    }

    fn is_email_verified(&self, email: &str) -> AppResult<bool> {
        let email = password_service::normalize_email(email);
        verification_service::is_email_verified(&mut *self.conn()?, &email)
    }

    fn store_otp(&self, email: &str, otp: &str) -> AppResult<()> {
        let email = password_service::normalize_email(email);
        otp_service::store_otp(&mut *self.conn()?, &email, otp, now(), self.settings.otp_ttl)
    }

    fn verify_otp(&self, email: &str, otp: &str) -> AppResult<bool> {
        let email = password_service::normalize_email(email);
        otp_service::verify_otp(&mut *self.conn()?, &email, otp.trim(), now())
    }

    fn last_otp_issued_at(&self, email: &str) -> AppResult<Option<NaiveDateTime>> {
        let email = password_service::normalize_email(email);
        otp_service::last_issued_at(&mut *self.conn()?, &email)
    }

    fn create_login_request(&self) -> AppResult<String> {
        login_state_service::create_login_request(&mut *self.conn()?, now())
    }

    fn complete_login_request(&self, state_id: &str, email: &str) -> AppResult<bool> {
        let email = password_service::normalize_email(email);
        login_state_service::complete_login_request(&mut *self.conn()?, state_id, &email)
    }

    fn fail_login_request(&self, state_id: &str) -> AppResult<bool> {
        login_state_service::fail_login_request(&mut *self.conn()?, state_id)
    }

    fn check_login_status(&self, state_id: &str) -> AppResult<Option<String>> {
        login_state_service::check_login_status(&mut *self.conn()?, state_id)
    }

    fn login_request(&self, state_id: &str) -> AppResult<Option<LoginState>> {
        login_state_service::login_request(&mut *self.conn()?, state_id)
    }

    fn purge_login_requests(&self, older_than: Duration) -> AppResult<usize> {
        login_state_service::purge_login_requests(&mut *self.conn()?, now() - older_than)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::LoginStatus;

    pub(crate) const PASSWORD: &str = "Str0ng!Pass1";

    pub(crate) fn temp_store_with(settings: StoreSettings) -> SqliteCredentialStore {
        let path = std::env::temp_dir().join(format!("kemaslah-test-{}.db", uuid::Uuid::new_v4()));
        SqliteCredentialStore::open(path.to_str().unwrap(), settings).unwrap()
    }

    pub(crate) fn temp_store() -> SqliteCredentialStore {
        temp_store_with(StoreSettings::default())
    }

    #[test]
    fn settings_from_bad_seconds_fall_back_to_defaults() {
        let settings = StoreSettings::from_secs(-5, -1, i64::MAX);
        assert_eq!(settings.otp_ttl, Duration::minutes(10));
        assert_eq!(settings.otp_resend_cooldown, Duration::seconds(60));
        assert_eq!(settings.login_state_ttl, Duration::minutes(10));

        assert_eq!(StoreSettings::from_secs(0, 0, 0).otp_ttl, Duration::minutes(10));
        let zeroed = StoreSettings::from_secs(120, 0, 0);
        assert_eq!(zeroed.otp_ttl, Duration::minutes(2));
        assert_eq!(zeroed.otp_resend_cooldown, Duration::zero());
        assert_eq!(zeroed.login_state_ttl, Duration::zero());
    }

    #[test]
    fn register_then_login() {
        let store = temp_store();
        assert_eq!(store.create_user("alice", "alice@x.com", PASSWORD).unwrap(), Registration::Created);

        let record = store.validate_login("alice@x.com", PASSWORD).unwrap().unwrap();
        assert_eq!(record.username, "alice");
        assert_eq!(record.initials.as_deref(), Some("A"));
        assert_eq!(record.display_name.as_deref(), Some("alice"));
        assert_eq!(record.language_code, "en");
        assert_eq!(record.origin, AccountOrigin::Local);
        assert!(record.last_login.is_some());
    }

    #[test]
    fn wrong_password_and_unknown_email_look_the_same() {
        let store = temp_store();
        store.create_user("alice", "alice@x.com", PASSWORD).unwrap();
        assert!(store.validate_login("alice@x.com", "Wr0ng!Pass1").unwrap().is_none());
        assert!(store.validate_login("nobody@x.com", PASSWORD).unwrap().is_none());
    }

    #[test]
    fn email_is_case_insensitive() {
        let store = temp_store();
        store.create_user("alice", "Alice@X.com", PASSWORD).unwrap();
        assert!(store.validate_login("ALICE@x.COM", PASSWORD).unwrap().is_some());
        assert_eq!(store.create_user("alice2", "alice@x.com", PASSWORD).unwrap(), Registration::EmailExists);
    }

    #[test]
    fn username_collision_is_case_insensitive() {
        let store = temp_store();
        store.create_user("alice", "alice@x.com", PASSWORD).unwrap();
        assert_eq!(store.create_user("ALICE", "other@x.com", PASSWORD).unwrap(), Registration::UsernameExists);
    }

    #[test]
    fn registration_rejects_weak_password_and_bad_email() {
        let store = temp_store();
        assert!(store.create_user("alice", "alice@x.com", "weakpass").is_err());
        assert!(store.create_user("alice", "alice@localhost", PASSWORD).is_err());
        assert!(store.find_user("alice@x.com").unwrap().is_none());
    }

    #[test]
    fn last_login_strictly_increases() {
        let store = temp_store();
        store.create_user("alice", "alice@x.com", PASSWORD).unwrap();
        let first = store.validate_login("alice@x.com", PASSWORD).unwrap().unwrap().last_login;
        let second = store.validate_login("alice@x.com", PASSWORD).unwrap().unwrap().last_login;
        assert!(second > first);
    }

    #[test]
    fn registration_consumes_email_verification() {
        let store = temp_store();
        store.mark_email_verified("alice@x.com").unwrap();
        store.mark_email_verified("alice@x.com").unwrap();
        assert!(store.is_email_verified("ALICE@x.com").unwrap());

        store.create_user("alice", "alice@x.com", PASSWORD).unwrap();
        assert!(!store.is_email_verified("alice@x.com").unwrap());
    }

    #[test]
    fn otp_reset_flow() {
        let store = temp_store();
        store.create_user("alice", "alice@x.com", PASSWORD).unwrap();
        store.store_otp("alice@x.com", "123456").unwrap();

        assert!(!store.verify_otp("alice@x.com", "654321").unwrap());
        assert!(store.verify_otp("alice@x.com", "123456").unwrap());
        // single use
        assert!(!store.verify_otp("alice@x.com", "123456").unwrap());

        assert!(store.update_password("alice@x.com", "N3w!Password").unwrap());
        assert!(store.validate_login("alice@x.com", PASSWORD).unwrap().is_none());
        assert!(store.validate_login("alice@x.com", "N3w!Password").unwrap().is_some());
    }

    fn reset_rows(store: &SqliteCredentialStore, email: &str) -> Vec<crate::models::PasswordReset> {
        use crate::schema::password_resets;
        use diesel::prelude::*;

        password_resets::table
            .filter(password_resets::email.eq(email))
            .order(password_resets::reset_id.asc())
            .select(crate::models::PasswordReset::as_select())
            .load(&mut *store.conn().unwrap())
            .unwrap()
    }

    #[test]
    fn password_update_completes_only_the_newest_verified_reset() {
        let store = temp_store();
        store.create_user("alice", "alice@x.com", PASSWORD).unwrap();
        store.store_otp("alice@x.com", "111111").unwrap();
        store.store_otp("alice@x.com", "222222").unwrap();
        assert!(store.verify_otp("alice@x.com", "111111").unwrap());
        assert!(store.verify_otp("alice@x.com", "222222").unwrap());

        assert!(store.update_password("alice@x.com", "N3w!Password").unwrap());

        let flags: Vec<_> = reset_rows(&store, "alice@x.com")
            .into_iter()
            .map(|r| (r.otp_code, r.otp_verified, r.reset_completed))
            .collect();
        assert_eq!(
            flags,
            [
                ("111111".to_string(), Some(true), Some(false)),
                ("222222".to_string(), Some(true), Some(true)),
            ]
        );
    }

    #[test]
    fn duplicate_code_consumes_the_newest_row_first() {
        let store = temp_store();
        store.store_otp("alice@x.com", "123456").unwrap();
        store.store_otp("alice@x.com", "123456").unwrap();

        assert!(store.verify_otp("alice@x.com", "123456").unwrap());
        let verified: Vec<_> = reset_rows(&store, "alice@x.com").into_iter().map(|r| r.otp_verified).collect();
        assert_eq!(verified, [Some(false), Some(true)]);

        assert!(store.verify_otp("alice@x.com", "123456").unwrap());
        assert!(!store.verify_otp("alice@x.com", "123456").unwrap());
    }

    #[test]
    fn unreadable_stored_hash_fails_login_quietly() {
        use crate::schema::users;
        use diesel::prelude::*;

        let store = temp_store();
        store.create_user("alice", "alice@x.com", PASSWORD).unwrap();
        diesel::update(users::table)
            .set(users::password_hash.eq("corrupted"))
            .execute(&mut *store.conn().unwrap())
            .unwrap();

        assert!(store.validate_login("alice@x.com", PASSWORD).unwrap().is_none());
    }

    #[test]
    fn older_outstanding_codes_stay_valid() {
        let store = temp_store();
        store.store_otp("alice@x.com", "111111").unwrap();
        store.store_otp("alice@x.com", "222222").unwrap();
        assert!(store.verify_otp("alice@x.com", "111111").unwrap());
        assert!(store.verify_otp("alice@x.com", "222222").unwrap());
        assert!(store.last_otp_issued_at("alice@x.com").unwrap().is_some());
        assert!(store.last_otp_issued_at("bob@x.com").unwrap().is_none());
    }

    #[test]
    fn expired_otp_is_rejected() {
        let store = temp_store_with(StoreSettings {
            otp_ttl: Duration::seconds(-1),
            ..StoreSettings::default()
        });
        store.store_otp("alice@x.com", "123456").unwrap();
        assert!(!store.verify_otp("alice@x.com", "123456").unwrap());
    }

    #[test]
    fn update_password_for_unknown_email_is_false() {
        let store = temp_store();
        assert!(!store.update_password("ghost@x.com", "N3w!Password").unwrap());
        assert!(store.update_password("ghost@x.com", "weak").is_err());
    }

    #[test]
    fn legacy_sha256_hash_is_upgraded_on_login() {
        use diesel::prelude::*;
        use sha2::{Digest, Sha256};

        let store = temp_store();
        store.create_user("alice", "alice@x.com", PASSWORD).unwrap();
        let legacy = hex::encode(Sha256::digest(PASSWORD.as_bytes()));
        {
            use crate::schema::users;
            let mut conn = store.conn().unwrap();
            diesel::update(users::table)
                .set(users::password_hash.eq(&legacy))
                .execute(&mut conn)
                .unwrap();
        }

        assert!(store.validate_login("alice@x.com", PASSWORD).unwrap().is_some());

        use crate::schema::users;
        let stored: String = users::table
            .select(users::password_hash)
            .first(&mut store.conn().unwrap())
            .unwrap();
        assert!(stored.starts_with("$argon2"));
        assert!(store.validate_login("alice@x.com", PASSWORD).unwrap().is_some());
    }

    #[test]
    fn delete_account_removes_everything() {
        let store = temp_store();
        store.create_user("alice", "alice@x.com", PASSWORD).unwrap();
        store.store_otp("alice@x.com", "123456").unwrap();
        store.mark_email_verified("alice@x.com").unwrap();

        assert!(store.delete_user_account("alice@x.com").unwrap());
        assert!(store.find_user("alice@x.com").unwrap().is_none());
        assert!(!store.verify_otp("alice@x.com", "123456").unwrap());
        assert!(!store.is_email_verified("alice@x.com").unwrap());
        assert!(!store.delete_user_account("alice@x.com").unwrap());

        // the username is free again
        assert_eq!(store.create_user("alice", "alice@x.com", PASSWORD).unwrap(), Registration::Created);
    }

    #[test]
    fn languages_are_seeded_and_selectable() {
        let store = temp_store();
        let languages = store.list_languages().unwrap();
        let codes: Vec<_> = languages.iter().filter_map(|l| l.language_code.clone()).collect();
        assert_eq!(codes, ["en", "ms", "zh-CN", "ta"]);

        store.create_user("alice", "alice@x.com", PASSWORD).unwrap();
        let malay = languages.iter().find(|l| l.language_code.as_deref() == Some("ms")).unwrap();
        assert!(store.update_user_language("alice@x.com", malay.language_id).unwrap());
        assert!(store.update_user_language("alice@x.com", malay.language_id).unwrap());
        assert!(!store.update_user_language("alice@x.com", 999).unwrap());

        let record = store.find_user("alice@x.com").unwrap().unwrap();
        assert_eq!(record.language_code, "ms");
        assert_eq!(store.language_code(999).unwrap(), "en");
    }

    #[test]
    fn display_name_update() {
        let store = temp_store();
        store.create_user("alice", "alice@x.com", PASSWORD).unwrap();
        assert!(store.update_display_name("alice@x.com", "Alice Tan").unwrap());
        assert_eq!(store.find_user("alice@x.com").unwrap().unwrap().shown_name(), "Alice Tan");
        assert!(!store.update_display_name("ghost@x.com", "Ghost").unwrap());
    }

    #[test]
    fn reopening_an_existing_file_keeps_data() {
        let path = std::env::temp_dir().join(format!("kemaslah-test-{}.db", uuid::Uuid::new_v4()));
        let url = path.to_str().unwrap();
        {
            let store = SqliteCredentialStore::open(url, StoreSettings::default()).unwrap();
            store.create_user("alice", "alice@x.com", PASSWORD).unwrap();
        }
        let store = SqliteCredentialStore::open(url, StoreSettings::default()).unwrap();
        assert!(store.find_user("alice@x.com").unwrap().is_some());
        assert_eq!(store.list_languages().unwrap().len(), 4);
    }

    #[test]
    fn provider_account_cannot_use_password_login() {
        let store = temp_store();
        let record = store.create_provider_user(Some("Bob Lee"), "Bob@X.com").unwrap();
        assert_eq!(record.origin, AccountOrigin::Provider);
        assert_eq!(record.email, "bob@x.com");
        assert_eq!(record.initials.as_deref(), Some("BL"));
        assert!(store.validate_login("bob@x.com", "").unwrap().is_none());

        // a second sign-up with a clashing display name gets a suffix
        let other = store.create_provider_user(Some("Bob Lee"), "bob.lee@y.com").unwrap();
        assert_ne!(other.username, record.username);
        assert!(other.username.starts_with("Bob Lee"));
    }

    #[test]
    fn login_request_lifecycle() {
        let store = temp_store();
        let state_id = store.create_login_request().unwrap();
        assert_eq!(state_id.len(), 36);
        assert_eq!(store.check_login_status(&state_id).unwrap(), None);
        // reads never mutate
        assert_eq!(store.login_request(&state_id).unwrap().unwrap().status(), LoginStatus::Pending);

        assert!(store.complete_login_request(&state_id, "Alice@x.com").unwrap());
        assert_eq!(store.check_login_status(&state_id).unwrap().as_deref(), Some("alice@x.com"));
        assert_eq!(store.check_login_status(&state_id).unwrap().as_deref(), Some("alice@x.com"));

        // completed rows are not failed afterwards
        assert!(!store.fail_login_request(&state_id).unwrap());
        assert!(!store.complete_login_request("no-such-state", "a@x.com").unwrap());
        assert_eq!(store.check_login_status("no-such-state").unwrap(), None);
    }

    #[test]
    fn state_ids_are_unique() {
        let store = temp_store();
        let a = store.create_login_request().unwrap();
        let b = store.create_login_request().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn failed_request_never_resolves() {
        let store = temp_store();
        let state_id = store.create_login_request().unwrap();
        assert!(store.fail_login_request(&state_id).unwrap());
        assert_eq!(store.check_login_status(&state_id).unwrap(), None);
        assert_eq!(store.login_request(&state_id).unwrap().unwrap().status(), LoginStatus::Failed);
    }

    #[test]
    fn purge_removes_only_old_requests() {
        let store = temp_store();
        let state_id = store.create_login_request().unwrap();
        assert_eq!(store.purge_login_requests(Duration::minutes(10)).unwrap(), 0);
        assert_eq!(store.purge_login_requests(Duration::seconds(-1)).unwrap(), 1);
        assert!(store.login_request(&state_id).unwrap().is_none());
    }

    #[test]
    fn separate_handles_share_one_file() {
        let path = std::env::temp_dir().join(format!("kemaslah-test-{}.db", uuid::Uuid::new_v4()));
        let url = path.to_str().unwrap();
        let desktop = SqliteCredentialStore::open(url, StoreSettings::default()).unwrap();
        let server = SqliteCredentialStore::open(url, StoreSettings::default()).unwrap();

        let state_id = desktop.create_login_request().unwrap();
        server.complete_login_request(&state_id, "alice@x.com").unwrap();
        assert_eq!(desktop.check_login_status(&state_id).unwrap().as_deref(), Some("alice@x.com"));
    }
}
