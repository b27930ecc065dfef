use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use kemaslah_shared::errors::{AppError, AppResult, ErrorCode};

use super::locale::LocaleRegistry;
use crate::models::{LoginStatus, UserRecord};
use crate::store::CredentialStore;

pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid Email or Password.";

/// Opens the provider sign-in page for the user.
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> AppResult<()>;
}

/// The platform's default browser.
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> AppResult<()> {
        open::that(url).map_err(|e| AppError::internal(format!("could not open browser: {e}")))
    }
}

#[derive(Debug, Clone)]
pub enum LoginPhase {
    Idle,
    AwaitingBrowser { state_id: String, deadline: Instant },
    Resolved(UserRecord),
}

#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Pending,
    Succeeded(UserRecord),
    Failed(String),
    TimedOut,
    Cancelled,
}

/// Drives one desktop sign-in at a time, either by password or through the
/// browser handshake with the callback server.
pub struct LoginController {
    store: Arc<dyn CredentialStore>,
    browser: Arc<dyn BrowserLauncher>,
    locales: LocaleRegistry,
    callback_base_url: String,
    poll_interval: Duration,
    phase: LoginPhase,
}

impl LoginController {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        browser: Arc<dyn BrowserLauncher>,
        locales: LocaleRegistry,
        callback_base_url: &str,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            browser,
            locales,
            callback_base_url: callback_base_url.trim_end_matches('/').to_string(),
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            phase: LoginPhase::Idle,
        }
    }

    pub fn phase(&self) -> &LoginPhase {
        &self.phase
    }

    pub fn current_user(&self) -> Option<&UserRecord> {
        match &self.phase {
            LoginPhase::Resolved(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_awaiting_browser(&self) -> bool {
        matches!(self.phase, LoginPhase::AwaitingBrowser { .. })
    }

    /// Starts a browser handshake and returns the URL that was opened.
    pub fn begin(&mut self) -> AppResult<String> {
        if self.is_awaiting_browser() {
            return Err(AppError::new(
                ErrorCode::LoginInProgress,
                "A browser sign-in is already in progress.",
            ));
        }

        let state_id = self.store.create_login_request()?;
        let url = self.login_url(&state_id)?;

        if let Err(e) = self.browser.open(&url) {
            tracing::warn!(error = %e, url = %url, "browser did not open; user must follow the link");
        }

        let ttl = self.store.settings().login_state_ttl.to_std().unwrap_or(Duration::ZERO);
        tracing::info!(state_id = %state_id, "awaiting browser sign-in");
        self.phase = LoginPhase::AwaitingBrowser {
            state_id,
            deadline: Instant::now() + ttl,
        };
        Ok(url)
    }

    fn login_url(&self, state_id: &str) -> AppResult<String> {
        let mut url = url::Url::parse(&format!("{}/login/google", self.callback_base_url))
            .map_err(|e| AppError::internal(format!("bad callback base url: {e}")))?;
        url.query_pairs_mut().append_pair("state_id", state_id);
        Ok(url.to_string())
    }

    /// One check of the handshake row. Outside a handshake this reports the
    /// current sign-in, if any, without touching the store.
    pub fn poll(&mut self) -> AppResult<LoginOutcome> {
        let (state_id, deadline) = match &self.phase {
            LoginPhase::AwaitingBrowser { state_id, deadline } => (state_id.clone(), *deadline),
            LoginPhase::Resolved(user) => return Ok(LoginOutcome::Succeeded(user.clone())),
            LoginPhase::Idle => {
                return Err(AppError::new(ErrorCode::LoginStateInvalid, "No sign-in is in progress."))
            }
        };

        if let Some(email) = self.store.check_login_status(&state_id)? {
            return self.resolve_from_browser(&state_id, &email);
        }

        let row = self.store.login_request(&state_id)?;
        match row.as_ref().map(|row| row.status()) {
            Some(LoginStatus::Failed) | None => {
                tracing::info!(state_id = %state_id, "browser sign-in failed");
                self.phase = LoginPhase::Idle;
                return Ok(LoginOutcome::Failed("Sign-in was not completed in the browser.".into()));
            }
            // Completed between the two reads.
            Some(LoginStatus::Success) => {
                if let Some(email) = row.and_then(|row| row.user_email) {
                    return self.resolve_from_browser(&state_id, &email);
                }
            }
            Some(LoginStatus::Pending) => {}
        }

        if Instant::now() >= deadline {
            self.store.fail_login_request(&state_id)?;
            tracing::info!(state_id = %state_id, "browser sign-in timed out");
            self.phase = LoginPhase::Idle;
            return Ok(LoginOutcome::TimedOut);
        }

        Ok(LoginOutcome::Pending)
    }

    fn resolve_from_browser(&mut self, state_id: &str, email: &str) -> AppResult<LoginOutcome> {
        match self.store.find_user(email)? {
            Some(user) => {
                tracing::info!(state_id = %state_id, user_id = user.user_id, "browser sign-in resolved");
                Ok(LoginOutcome::Succeeded(self.resolve(user)))
            }
            None => {
                tracing::error!(state_id = %state_id, email = %email, "handshake completed for missing account");
                self.phase = LoginPhase::Idle;
                Ok(LoginOutcome::Failed("Account not found.".into()))
            }
        }
    }

    fn resolve(&mut self, user: UserRecord) -> UserRecord {
        self.locales.broadcast(&user.language_code);
        self.phase = LoginPhase::Resolved(user.clone());
        user
    }

    /// Abandons the handshake. The LoginState row is left as it is.
    pub fn cancel(&mut self) -> bool {
        if let LoginPhase::AwaitingBrowser { state_id, .. } = &self.phase {
            tracing::info!(state_id = %state_id, "browser sign-in cancelled");
            self.phase = LoginPhase::Idle;
            return true;
        }
        false
    }

    /// Polls until the handshake settles or `cancel` fires.
    pub async fn wait(&mut self, cancel: &CancellationToken) -> AppResult<LoginOutcome> {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.cancel();
                    return Ok(LoginOutcome::Cancelled);
                }
                _ = ticker.tick() => {
                    match self.poll()? {
                        LoginOutcome::Pending => continue,
                        settled => return Ok(settled),
                    }
                }
            }
        }
    }

    pub fn login_with_password(&mut self, email: &str, password: &str) -> AppResult<UserRecord> {
        if self.is_awaiting_browser() {
            return Err(AppError::new(
                ErrorCode::LoginInProgress,
                "A browser sign-in is already in progress.",
            ));
        }
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::Validation("Please enter both email and password.".into()));
        }

        match self.store.validate_login(email, password)? {
            Some(user) => Ok(self.resolve(user)),
            None => Err(AppError::new(ErrorCode::InvalidCredentials, INVALID_CREDENTIALS_MESSAGE)),
        }
    }

    /// Saves the signed-in user's language and pushes it to every observer.
    pub fn change_language(&mut self, language_id: i32) -> AppResult<bool> {
        let LoginPhase::Resolved(user) = &mut self.phase else {
            return Err(AppError::new(ErrorCode::LoginStateInvalid, "Sign in first."));
        };
        if !self.store.update_user_language(&user.email, language_id)? {
            return Ok(false);
        }

        let code = self.store.language_code(language_id)?;
        user.preferred_language_id = Some(language_id);
        user.language_code = code.clone();
        self.locales.broadcast(&code);
        Ok(true)
    }

    pub fn logout(&mut self) {
        if let LoginPhase::Resolved(user) = &self.phase {
            tracing::info!(user_id = user.user_id, "signed out");
        }
        self.phase = LoginPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::controller::LocaleObserver;
    use crate::store::tests::{temp_store, temp_store_with, PASSWORD};
    use crate::store::{SqliteCredentialStore, StoreSettings};

    #[derive(Default)]
    struct FakeBrowser(Mutex<Vec<String>>);

    impl BrowserLauncher for FakeBrowser {
        fn open(&self, url: &str) -> AppResult<()> {
            self.0.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct LastLocale(Mutex<Option<String>>);

    impl LocaleObserver for LastLocale {
        fn apply_locale(&self, language_code: &str) {
            *self.0.lock().unwrap() = Some(language_code.to_string());
        }
    }

    struct Harness {
        store: Arc<SqliteCredentialStore>,
        browser: Arc<FakeBrowser>,
        locale: Arc<LastLocale>,
        controller: LoginController,
    }

    fn harness_with(store: SqliteCredentialStore) -> Harness {
        let store = Arc::new(store);
        let browser = Arc::new(FakeBrowser::default());
        let locale = Arc::new(LastLocale::default());
        let locales = LocaleRegistry::new();
        locales.subscribe(locale.clone());
        let controller = LoginController::new(
            store.clone(),
            browser.clone(),
            locales,
            "http://127.0.0.1:5000/",
            Duration::from_millis(10),
        );
        Harness { store, browser, locale, controller }
    }

    fn harness() -> Harness {
        harness_with(temp_store())
    }

    fn state_id_of(controller: &LoginController) -> String {
        match controller.phase() {
            LoginPhase::AwaitingBrowser { state_id, .. } => state_id.clone(),
            other => panic!("expected AwaitingBrowser, got {other:?}"),
        }
    }

    #[test]
    fn begin_opens_login_url_and_refuses_a_second_handshake() {
        let mut h = harness();
        let url = h.controller.begin().unwrap();
        let state_id = state_id_of(&h.controller);

        assert_eq!(url, format!("http://127.0.0.1:5000/login/google?state_id={state_id}"));
        assert_eq!(h.browser.0.lock().unwrap().as_slice(), [url]);
        assert_eq!(h.controller.begin().unwrap_err().code(), ErrorCode::LoginInProgress);
    }

    #[test]
    fn poll_resolves_once_the_server_completes() {
        let mut h = harness();
        h.store.create_user("alice", "alice@x.com", PASSWORD).unwrap();
        h.controller.begin().unwrap();
        let state_id = state_id_of(&h.controller);

        assert!(matches!(h.controller.poll().unwrap(), LoginOutcome::Pending));
        h.store.complete_login_request(&state_id, "alice@x.com").unwrap();

        match h.controller.poll().unwrap() {
            LoginOutcome::Succeeded(user) => assert_eq!(user.email, "alice@x.com"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(h.controller.current_user().unwrap().username, "alice");
        assert_eq!(h.locale.0.lock().unwrap().as_deref(), Some("en"));
    }

    #[test]
    fn server_side_failure_returns_to_idle() {
        let mut h = harness();
        h.controller.begin().unwrap();
        let state_id = state_id_of(&h.controller);
        h.store.fail_login_request(&state_id).unwrap();

        assert!(matches!(h.controller.poll().unwrap(), LoginOutcome::Failed(_)));
        assert!(matches!(h.controller.phase(), LoginPhase::Idle));
    }

    /// Completes the handshake row during the status read, then reports it as
    /// still pending, the way a concurrent callback write can land between reads.
    struct CompletesDuringRead {
        inner: SqliteCredentialStore,
        email: &'static str,
    }

    impl CredentialStore for CompletesDuringRead {
        fn settings(&self) -> &StoreSettings { self.inner.settings() }
        fn ping(&self) -> AppResult<()> { self.inner.ping() }
        fn create_user(&self, u: &str, e: &str, p: &str) -> AppResult<crate::store::Registration> { self.inner.create_user(u, e, p) }
        fn create_provider_user(&self, n: Option<&str>, e: &str) -> AppResult<UserRecord> { self.inner.create_provider_user(n, e) }
        fn validate_login(&self, e: &str, p: &str) -> AppResult<Option<UserRecord>> { self.inner.validate_login(e, p) }
        fn find_user(&self, e: &str) -> AppResult<Option<UserRecord>> { self.inner.find_user(e) }
        fn update_password(&self, e: &str, p: &str) -> AppResult<bool> { self.inner.update_password(e, p) }
        fn delete_user_account(&self, e: &str) -> AppResult<bool> { self.inner.delete_user_account(e) }
        fn update_user_language(&self, e: &str, id: i32) -> AppResult<bool> { self.inner.update_user_language(e, id) }
        fn update_display_name(&self, e: &str, n: &str) -> AppResult<bool> { self.inner.update_display_name(e, n) }
        fn list_languages(&self) -> AppResult<Vec<crate::models::Language>> { self.inner.list_languages() }
        fn language_code(&self, id: i32) -> AppResult<String> { self.inner.language_code(id) }
        fn mark_email_verified(&self, e: &str) -> AppResult<()> { self.inner.mark_email_verified(e) }
        fn is_email_verified(&self, e: &str) -> AppResult<bool> { self.inner.is_email_verified(e) }
        fn store_otp(&self, e: &str, o: &str) -> AppResult<()> { self.inner.store_otp(e, o) }
        fn verify_otp(&self, e: &str, o: &str) -> AppResult<bool> { self.inner.verify_otp(e, o) }
        fn last_otp_issued_at(&self, e: &str) -> AppResult<Option<chrono::NaiveDateTime>> { self.inner.last_otp_issued_at(e) }
        fn create_login_request(&self) -> AppResult<String> { self.inner.create_login_request() }
        fn complete_login_request(&self, id: &str, e: &str) -> AppResult<bool> { self.inner.complete_login_request(id, e) }
        fn fail_login_request(&self, id: &str) -> AppResult<bool> { self.inner.fail_login_request(id) }
        fn login_request(&self, id: &str) -> AppResult<Option<crate::models::LoginState>> { self.inner.login_request(id) }
        fn purge_login_requests(&self, age: chrono::Duration) -> AppResult<usize> { self.inner.purge_login_requests(age) }

        fn check_login_status(&self, id: &str) -> AppResult<Option<String>> {
            self.inner.complete_login_request(id, self.email)?;
            Ok(None)
        }
    }

    #[test]
    fn success_landing_between_reads_is_not_reported_as_timeout() {
        let inner = temp_store_with(StoreSettings {
            login_state_ttl: chrono::Duration::zero(),
            ..StoreSettings::default()
        });
        inner.create_user("alice", "alice@x.com", PASSWORD).unwrap();
        let store = Arc::new(CompletesDuringRead { inner, email: "alice@x.com" });
        let mut controller = LoginController::new(
            store.clone(),
            Arc::new(FakeBrowser::default()),
            LocaleRegistry::new(),
            "http://127.0.0.1:5000",
            Duration::from_millis(10),
        );
        controller.begin().unwrap();
        let state_id = state_id_of(&controller);

        match controller.poll().unwrap() {
            LoginOutcome::Succeeded(user) => assert_eq!(user.email, "alice@x.com"),
            other => panic!("expected success, got {other:?}"),
        }
        let row = store.inner.login_request(&state_id).unwrap().unwrap();
        assert_eq!(row.status(), LoginStatus::Success);
    }

    #[test]
    fn handshake_times_out_and_marks_row_failed() {
        let mut h = harness_with(temp_store_with(StoreSettings {
            login_state_ttl: chrono::Duration::zero(),
            ..StoreSettings::default()
        }));
        h.controller.begin().unwrap();
        let state_id = state_id_of(&h.controller);

        assert!(matches!(h.controller.poll().unwrap(), LoginOutcome::TimedOut));
        assert!(matches!(h.controller.phase(), LoginPhase::Idle));
        let row = h.store.login_request(&state_id).unwrap().unwrap();
        assert_eq!(row.status(), LoginStatus::Failed);
    }

    #[tokio::test]
    async fn cancel_leaves_the_row_untouched() {
        let mut h = harness();
        h.controller.begin().unwrap();
        let state_id = state_id_of(&h.controller);

        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(h.controller.wait(&cancel).await.unwrap(), LoginOutcome::Cancelled));
        assert!(matches!(h.controller.phase(), LoginPhase::Idle));

        let row = h.store.login_request(&state_id).unwrap().unwrap();
        assert_eq!(row.status(), LoginStatus::Pending);
        assert!(!h.controller.cancel());
    }

    #[tokio::test]
    async fn wait_returns_when_the_browser_finishes() {
        let mut h = harness();
        h.store.create_user("alice", "alice@x.com", PASSWORD).unwrap();
        h.controller.begin().unwrap();
        let state_id = state_id_of(&h.controller);

        let store = h.store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            store.complete_login_request(&state_id, "alice@x.com").unwrap();
        });

        let outcome = h.controller.wait(&CancellationToken::new()).await.unwrap();
        assert!(matches!(outcome, LoginOutcome::Succeeded(_)));
    }

    #[test]
    fn password_login_uses_one_message_for_every_failure() {
        let mut h = harness();
        h.store.create_user("alice", "alice@x.com", PASSWORD).unwrap();

        for (email, password) in [("alice@x.com", "Wr0ng!Pass1"), ("ghost@x.com", PASSWORD)] {
            let err = h.controller.login_with_password(email, password).unwrap_err();
            assert_eq!(err.user_message(), INVALID_CREDENTIALS_MESSAGE);
        }

        let user = h.controller.login_with_password("alice@x.com", PASSWORD).unwrap();
        assert_eq!(user.username, "alice");
        assert!(matches!(h.controller.poll().unwrap(), LoginOutcome::Succeeded(_)));
    }

    #[test]
    fn changing_language_broadcasts_the_new_code() {
        let mut h = harness();
        h.store.create_user("alice", "alice@x.com", PASSWORD).unwrap();
        assert_eq!(h.controller.change_language(2).unwrap_err().code(), ErrorCode::LoginStateInvalid);

        h.controller.login_with_password("alice@x.com", PASSWORD).unwrap();
        assert!(h.controller.change_language(2).unwrap());
        assert_eq!(h.locale.0.lock().unwrap().as_deref(), Some("ms"));
        assert_eq!(h.controller.current_user().unwrap().language_code, "ms");
        assert!(!h.controller.change_language(999).unwrap());

        h.controller.logout();
        assert!(h.controller.current_user().is_none());
    }
}
