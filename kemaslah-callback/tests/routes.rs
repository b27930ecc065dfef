// HTTP-level tests for the callback server, driven through
// tower::ServiceExt::oneshot against a throwaway SQLite file.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use kemaslah_auth::models::{AccountOrigin, LoginStatus};
use kemaslah_auth::{CredentialStore, SqliteCredentialStore, StoreSettings};
use kemaslah_callback::provider::{IdentityProvider, ProviderProfile};
use kemaslah_callback::{router, AppState};
use kemaslah_shared::errors::{AppError, AppResult, ErrorCode};

const PASSWORD: &str = "Str0ng!Pass1";

// ─── Test provider ───────────────────────────────────────────────

enum Behaviour {
    Profile(ProviderProfile),
    Fail,
}

struct FakeProvider(Behaviour);

#[async_trait::async_trait]
impl IdentityProvider for FakeProvider {
    fn authorization_url(&self, state: &str) -> AppResult<String> {
        Ok(format!("https://provider.test/auth?state={state}&prompt=select_account"))
    }

    async fn exchange_code(&self, _code: &str) -> AppResult<ProviderProfile> {
        match &self.0 {
            Behaviour::Profile(profile) => Ok(profile.clone()),
            Behaviour::Fail => Err(AppError::new(ErrorCode::OAuthError, "provider down")),
        }
    }
}

fn profile(email: Option<&str>, name: Option<&str>) -> Behaviour {
    Behaviour::Profile(ProviderProfile {
        email: email.map(str::to_string),
        name: name.map(str::to_string),
        email_verified: Some(true),
    })
}

// ─── Helpers ─────────────────────────────────────────────────────

fn store_with(settings: StoreSettings) -> Arc<SqliteCredentialStore> {
    let path = std::env::temp_dir().join(format!("kemaslah-callback-{}.db", uuid::Uuid::new_v4()));
    Arc::new(SqliteCredentialStore::open(path.to_str().unwrap(), settings).unwrap())
}

fn app(store: Arc<SqliteCredentialStore>, behaviour: Behaviour) -> Router {
    let state = AppState::new(store, Arc::new(FakeProvider(behaviour)), "route-test-secret", None).unwrap();
    router(Arc::new(state))
}

async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Response<Body> {
    let mut request = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        request = request.header(COOKIE, cookie);
    }
    app.clone().oneshot(request.body(Body::empty()).unwrap()).await.unwrap()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Opens `/login/google` and returns the cookie pair to send back plus the nonce the
/// provider would echo.
async fn start_login(app: &Router, state_id: &str) -> (String, String) {
    let response = get(app, &format!("/login/google?state_id={state_id}"), None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let location = response.headers()[LOCATION].to_str().unwrap().to_string();
    let params: HashMap<String, String> = url::Url::parse(&location)
        .unwrap()
        .query_pairs()
        .into_owned()
        .collect();
    assert_eq!(params["prompt"], "select_account");

    let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.contains("HttpOnly"));
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    (cookie, params["state"].clone())
}

// ─── Health ──────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_database() {
    let app = app(store_with(StoreSettings::default()), Behaviour::Fail);
    let response = get(&app, "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "kemaslah-callback");
}

#[tokio::test]
async fn metrics_absent_without_recorder() {
    let app = app(store_with(StoreSettings::default()), Behaviour::Fail);
    assert_eq!(get(&app, "/metrics", None).await.status(), StatusCode::NOT_FOUND);
}

// ─── /verify ─────────────────────────────────────────────────────

#[tokio::test]
async fn verify_link_marks_email_verified() {
    let store = store_with(StoreSettings::default());
    let app = app(store.clone(), Behaviour::Fail);

    let response = get(&app, "/verify?token=Alice%40x.com", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Email Verified!"));
    assert!(html.contains("alice@x.com"));
    assert!(store.is_email_verified("alice@x.com").unwrap());

    // following the link twice is harmless
    assert_eq!(get(&app, "/verify?token=alice%40x.com", None).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn verify_link_without_valid_token_is_rejected() {
    let app = app(store_with(StoreSettings::default()), Behaviour::Fail);
    assert_eq!(get(&app, "/verify", None).await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(get(&app, "/verify?token=", None).await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(get(&app, "/verify?token=not-an-email", None).await.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn verify_link_escapes_what_it_echoes() {
    let app = app(store_with(StoreSettings::default()), Behaviour::Fail);
    let response = get(&app, "/verify?token=%3Cscript%3E%40x.com", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!body_text(response).await.contains("<script>"));
}

// ─── /login/google ───────────────────────────────────────────────

#[tokio::test]
async fn login_requires_known_pending_state() {
    let store = store_with(StoreSettings::default());
    let app = app(store.clone(), Behaviour::Fail);

    assert_eq!(get(&app, "/login/google", None).await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(get(&app, "/login/google?state_id=unknown", None).await.status(), StatusCode::BAD_REQUEST);

    let settled = store.create_login_request().unwrap();
    store.fail_login_request(&settled).unwrap();
    assert_eq!(
        get(&app, &format!("/login/google?state_id={settled}"), None).await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn login_rejects_expired_state() {
    let store = store_with(StoreSettings {
        login_state_ttl: chrono::Duration::zero(),
        ..StoreSettings::default()
    });
    let app = app(store.clone(), Behaviour::Fail);
    let state_id = store.create_login_request().unwrap();
    assert_eq!(
        get(&app, &format!("/login/google?state_id={state_id}"), None).await.status(),
        StatusCode::BAD_REQUEST
    );
}

// ─── /callback/google ────────────────────────────────────────────

#[tokio::test]
async fn full_handshake_provisions_provider_account() {
    let store = store_with(StoreSettings::default());
    let app = app(store.clone(), profile(Some("Nur@Example.com"), Some("Nur Aisyah")));
    let state_id = store.create_login_request().unwrap();

    let (cookie, nonce) = start_login(&app, &state_id).await;
    assert_eq!(store.check_login_status(&state_id).unwrap(), None);

    let response = get(&app, &format!("/callback/google?code=abc&state={nonce}"), Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[SET_COOKIE].to_str().unwrap().contains("Max-Age=0"));
    assert!(body_text(response).await.contains("Login Successful!"));

    assert_eq!(store.check_login_status(&state_id).unwrap().as_deref(), Some("nur@example.com"));
    let user = store.find_user("nur@example.com").unwrap().unwrap();
    assert_eq!(user.origin, AccountOrigin::Provider);
    assert_eq!(user.username, "Nur Aisyah");
}

#[tokio::test]
async fn handshake_for_existing_account_reuses_it() {
    let store = store_with(StoreSettings::default());
    store.create_user("alice", "alice@x.com", PASSWORD).unwrap();
    let app = app(store.clone(), profile(Some("alice@x.com"), Some("Alice")));
    let state_id = store.create_login_request().unwrap();

    let (cookie, nonce) = start_login(&app, &state_id).await;
    let response = get(&app, &format!("/callback/google?code=abc&state={nonce}"), Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let user = store.find_user("alice@x.com").unwrap().unwrap();
    assert_eq!(user.username, "alice");
    assert_eq!(user.origin, AccountOrigin::Local);
    assert_eq!(store.check_login_status(&state_id).unwrap().as_deref(), Some("alice@x.com"));
}

#[tokio::test]
async fn callback_with_wrong_state_changes_nothing() {
    let store = store_with(StoreSettings::default());
    let app = app(store.clone(), profile(Some("bob@x.com"), None));
    let state_id = store.create_login_request().unwrap();

    let (cookie, _nonce) = start_login(&app, &state_id).await;
    let response = get(&app, "/callback/google?code=abc&state=forged", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let row = store.login_request(&state_id).unwrap().unwrap();
    assert_eq!(row.status(), LoginStatus::Pending);
    assert!(store.find_user("bob@x.com").unwrap().is_none());
}

#[tokio::test]
async fn callback_without_cookie_changes_nothing() {
    let store = store_with(StoreSettings::default());
    let app = app(store.clone(), profile(Some("bob@x.com"), None));
    let state_id = store.create_login_request().unwrap();

    let (_cookie, nonce) = start_login(&app, &state_id).await;
    let response = get(&app, &format!("/callback/google?code=abc&state={nonce}"), None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.login_request(&state_id).unwrap().unwrap().status(), LoginStatus::Pending);
}

#[tokio::test]
async fn provider_failure_marks_request_failed() {
    let store = store_with(StoreSettings::default());
    let app = app(store.clone(), Behaviour::Fail);
    let state_id = store.create_login_request().unwrap();

    let (cookie, nonce) = start_login(&app, &state_id).await;
    let response = get(&app, &format!("/callback/google?code=abc&state={nonce}"), Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(body_text(response).await.contains("Login Failed"));

    assert_eq!(store.login_request(&state_id).unwrap().unwrap().status(), LoginStatus::Failed);
    assert_eq!(store.check_login_status(&state_id).unwrap(), None);
}

#[tokio::test]
async fn denied_consent_marks_request_failed() {
    let store = store_with(StoreSettings::default());
    let app = app(store.clone(), profile(Some("bob@x.com"), None));
    let state_id = store.create_login_request().unwrap();

    let (cookie, nonce) = start_login(&app, &state_id).await;
    let response = get(&app, &format!("/callback/google?error=access_denied&state={nonce}"), Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.login_request(&state_id).unwrap().unwrap().status(), LoginStatus::Failed);
}

#[tokio::test]
async fn missing_email_leaves_request_pending() {
    let store = store_with(StoreSettings::default());
    let app = app(store.clone(), profile(None, Some("Nameless")));
    let state_id = store.create_login_request().unwrap();

    let (cookie, nonce) = start_login(&app, &state_id).await;
    let response = get(&app, &format!("/callback/google?code=abc&state={nonce}"), Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.login_request(&state_id).unwrap().unwrap().status(), LoginStatus::Pending);
    assert_eq!(store.check_login_status(&state_id).unwrap(), None);
}
