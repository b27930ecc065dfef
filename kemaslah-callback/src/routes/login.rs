use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use kemaslah_auth::models::LoginStatus;
use kemaslah_shared::errors::{AppError, AppResult, ErrorCode};
use kemaslah_shared::pages::Page;

use crate::session::{self, LoginSession};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub state_id: Option<String>,
}

/// Entry point opened by the desktop app. Binds the handshake to this
/// browser with a signed cookie, then hands off to the provider.
pub async fn google_login(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LoginQuery>,
) -> AppResult<Response> {
    let state_id = query
        .state_id
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("Missing state_id."))?;

    let ttl = state.store.settings().login_state_ttl;
    let usable = state
        .store
        .login_request(&state_id)?
        .map(|row| row.status() == LoginStatus::Pending && !row.is_expired(Utc::now().naive_utc(), ttl))
        .unwrap_or(false);
    if !usable {
        tracing::warn!(state_id = %state_id, "login link is unknown, settled or expired");
        return Err(AppError::new(
            ErrorCode::LoginStateInvalid,
            "This sign-in link is no longer valid. Start again from the Kemaslah app.",
        ));
    }

    let login = state.sessions.issue(&state_id, Utc::now().timestamp());
    let authorize_url = state.provider.authorization_url(&login.nonce)?;

    tracing::info!(state_id = %state_id, "redirecting to identity provider");
    Ok((
        AppendHeaders([(SET_COOKIE, state.sessions.set_cookie(&login))]),
        Redirect::to(&authorize_url),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Where the provider sends the browser back.
pub async fn google_callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let clear = AppendHeaders([(SET_COOKIE, state.sessions.clear_cookie())]);

    let Some(login) = session::read_cookie(&headers)
        .and_then(|value| state.sessions.decode(&value, Utc::now().timestamp()))
    else {
        tracing::warn!("provider callback without a valid login cookie");
        return (StatusCode::BAD_REQUEST, clear, session_lost_page()).into_response();
    };

    if !query.state.as_deref().is_some_and(|s| login.nonce_matches(s)) {
        tracing::warn!(state_id = %login.state_id, "provider state does not match login cookie");
        return (StatusCode::BAD_REQUEST, clear, session_lost_page()).into_response();
    }

    match complete(&state, &login, query).await {
        Ok(page) => (clear, page).into_response(),
        Err((status, page)) => (status, clear, page).into_response(),
    }
}

async fn complete(state: &AppState, login: &LoginSession, query: CallbackQuery) -> Result<Page, (StatusCode, Page)> {
    let state_id = login.state_id.as_str();

    let code = match (query.code, query.error) {
        (Some(code), None) if !code.is_empty() => code,
        (_, error) => {
            tracing::info!(state_id = %state_id, error = ?error, "provider did not return a code");
            mark_failed(state, state_id);
            return Err((StatusCode::BAD_REQUEST, login_failed_page()));
        }
    };

    let profile = match state.provider.exchange_code(&code).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::error!(state_id = %state_id, error = %e, "provider exchange failed");
            mark_failed(state, state_id);
            return Err((StatusCode::BAD_GATEWAY, login_failed_page()));
        }
    };

    // Terminal for this browser tab, but the row stays PENDING.
    let Some(email) = profile.verified_email() else {
        tracing::warn!(state_id = %state_id, "provider returned no verified email");
        return Err((
            StatusCode::BAD_REQUEST,
            Page::failure("Login Failed", "Your Google account did not share a verified email address."),
        ));
    };

    let resolved = state.store.find_user(email).and_then(|existing| match existing {
        Some(user) => Ok(user),
        None => state.store.create_provider_user(profile.name.as_deref(), email),
    });
    let user = match resolved {
        Ok(user) => user,
        Err(e) => {
            tracing::error!(state_id = %state_id, error = %e, "could not resolve account");
            mark_failed(state, state_id);
            return Err((StatusCode::INTERNAL_SERVER_ERROR, login_failed_page()));
        }
    };

    if let Err(e) = state.store.complete_login_request(state_id, &user.email) {
        tracing::error!(state_id = %state_id, error = %e, "could not complete login request");
        return Err((StatusCode::INTERNAL_SERVER_ERROR, login_failed_page()));
    }

    Ok(Page::success("Login Successful!")
        .emphasised("You are signed in as ", &user.email, ".")
        .paragraph("Please return to the Kemaslah app to continue.")
        .footer("You can safely close this browser window."))
}

fn mark_failed(state: &AppState, state_id: &str) {
    if let Err(e) = state.store.fail_login_request(state_id) {
        tracing::error!(state_id = %state_id, error = %e, "could not mark login request failed");
    }
}

fn login_failed_page() -> Page {
    Page::failure("Login Failed", "We could not complete your Google sign-in.")
        .paragraph("Please try again from the Kemaslah app.")
}

fn session_lost_page() -> Page {
    Page::failure("Login Failed", "This sign-in session is missing or has expired.")
        .paragraph("Please start again from the Kemaslah app.")
}
