use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::sync::Arc;

use kemaslah_auth::services::password_service;
use kemaslah_shared::pages::Page;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: Option<String>,
}

/// Follows the link from the verification email. The token is the email
/// address itself; all it unlocks is the local registration form.
pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VerifyQuery>,
) -> Response {
    let Some(email) = query
        .token
        .map(|t| password_service::normalize_email(&t))
        .filter(|e| password_service::is_valid_email(e))
    else {
        return (
            StatusCode::BAD_REQUEST,
            Page::failure("Invalid Request", "This verification link is incomplete or malformed."),
        )
            .into_response();
    };

    match state.store.mark_email_verified(&email) {
        Ok(()) => Page::success("Email Verified!")
            .emphasised("Your email ", &email, " has been successfully verified.")
            .paragraph("Please return to the Kemaslah app to complete your account registration.")
            .footer("You can safely close this browser window.")
            .into_response(),
        Err(e) => {
            tracing::error!(email = %email, error = %e, "could not record verification");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Page::failure("Verification Failed", "We encountered an error while verifying your email.")
                    .paragraph("Please try clicking the \"Verify\" button in the app again."),
            )
                .into_response()
        }
    }
}
