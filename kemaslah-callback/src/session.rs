//! The short-lived browser cookie that carries an in-flight handshake from
//! `/login/google` to `/callback/google`.
//!
//! Value layout: `{state_id}.{nonce}.{issued_at}.{signature}` where the
//! signature is hex HMAC-SHA256 over the first three fields. The nonce doubles
//! as the provider's `state` parameter.

use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

pub const COOKIE_NAME: &str = "kemaslah_login";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSession {
    pub state_id: String,
    pub nonce: String,
    pub issued_at: i64,
}

impl LoginSession {
    /// Constant-time check of the `state` value the provider echoed back.
    pub fn nonce_matches(&self, returned_state: &str) -> bool {
        self.nonce.as_bytes().ct_eq(returned_state.as_bytes()).into()
    }
}

#[derive(Clone)]
pub struct SessionSigner {
    mac: HmacSha256,
    max_age_secs: i64,
}

impl SessionSigner {
    pub fn new(secret: &str, max_age_secs: i64) -> anyhow::Result<Self> {
        if secret.is_empty() {
            anyhow::bail!("session secret must not be empty");
        }
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| anyhow::anyhow!("invalid session secret: {e}"))?;
        Ok(Self { mac, max_age_secs })
    }

    pub fn issue(&self, state_id: &str, now: i64) -> LoginSession {
        let mut nonce = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce);
        LoginSession {
            state_id: state_id.to_string(),
            nonce: hex::encode(nonce),
            issued_at: now,
        }
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    pub fn encode(&self, session: &LoginSession) -> String {
        let payload = format!("{}.{}.{}", session.state_id, session.nonce, session.issued_at);
        let signature = self.sign(&payload);
        format!("{payload}.{signature}")
    }

    /// Parses and authenticates a cookie value. Tampered, malformed and
    /// expired values all yield `None`.
    pub fn decode(&self, value: &str, now: i64) -> Option<LoginSession> {
        let (payload, signature) = value.rsplit_once('.')?;
        let expected = self.sign(payload);
        if !bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
            return None;
        }

        let mut parts = payload.splitn(3, '.');
        let state_id = parts.next().filter(|s| !s.is_empty())?;
        let nonce = parts.next().filter(|s| !s.is_empty())?;
        let issued_at: i64 = parts.next()?.parse().ok()?;

        let age = now - issued_at;
        if !(0..=self.max_age_secs).contains(&age) {
            return None;
        }

        Some(LoginSession {
            state_id: state_id.to_string(),
            nonce: nonce.to_string(),
            issued_at,
        })
    }

    pub fn set_cookie(&self, session: &LoginSession) -> String {
        format!(
            "{COOKIE_NAME}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.encode(session),
            self.max_age_secs
        )
    }

    pub fn clear_cookie(&self) -> String {
        format!("{COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
    }
}

/// The raw value of our cookie from the request, if present.
pub fn read_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == COOKIE_NAME)
        .map(|(_, value)| value.to_string())
}
