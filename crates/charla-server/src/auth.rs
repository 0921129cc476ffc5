//! Admin login, the phone session cookie, and the page gate.
//!
//! The admin signs in with the configured email/password and receives a
//! bearer token kept in memory. End users are identified by the
//! `whatsapp_phone` cookie set after verification.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;
use tracing::{debug, info};

use charla_shared::constants::{SESSION_KEY, SESSION_MAX_AGE_SECS};
use charla_shared::PhoneNumber;

use crate::config::ServerConfig;
use crate::error::ServerError;

/// Admin tokens expire after this many hours.
const ADMIN_TOKEN_TTL_HOURS: i64 = 12;

// ---------------------------------------------------------------------------
// Admin sessions
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct AdminSessions {
    /// token (hex) -> expiry
    tokens: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl AdminSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check credentials against the configuration and issue a token.
    pub async fn login(
        &self,
        config: &ServerConfig,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<String, ServerError> {
        let (Some(expected_email), Some(expected_password)) =
            (&config.admin_email, &config.admin_password)
        else {
            return Err(ServerError::Forbidden(
                "Admin login is disabled (no ADMIN_EMAIL/ADMIN_PASSWORD configured)".into(),
            ));
        };

        // Evaluate both comparisons so timing does not reveal which failed.
        let email_ok = constant_time_eq(email.trim(), expected_email);
        let password_ok = constant_time_eq(password, expected_password);
        if !(email_ok & password_ok) {
            info!("Rejected admin login");
            return Err(ServerError::Unauthorized);
        }

        let mut raw = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut raw);
        let token = hex::encode(raw);

        self.tokens
            .write()
            .await
            .insert(token.clone(), now + Duration::hours(ADMIN_TOKEN_TTL_HOURS));
        info!("Admin signed in");
        Ok(token)
    }

    pub async fn logout(&self, token: &str) -> bool {
        self.tokens.write().await.remove(token).is_some()
    }

    pub async fn is_valid(&self, token: &str, now: DateTime<Utc>) -> bool {
        self.tokens
            .read()
            .await
            .get(token)
            .is_some_and(|expires| now < *expires)
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, expires| now < *expires);
        let removed = before - tokens.len();
        if removed > 0 {
            debug!(removed, "Purged expired admin tokens");
        }
    }
}

fn constant_time_eq(given: &str, expected: &str) -> bool {
    let a = given.as_bytes();
    let b = expected.as_bytes();
    a.len() == b.len() && a.ct_eq(b).unwrap_u8() == 1
}

/// The `Authorization: Bearer …` token, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    auth.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty())
}

// ---------------------------------------------------------------------------
// Callers
// ---------------------------------------------------------------------------

/// Who is making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Admin,
    User(PhoneNumber),
    Anonymous,
}

impl Caller {
    pub async fn identify(headers: &HeaderMap, sessions: &AdminSessions, now: DateTime<Utc>) -> Self {
        if let Some(token) = bearer_token(headers) {
            if sessions.is_valid(token, now).await {
                return Caller::Admin;
            }
        }
        match session_phone(headers) {
            Some(phone) => Caller::User(phone),
            None => Caller::Anonymous,
        }
    }

    pub fn require_admin(&self) -> Result<(), ServerError> {
        match self {
            Caller::Admin => Ok(()),
            Caller::User(_) => Err(ServerError::Forbidden("Admin access required".into())),
            Caller::Anonymous => Err(ServerError::Unauthorized),
        }
    }

    /// The admin may touch every chat; a user only their own.
    pub fn require_chat(&self, chat_id: &str) -> Result<(), ServerError> {
        match self {
            Caller::Admin => Ok(()),
            Caller::User(phone) if phone.digits() == chat_id => Ok(()),
            Caller::User(_) => Err(ServerError::Forbidden("Not your chat".into())),
            Caller::Anonymous => Err(ServerError::Unauthorized),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Caller::Admin)
    }
}

// ---------------------------------------------------------------------------
// Session cookie
// ---------------------------------------------------------------------------

/// Raw value of cookie `name` from the `Cookie` header(s).
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

/// The phone stored in the session cookie, if it parses.
pub fn session_phone(headers: &HeaderMap) -> Option<PhoneNumber> {
    read_cookie(headers, SESSION_KEY).and_then(|raw| PhoneNumber::parse(raw).ok())
}

pub fn session_cookie(phone: &PhoneNumber) -> HeaderValue {
    let cookie = format!(
        "{SESSION_KEY}={}; Path=/; Max-Age={SESSION_MAX_AGE_SECS}; SameSite=Lax",
        phone.digits()
    );
    // Digits plus ASCII attributes always form a valid header value.
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("whatsapp_phone=; Path=/; Max-Age=0; SameSite=Lax")
}

// ---------------------------------------------------------------------------
// Page gate
// ---------------------------------------------------------------------------

/// `/chat*` without a session goes to the landing page; the landing page
/// with a session goes straight to the chat.
pub async fn session_gate(req: Request, next: Next) -> Response {
    let path = req.uri().path();
    let phone = read_cookie(req.headers(), SESSION_KEY).map(str::to_string);

    if path.starts_with("/chat") && phone.is_none() {
        debug!(path, "No session, redirecting to landing");
        return Redirect::temporary("/").into_response();
    }

    if path == "/" {
        if let Some(phone) = phone {
            debug!(path, "Session found, redirecting to chat");
            return Redirect::temporary(&format!("/chat?phone={phone}")).into_response();
        }
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn admin_config() -> ServerConfig {
        ServerConfig {
            admin_email: Some("admin@charla.test".into()),
            admin_password: Some("correct horse".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn login_issues_expiring_token() {
        let sessions = AdminSessions::new();
        let token = sessions
            .login(&admin_config(), " admin@charla.test ", "correct horse", now())
            .await
            .unwrap();
        assert_eq!(token.len(), 64);
        assert!(sessions.is_valid(&token, now()).await);
        assert!(
            !sessions
                .is_valid(&token, now() + Duration::hours(ADMIN_TOKEN_TTL_HOURS))
                .await
        );

        assert!(sessions.logout(&token).await);
        assert!(!sessions.is_valid(&token, now()).await);
    }

    #[tokio::test]
    async fn login_rejects_bad_password_and_disabled_admin() {
        let sessions = AdminSessions::new();
        assert!(matches!(
            sessions
                .login(&admin_config(), "admin@charla.test", "wrong", now())
                .await,
            Err(ServerError::Unauthorized)
        ));
        assert!(matches!(
            sessions
                .login(&ServerConfig::default(), "a", "b", now())
                .await,
            Err(ServerError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn purge_drops_expired_tokens() {
        let sessions = AdminSessions::new();
        let token = sessions
            .login(&admin_config(), "admin@charla.test", "correct horse", now())
            .await
            .unwrap();
        sessions.purge_expired(now() + Duration::hours(13)).await;
        assert!(sessions.tokens.read().await.get(&token).is_none());
    }

    #[test]
    fn reads_session_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; whatsapp_phone=5491123456789; lang=es"),
        );
        assert_eq!(read_cookie(&headers, "whatsapp_phone"), Some("5491123456789"));
        assert_eq!(
            session_phone(&headers).map(|p| p.digits().to_string()),
            Some("5491123456789".to_string())
        );
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn caller_chat_access() {
        let phone = PhoneNumber::parse("5491123456789").unwrap();
        let user = Caller::User(phone);
        assert!(user.require_chat("5491123456789").is_ok());
        assert!(matches!(
            user.require_chat("5491100000000"),
            Err(ServerError::Forbidden(_))
        ));
        assert!(matches!(user.require_admin(), Err(ServerError::Forbidden(_))));
        assert!(Caller::Admin.require_chat("anything").is_ok());
        assert!(matches!(
            Caller::Anonymous.require_chat("5491123456789"),
            Err(ServerError::Unauthorized)
        ));
    }

    #[test]
    fn cookie_values() {
        let phone = PhoneNumber::parse("11 2345 6789").unwrap();
        assert_eq!(
            session_cookie(&phone).to_str().unwrap(),
            "whatsapp_phone=5491123456789; Path=/; Max-Age=31536000; SameSite=Lax"
        );
        assert!(clear_session_cookie().to_str().unwrap().contains("Max-Age=0"));
    }
}
