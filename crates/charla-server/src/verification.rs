//! WhatsApp verification codes.
//!
//! A 6-digit code is generated per request, sent through the configured
//! [`SmsGateway`] and remembered with an expiry so `/api/verify` can check
//! it. Sends are rate limited per phone number.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use charla_shared::constants::{
    VERIFICATION_CODE_MAX, VERIFICATION_CODE_MIN, VERIFICATION_TEMPLATE,
};
use charla_shared::PhoneNumber;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::rate_limit::{Quota, RateLimiter};

/// Wrong guesses allowed before a pending code is discarded.
const MAX_ATTEMPTS: u32 = 5;

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Where verification messages go.
#[derive(Clone)]
pub enum SmsGateway {
    /// Twilio Messages API over the WhatsApp channel.
    Twilio {
        client: reqwest::Client,
        api_base: String,
        account_sid: String,
        auth_token: String,
        from: String,
    },
    /// Log the message instead of sending it.
    DryRun,
    /// No credentials configured; every send fails with a config error.
    Unconfigured,
}

#[derive(Debug, Deserialize)]
struct TwilioMessage {
    sid: String,
    #[serde(default)]
    status: Option<String>,
}

impl SmsGateway {
    pub fn from_config(config: &ServerConfig) -> Self {
        if config.sms_dry_run {
            return SmsGateway::DryRun;
        }
        match (&config.twilio_account_sid, &config.twilio_auth_token) {
            (Some(sid), Some(token)) => SmsGateway::Twilio {
                client: reqwest::Client::new(),
                api_base: config.twilio_api_base.clone(),
                account_sid: sid.clone(),
                auth_token: token.clone(),
                from: config.twilio_from.clone(),
            },
            _ => SmsGateway::Unconfigured,
        }
    }

    pub fn is_configured(&self) -> bool {
        !matches!(self, SmsGateway::Unconfigured)
    }

    /// Send `body` to `to` (`whatsapp:+…`). Returns the provider message sid.
    pub async fn send(&self, to: &str, body: &str) -> Result<String, ServerError> {
        match self {
            SmsGateway::Twilio {
                client,
                api_base,
                account_sid,
                auth_token,
                from,
            } => {
                let url = format!("{api_base}/2010-04-01/Accounts/{account_sid}/Messages.json");
                let resp = client
                    .post(&url)
                    .basic_auth(account_sid, Some(auth_token))
                    .form(&[("To", to), ("From", from.as_str()), ("Body", body)])
                    .send()
                    .await
                    .map_err(|e| ServerError::GatewaySend(e.to_string()))?;

                let status = resp.status();
                if !status.is_success() {
                    let detail = resp.text().await.unwrap_or_default();
                    return Err(ServerError::GatewaySend(format!("HTTP {status}: {detail}")));
                }

                let message: TwilioMessage = resp
                    .json()
                    .await
                    .map_err(|e| ServerError::GatewaySend(e.to_string()))?;
                info!(
                    sid = %message.sid,
                    status = message.status.as_deref().unwrap_or("unknown"),
                    to,
                    "Twilio message sent successfully"
                );
                Ok(message.sid)
            }
            SmsGateway::DryRun => {
                let sid = format!("DRY{}", uuid::Uuid::new_v4().simple());
                info!(%sid, to, body, "Dry run, verification message not sent");
                Ok(sid)
            }
            SmsGateway::Unconfigured => Err(ServerError::GatewayConfig),
        }
    }
}

// ---------------------------------------------------------------------------
// Pending codes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct PendingCode {
    code: u32,
    expires_at: DateTime<Utc>,
    attempts: u32,
}

#[derive(Clone, Default)]
pub struct PendingCodes {
    /// phone digits -> last code sent
    codes: Arc<RwLock<HashMap<String, PendingCode>>>,
}

impl PendingCodes {
    pub async fn insert(&self, phone: &PhoneNumber, code: u32, expires_at: DateTime<Utc>) {
        self.codes.write().await.insert(
            phone.digits().to_string(),
            PendingCode {
                code,
                expires_at,
                attempts: 0,
            },
        );
    }

    /// Check `code` for `phone`. A match consumes the pending code.
    pub async fn check(&self, phone: &PhoneNumber, code: &str, now: DateTime<Utc>) -> bool {
        let mut codes = self.codes.write().await;
        let Some(pending) = codes.get_mut(phone.digits()) else {
            return false;
        };
        if now >= pending.expires_at {
            codes.remove(phone.digits());
            return false;
        }

        let matches = code.trim().parse::<u32>().ok() == Some(pending.code);
        if matches {
            codes.remove(phone.digits());
        } else {
            pending.attempts += 1;
            if pending.attempts >= MAX_ATTEMPTS {
                warn!(phone = %phone, "Too many wrong codes, discarding");
                codes.remove(phone.digits());
            }
        }
        matches
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) {
        self.codes.write().await.retain(|_, p| now < p.expires_at);
    }
}

// ---------------------------------------------------------------------------
// Verifier
// ---------------------------------------------------------------------------

/// Result of a successful send.
#[derive(Debug, Clone)]
pub struct SentCode {
    pub sid: String,
    pub code: u32,
}

#[derive(Clone)]
pub struct Verifier {
    gateway: SmsGateway,
    pending: PendingCodes,
    limiter: RateLimiter<String>,
    ttl: Duration,
}

impl Verifier {
    pub fn new(gateway: SmsGateway, ttl_secs: u64) -> Self {
        Self {
            gateway,
            pending: PendingCodes::default(),
            limiter: RateLimiter::new(Quota::VERIFICATION),
            // Capped at a day.
            ttl: Duration::seconds(ttl_secs.min(86_400) as i64),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(SmsGateway::from_config(config), config.verification_ttl_secs)
    }

    pub fn pending(&self) -> &PendingCodes {
        &self.pending
    }

    pub fn limiter(&self) -> &RateLimiter<String> {
        &self.limiter
    }

    /// Generate, send and remember a code for `phone`.
    pub async fn send_code(
        &self,
        phone: &PhoneNumber,
        now: DateTime<Utc>,
    ) -> Result<SentCode, ServerError> {
        if !self.gateway.is_configured() {
            return Err(ServerError::GatewayConfig);
        }
        if let Err(wait) = self.limiter.check(phone.digits().to_string()).await {
            warn!(phone = %phone, wait_secs = wait.as_secs(), "Verification rate limit exceeded");
            return Err(ServerError::RateLimited {
                retry_after: wait.as_secs().max(1),
            });
        }

        let code = generate_code();
        let body = VERIFICATION_TEMPLATE.replace("{code}", &code.to_string());
        let sid = self.gateway.send(&phone.whatsapp_address(), &body).await?;

        self.pending.insert(phone, code, now + self.ttl).await;
        debug!(phone = %phone, %sid, "Verification code stored");
        Ok(SentCode { sid, code })
    }

    pub async fn verify(&self, phone: &PhoneNumber, code: &str, now: DateTime<Utc>) -> bool {
        self.pending.check(phone, code, now).await
    }
}

pub fn generate_code() -> u32 {
    rand::thread_rng().gen_range(VERIFICATION_CODE_MIN..=VERIFICATION_CODE_MAX)
}
