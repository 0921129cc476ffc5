//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use charla_shared::constants::{DEFAULT_HTTP_PORT, DEFAULT_TWILIO_FROM};

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./charla.db`
    pub database_path: PathBuf,

    /// Directory uploaded files are stored under.
    /// Env: `BLOB_STORAGE_PATH`
    /// Default: `./files`
    pub blob_storage_path: PathBuf,

    /// Maximum upload size in bytes.
    /// Env: `MAX_BLOB_SIZE`
    /// Default: 25 MiB
    pub max_blob_size: usize,

    /// Prefix for file URLs handed back to clients. Empty means
    /// root-relative (`/api/files/...`).
    /// Env: `PUBLIC_BASE_URL`
    pub public_base_url: String,

    /// Admin dashboard credentials. The admin API is disabled unless both
    /// are set.
    /// Env: `ADMIN_EMAIL`, `ADMIN_PASSWORD`
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,

    // -- WhatsApp verification (Twilio) --

    /// Env: `TWILIO_ACCOUNT_SID`
    pub twilio_account_sid: Option<String>,

    /// Env: `TWILIO_AUTH_TOKEN`
    pub twilio_auth_token: Option<String>,

    /// Sender address.
    /// Env: `TWILIO_WHATSAPP_NUMBER`
    /// Default: the Twilio sandbox number.
    pub twilio_from: String,

    /// Env: `TWILIO_API_BASE`
    /// Default: `https://api.twilio.com`
    pub twilio_api_base: String,

    /// Log verification messages instead of sending them.
    /// Env: `SMS_DRY_RUN` (true/false)
    /// Default: `false`
    pub sms_dry_run: bool,

    /// Offset used when reading bare `HH:MM` timestamps.
    /// Env: `UTC_OFFSET_MINUTES`
    /// Default: `0`
    pub utc_offset_minutes: i32,

    /// How long a verification code stays valid.
    /// Env: `VERIFICATION_TTL_SECS`
    /// Default: `600`
    pub verification_ttl_secs: u64,

    /// Emit JSON log lines.
    /// Env: `LOG_JSON` (true/false)
    /// Default: `false`
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./charla.db"),
            blob_storage_path: PathBuf::from("./files"),
            max_blob_size: 25 * 1024 * 1024, // 25 MiB
            public_base_url: String::new(),
            admin_email: None,
            admin_password: None,
            twilio_account_sid: None,
            twilio_auth_token: None,
            twilio_from: DEFAULT_TWILIO_FROM.to_string(),
            twilio_api_base: "https://api.twilio.com".to_string(),
            sms_dry_run: false,
            utc_offset_minutes: 0,
            verification_ttl_secs: 600,
            log_json: false,
        }
    }
}

// Secrets are left out of the debug output that main logs at startup.
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("blob_storage_path", &self.blob_storage_path)
            .field("max_blob_size", &self.max_blob_size)
            .field("public_base_url", &self.public_base_url)
            .field("admin_email", &self.admin_email)
            .field("admin_enabled", &self.admin_enabled())
            .field("twilio_configured", &self.twilio_configured())
            .field("twilio_from", &self.twilio_from)
            .field("sms_dry_run", &self.sms_dry_run)
            .field("utc_offset_minutes", &self.utc_offset_minutes)
            .field("verification_ttl_secs", &self.verification_ttl_secs)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = get("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = get("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(path) = get("BLOB_STORAGE_PATH") {
            config.blob_storage_path = PathBuf::from(path);
        }

        if let Some(val) = get("MAX_BLOB_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_blob_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_BLOB_SIZE, using default"),
            }
        }

        if let Some(url) = get("PUBLIC_BASE_URL") {
            config.public_base_url = url.trim_end_matches('/').to_string();
        }

        config.admin_email = non_empty(get("ADMIN_EMAIL"));
        config.admin_password = non_empty(get("ADMIN_PASSWORD"));

        // -- Verification --

        config.twilio_account_sid = non_empty(get("TWILIO_ACCOUNT_SID"));
        config.twilio_auth_token = non_empty(get("TWILIO_AUTH_TOKEN"));

        if let Some(from) = non_empty(get("TWILIO_WHATSAPP_NUMBER")) {
            config.twilio_from = from;
        }

        if let Some(base) = non_empty(get("TWILIO_API_BASE")) {
            config.twilio_api_base = base.trim_end_matches('/').to_string();
        }

        if let Some(val) = get("SMS_DRY_RUN") {
            config.sms_dry_run = is_truthy(&val);
        }

        if let Some(val) = get("UTC_OFFSET_MINUTES") {
            match val.parse::<i32>() {
                Ok(n) if n.abs() < 24 * 60 => config.utc_offset_minutes = n,
                _ => tracing::warn!(value = %val, "Invalid UTC_OFFSET_MINUTES, using UTC"),
            }
        }

        if let Some(val) = get("VERIFICATION_TTL_SECS") {
            if let Ok(n) = val.parse::<u64>() {
                config.verification_ttl_secs = n;
            }
        }

        if let Some(val) = get("LOG_JSON") {
            config.log_json = is_truthy(&val);
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    pub fn admin_enabled(&self) -> bool {
        self.admin_email.is_some() && self.admin_password.is_some()
    }

    pub fn twilio_configured(&self) -> bool {
        self.twilio_account_sid.is_some() && self.twilio_auth_token.is_some()
    }

    /// Public URL of a stored file.
    pub fn file_url(&self, folder: &str, name: &str) -> String {
        format!("{}/api/files/{folder}/{name}", self.public_base_url)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn is_truthy(val: &str) -> bool {
    val != "false" && val != "0" && !val.is_empty()
}
