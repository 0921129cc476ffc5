//! HTTP API: router, shared state and the handlers behind each route.

mod catalog;
mod chats;
mod events;
mod files;
mod pages;
mod session;

use std::sync::{Arc, Mutex};

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, Method},
    middleware,
    routing::{get, patch, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use charla_shared::constants::APP_NAME;
use charla_shared::events::ChangeEvent;
use charla_shared::TimeFormatter;
use charla_store::Database;

use crate::auth::{session_gate, AdminSessions, Caller};
use crate::blob_store::BlobStore;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::realtime::ChangeFeed;
use crate::verification::Verifier;

/// Extra room on top of the file size cap for multipart framing.
const BODY_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub blob_store: Arc<BlobStore>,
    pub feed: ChangeFeed,
    pub rate_limiter: RateLimiter,
    pub verifier: Verifier,
    pub admin_sessions: AdminSessions,
    pub formatter: TimeFormatter,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Open the database and file store named in `config`.
    pub async fn open(config: ServerConfig) -> anyhow::Result<Self> {
        let db = Database::open_at(&config.database_path)?;
        let blob_store =
            BlobStore::new(config.blob_storage_path.clone(), config.max_blob_size).await?;
        Ok(Self::new(config, db, blob_store))
    }

    pub fn new(config: ServerConfig, db: Database, blob_store: BlobStore) -> Self {
        let formatter = TimeFormatter::from_offset_minutes(config.utc_offset_minutes)
            .unwrap_or_else(TimeFormatter::utc);
        Self {
            db: Arc::new(Mutex::new(db)),
            blob_store: Arc::new(blob_store),
            feed: ChangeFeed::new(),
            rate_limiter: RateLimiter::default(),
            verifier: Verifier::from_config(&config),
            admin_sessions: AdminSessions::new(),
            formatter,
            config: Arc::new(config),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Run `f` against the locked database.
    pub(crate) fn with_db<T>(
        &self,
        f: impl FnOnce(&mut Database) -> charla_store::Result<T>,
    ) -> Result<T, ServerError> {
        let mut guard = self
            .db
            .lock()
            .map_err(|e| ServerError::Internal(format!("Lock poisoned: {e}")))?;
        Ok(f(&mut *guard)?)
    }

    pub(crate) async fn caller(&self, headers: &HeaderMap) -> Caller {
        Caller::identify(headers, &self.admin_sessions, self.now()).await
    }

    // -- Snapshot publishing --

    pub(crate) fn publish_chats(&self) -> Result<(), ServerError> {
        let chats = self.with_db(|db| db.fetch_chats())?;
        self.feed.publish(ChangeEvent::Chats(chats));
        Ok(())
    }

    pub(crate) fn publish_messages(&self, chat_id: &str) -> Result<(), ServerError> {
        let messages = self.with_db(|db| db.fetch_messages(chat_id))?;
        self.feed.publish(ChangeEvent::Messages {
            chat_id: chat_id.to_string(),
            messages,
        });
        Ok(())
    }

    pub(crate) fn publish_categories(&self) -> Result<(), ServerError> {
        let categories = self.with_db(|db| db.fetch_categories())?;
        self.feed.publish(ChangeEvent::Categories(categories));
        Ok(())
    }

    pub(crate) fn publish_statuses(&self) -> Result<(), ServerError> {
        let now = self.now();
        let statuses = self.with_db(|db| db.fetch_active_statuses(now))?;
        self.feed.publish(ChangeEvent::Statuses(statuses));
        Ok(())
    }

    pub(crate) fn publish_admin_profile(&self) -> Result<(), ServerError> {
        let profile = self.with_db(|db| db.fetch_admin_profile())?;
        self.feed.publish(ChangeEvent::AdminProfile(profile));
        Ok(())
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let body_limit = state.config.max_blob_size + BODY_OVERHEAD;

    Router::new()
        // Pages behind the session gate
        .route("/", get(pages::landing))
        .route("/chat", get(pages::chat))
        .route("/chat/{*rest}", get(pages::chat))
        // Service
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        // Sessions and verification
        .route("/admin/login", post(session::admin_login))
        .route("/admin/logout", post(session::admin_logout))
        .route("/api/sendWhatsApp", post(session::send_whatsapp))
        .route("/api/verify", post(session::verify_code))
        .route(
            "/api/session",
            post(session::start_session)
                .get(session::current_session)
                .delete(session::end_session),
        )
        // Chats and messages
        .route("/api/chats", get(chats::list_chats))
        .route("/api/contacts/unknown", get(chats::unknown_contacts))
        .route("/api/chats/{id}", get(chats::get_chat).put(chats::upsert_chat))
        .route("/api/chats/{id}/contact", put(chats::edit_contact))
        .route("/api/chats/{id}/block", post(chats::block_contact))
        .route("/api/chats/{id}/unblock", post(chats::unblock_contact))
        .route("/api/chats/{id}/read", post(chats::mark_chat_read))
        .route("/api/chats/{id}/read-up-to", post(chats::mark_read_up_to))
        .route(
            "/api/chats/{id}/messages",
            get(chats::list_messages).post(chats::send_message),
        )
        .route(
            "/api/chats/{id}/messages/{mid}/delivered",
            post(chats::mark_message_delivered),
        )
        .route(
            "/api/chats/{id}/messages/{mid}/read",
            post(chats::mark_message_read),
        )
        // Categories, admin profile, statuses, users
        .route(
            "/api/categories",
            get(catalog::list_categories).post(catalog::add_category),
        )
        .route(
            "/api/categories/{id}",
            patch(catalog::update_category).delete(catalog::delete_category),
        )
        .route(
            "/api/admin/profile",
            get(catalog::get_admin_profile).put(catalog::update_admin_profile),
        )
        .route(
            "/api/statuses",
            get(catalog::list_statuses).post(catalog::add_status),
        )
        .route(
            "/api/statuses/{id}",
            patch(catalog::update_status).delete(catalog::delete_status),
        )
        .route(
            "/api/users/{phone}",
            get(catalog::get_user_profile).put(catalog::update_user_profile),
        )
        // Files
        .route("/api/files", post(files::upload))
        .route(
            "/api/files/{folder}/{name}",
            get(files::download).delete(files::delete),
        )
        // Realtime
        .route("/api/events", get(events::subscribe))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(session_gate))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfoResponse {
    name: &'static str,
    version: &'static str,
    admin_enabled: bool,
    verification_enabled: bool,
    utc_offset_minutes: i32,
    max_file_size: usize,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: APP_NAME,
        version: env!("CARGO_PKG_VERSION"),
        admin_enabled: state.config.admin_enabled(),
        verification_enabled: state.config.sms_dry_run || state.config.twilio_configured(),
        utc_offset_minutes: state.config.utc_offset_minutes,
        max_file_size: state.config.max_blob_size,
    })
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
