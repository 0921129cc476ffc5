//! # charla-server
//!
//! HTTP backend for Charla, a single-operator messaging desk.
//!
//! - **REST API** (axum) for chats, messages, contacts, categories, the
//!   admin profile and 24-hour statuses
//! - **Phone verification** through an SMS/WhatsApp gateway
//! - **Server-Sent Events** pushing full snapshots after every write
//! - **File storage** for attachments, status images and avatars
//! - **Per-IP rate limiting** and a session-cookie gate on the pages

pub mod api;
pub mod auth;
pub mod blob_store;
pub mod config;
pub mod error;
pub mod logging;
pub mod rate_limit;
pub mod realtime;
pub mod verification;

pub use api::{build_router, serve, AppState};
pub use config::ServerConfig;
pub use error::ServerError;
