//! # charla-store
//!
//! Document storage for Charla, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for every document
//! kind: chats, messages, categories, the admin profile, admin statuses
//! and user profiles. Multi-row writes (sending a message, marking a chat
//! read, deleting a category) run inside a single transaction.

pub mod admin_profile;
pub mod categories;
pub mod chats;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod statuses;
pub mod users;

mod convert;
mod error;

pub use charla_shared::models::*;
pub use database::Database;
pub use error::{Result, StoreError};
