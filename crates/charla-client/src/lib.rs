//! # charla-client
//!
//! Client library for the Charla server: a reducer-style [`store`],
//! local phone [`session`] persistence, the landing-page
//! [`verification`] flow, a typed HTTP [`api`] client, the
//! Server-Sent Events [`realtime`] subscription, and [`view`] models for
//! the chat list and thread.

pub mod api;
pub mod error;
pub mod realtime;
pub mod session;
pub mod store;
pub mod verification;
pub mod view;

pub use api::{ApiClient, Credentials};
pub use error::{ClientError, Result};
pub use session::SessionStore;
pub use store::{reduce, AppAction, AppState};
pub use verification::{VerificationFlow, VerificationState};
