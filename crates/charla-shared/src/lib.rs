//! # charla-shared
//!
//! Types and pure helpers shared by the Charla server, store and client:
//! document models, phone number and timestamp normalization, chat list
//! filtering, and the realtime change events pushed to subscribers.

pub mod constants;
pub mod error;
pub mod events;
pub mod filter;
pub mod models;
pub mod phone;
pub mod time;

pub use error::PhoneError;
pub use phone::{format_phone_number, PhoneNumber};
pub use time::{RawTimestamp, TimeFormatter};
