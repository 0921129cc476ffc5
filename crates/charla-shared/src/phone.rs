//! Phone number normalization.
//!
//! A chat is keyed by the canonical form of the customer's phone number:
//! digits only, always carrying the `549` country prefix.

use serde::{Deserialize, Serialize};

use crate::constants::{COUNTRY_PREFIX, MIN_PHONE_DIGITS};
use crate::error::PhoneError;

/// Strip everything but digits and prepend the country prefix unless it
/// is already there.
///
/// Idempotent: formatting an already formatted number returns it as-is.
pub fn format_phone_number(input: &str) -> String {
    let cleaned: String = input.chars().filter(char::is_ascii_digit).collect();
    if cleaned.starts_with(COUNTRY_PREFIX) {
        cleaned
    } else {
        format!("{COUNTRY_PREFIX}{cleaned}")
    }
}

/// A validated, canonical phone number (digits only, prefixed).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(input: &str) -> Result<Self, PhoneError> {
        if input.trim().is_empty() {
            return Err(PhoneError::Missing);
        }
        let formatted = format_phone_number(input);
        if formatted.len() < MIN_PHONE_DIGITS {
            return Err(PhoneError::TooShort {
                digits: formatted.len(),
            });
        }
        Ok(Self(formatted))
    }

    /// Canonical digits, e.g. `5491123456789`. Used as the chat id.
    pub fn digits(&self) -> &str {
        &self.0
    }

    /// `+5491123456789`
    pub fn e164(&self) -> String {
        format!("+{}", self.0)
    }

    /// Twilio WhatsApp channel address, `whatsapp:+5491123456789`.
    pub fn whatsapp_address(&self) -> String {
        format!("whatsapp:+{}", self.0)
    }
}

impl std::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
