//! Landing-page phone verification.
//!
//! `Idle` → (code sent) → `CodeSent` → (code entered) → `Success` or
//! `Invalid`. From `Invalid`, [`VerificationFlow::reset`] returns to code
//! entry with the same pending code.

use tracing::{debug, info};

use charla_shared::PhoneNumber;

use crate::api::{ApiClient, SendCodeResponse};
use crate::error::{ClientError, Result};
use crate::session::SessionStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationState {
    Idle,
    CodeSent { phone: PhoneNumber },
    Success { phone: PhoneNumber },
    Invalid { phone: PhoneNumber },
}

#[derive(Debug, Clone)]
pub struct VerificationFlow {
    state: VerificationState,
    expected: Option<u32>,
}

impl Default for VerificationFlow {
    fn default() -> Self {
        Self {
            state: VerificationState::Idle,
            expected: None,
        }
    }
}

impl VerificationFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &VerificationState {
        &self.state
    }

    /// Record a successful `/api/sendWhatsApp` response.
    pub fn code_sent(&mut self, response: &SendCodeResponse) -> Result<()> {
        let phone = PhoneNumber::parse(&response.formatted_number)?;
        debug!(phone = %phone, "Awaiting verification code");
        self.expected = Some(response.verification_code);
        self.state = VerificationState::CodeSent { phone };
        Ok(())
    }

    /// Compare the entered code with the one that was sent.
    pub fn submit_code(&mut self, code: &str) -> Result<&VerificationState> {
        let phone = match &self.state {
            VerificationState::CodeSent { phone } | VerificationState::Invalid { phone } => {
                phone.clone()
            }
            VerificationState::Success { .. } => return Ok(&self.state),
            VerificationState::Idle => return Err(ClientError::NoPendingCode),
        };
        let expected = self.expected.ok_or(ClientError::NoPendingCode)?;

        let matches = code.trim().parse::<u32>().is_ok_and(|entered| entered == expected);
        self.state = if matches {
            self.expected = None;
            VerificationState::Success { phone }
        } else {
            VerificationState::Invalid { phone }
        };
        Ok(&self.state)
    }

    /// Back to code entry after an invalid attempt.
    pub fn reset(&mut self) {
        if let VerificationState::Invalid { phone } = &self.state {
            self.state = VerificationState::CodeSent {
                phone: phone.clone(),
            };
        }
    }

    /// Start over with a different number.
    pub fn restart(&mut self) {
        *self = Self::default();
    }

    /// Send a code to `phone_number` through the server.
    pub async fn start(&mut self, api: &ApiClient, phone_number: &str) -> Result<()> {
        let response = api.send_whatsapp(phone_number).await?;
        self.code_sent(&response)
    }

    /// Submit `code` and, on success, persist the session and confirm it
    /// with the server so the session cookie is issued.
    pub async fn confirm(
        &mut self,
        code: &str,
        api: &mut ApiClient,
        session: &SessionStore,
    ) -> Result<&VerificationState> {
        if let VerificationState::Success { phone } = self.submit_code(code)?.clone() {
            api.verify(&phone, code.trim()).await?;
            session.set(&phone).await?;
            info!(phone = %phone, "Phone verified");
        }
        Ok(&self.state)
    }
}
