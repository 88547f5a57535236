//! Sessions: the credential triple, its durable store, and the manager that
//! owns both.

mod manager;
mod store;

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub use manager::{Credential, SessionManager};
pub use store::{CredentialStore, DEFAULT_NAMESPACE, FileStore, KeyValueStore, MemoryStore};

use crate::auth::TokenResponse;

/// Seconds before the recorded expiry at which a token counts as expired.
pub const EXPIRY_SAFETY_MARGIN_SECS: i64 = 30;

pub(crate) fn expiry_safety_margin() -> TimeDelta {
    TimeDelta::seconds(EXPIRY_SAFETY_MARGIN_SECS)
}

/// An access token with its optional refresh token and expiry.
///
/// Without an expiry the session never expires locally; a 401 from the server
/// is then the only signal that it is no longer valid.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Session {
    access_token: String,
    refresh_token: Option<String>,
    #[zeroize(skip)]
    expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Creates a session with only an access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Sets the optional refresh token.
    #[must_use]
    pub fn with_refresh_token_opt(mut self, refresh_token: Option<String>) -> Self {
        self.refresh_token = refresh_token;
        self
    }

    /// Sets the expiry instant.
    #[must_use]
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Sets the optional expiry instant.
    #[must_use]
    pub fn with_expires_at_opt(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }

    /// Builds a session from a token endpoint response received at `now`.
    ///
    /// When the response carries no refresh token, `previous_refresh_token`
    /// is kept.
    pub fn from_token_response(
        response: &TokenResponse,
        previous_refresh_token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        let expires_at = response
            .expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(TimeDelta::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime));

        Self {
            access_token: response.access_token.clone(),
            refresh_token: response
                .refresh_token
                .clone()
                .or_else(|| previous_refresh_token.map(str::to_owned)),
            expires_at,
        }
    }

    /// Returns the access token.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the refresh token, if any.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Returns the expiry instant, if any.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns `true` if the access token is expired now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Returns `true` if the access token is expired at `now`, counting the
    /// safety margin. A session without expiry never expires.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now + expiry_safety_margin() >= expires_at,
            None => false,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
