//! Login credentials and token endpoint responses.

use std::fmt;

use serde::Deserialize;
use zeroize::Zeroizing;

/// Username and password supplied on the login form.
///
/// The password is zeroized when the value is dropped and never printed.
///
/// ```rust
/// use capgate::LoginCredentials;
///
/// let credentials = LoginCredentials::new("alice", "pw");
/// assert_eq!(credentials.username(), "alice");
/// assert!(!format!("{:?}", credentials).contains("pw\""));
/// ```
#[derive(Clone)]
pub struct LoginCredentials {
    username: String,
    password: Zeroizing<String>,
}

impl LoginCredentials {
    /// Creates credentials for the password grant.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Zeroizing::new(password.into()),
        }
    }

    /// Returns the username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the password.
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Successful response of the OAuth token endpoint.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    /// The new access token.
    pub access_token: String,

    /// A refresh token, if the server issued one.
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Access token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,

    /// Token type, normally `Bearer`.
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

impl TokenResponse {
    /// Creates a bearer token response without refresh token or expiry.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_in: None,
            token_type: default_token_type(),
        }
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Sets the lifetime in seconds.
    #[must_use]
    pub fn with_expires_in(mut self, seconds: u64) -> Self {
        self.expires_in = Some(seconds);
        self
    }
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}
