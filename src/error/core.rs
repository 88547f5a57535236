//! Main error type for the gateway.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;

use super::ErrorKind;

/// The primary error type for gateway operations.
///
/// API failures keep everything the server said about them, so callers can
/// surface or branch on it:
///
/// ```text
/// Error
/// ├── kind: ErrorKind          (category for matching)
/// ├── message: String          (human-readable description)
/// ├── status: Option<u16>      (HTTP status, when there was a response)
/// ├── code: Option             (machine-readable error code)
/// ├── description: Option      (server-provided error description)
/// ├── request_id: Option       (server-assigned correlation ID)
/// └── source: Option           (underlying cause)
/// ```
///
/// ## Example
///
/// ```rust
/// use capgate::{Error, ErrorKind};
///
/// fn surface(err: &Error) -> &'static str {
///     match err.kind() {
///         ErrorKind::LoginFailure => "show inline",
///         kind if kind.requires_login() => "back to login",
///         ErrorKind::Configuration => "blocking error screen",
///         _ => "generic api failure",
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Cow<'static, str>,
    status: Option<u16>,
    code: Option<String>,
    description: Option<String>,
    request_id: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl Error {
    /// Creates a new error with the given kind and message.
    ///
    /// ```rust
    /// use capgate::{Error, ErrorKind};
    ///
    /// let err = Error::new(ErrorKind::Configuration, "token endpoint is not configured");
    /// assert_eq!(err.kind(), ErrorKind::Configuration);
    /// ```
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            code: None,
            description: None,
            request_id: None,
            source: None,
        }
    }

    /// Builds an error from a non-success HTTP response.
    ///
    /// JSON bodies are searched for the OAuth-style `error` /
    /// `error_description` pair and the API-style `code` / `message` pair.
    /// The message prefers the description, then the code, then the raw body.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
        let field = |name: &str| {
            parsed
                .as_ref()
                .and_then(|v| v.get(name))
                .and_then(|v| v.as_str())
                .map(str::to_owned)
        };

        let code = field("error").or_else(|| field("code"));
        let description = field("error_description").or_else(|| field("message"));

        let message = match (&description, &code) {
            (Some(d), _) => d.clone(),
            (None, Some(c)) => c.clone(),
            (None, None) if body.is_empty() => format!("HTTP {}", status),
            (None, None) => body.to_string(),
        };

        let mut err = Self::new(ErrorKind::from_http_status(status), message);
        err.status = Some(status);
        err.code = code;
        err.description = description;
        err
    }

    /// Returns the error kind for categorization.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the human-readable message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status of the failed response, if there was one.
    #[inline]
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns the machine-readable error code, if the server sent one.
    #[inline]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Returns the server-provided error description, if any.
    #[inline]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the server-assigned request ID, if available.
    #[inline]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Returns `true` if the response status was 401.
    #[inline]
    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401)
    }

    /// Replaces the kind, keeping every other field.
    #[must_use]
    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the HTTP status for this error.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the request ID for this error.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Sets the source error for this error.
    #[must_use]
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    // Convenience constructors for the authorization taxonomy

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Creates a login failure carrying the reason shown to the user.
    pub fn login_failure(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::LoginFailure, message)
    }

    /// Creates a session expired error.
    pub fn session_expired() -> Self {
        Self::new(ErrorKind::SessionExpired, "Session expired. Please login again.")
    }

    /// Creates a stream error.
    pub fn stream(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Stream, message)
    }

    /// Creates a storage error.
    pub fn storage(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::InvalidResponse, message)
    }

    /// Creates an action unavailable error.
    pub fn action_unavailable(action: &str) -> Self {
        Self::new(
            ErrorKind::ActionUnavailable,
            format!("action '{}' is not granted on this entity", action),
        )
    }

    /// Creates a schema violation error.
    pub fn schema_violation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::SchemaViolation, message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;

        if let Some(status) = self.status {
            write!(f, " (status: {})", status)?;
        }

        if let Some(ref request_id) = self.request_id {
            write!(f, " (request_id: {})", request_id)?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind, kind.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::storage(err.to_string()).with_source(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::configuration(format!("invalid URL: {}", err)).with_source(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::invalid_response(format!("JSON error: {}", err)).with_source(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::Timeout
        } else if err.is_connect() {
            ErrorKind::Connection
        } else if err.is_decode() {
            ErrorKind::InvalidResponse
        } else {
            ErrorKind::Transport
        };
        Error::new(kind, format!("HTTP error: {}", err)).with_source(err)
    }
}
