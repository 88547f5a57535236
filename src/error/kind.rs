//! Error kind enumeration for categorizing gateway errors.

/// Categorization of gateway errors.
///
/// The first group of kinds belongs to the authorization layer. Every one of
/// them has already passed through [`SessionManager::logout`] (or left the
/// session untouched, for `LoginFailure`) by the time the caller sees it.
///
/// | ErrorKind                    | Surface                         | Retried |
/// |------------------------------|---------------------------------|---------|
/// | `Configuration`              | Blocking error screen           | No      |
/// | `LoginFailure`               | Inline on the login form        | No      |
/// | `SessionExpired`             | Navigate back to login          | No      |
/// | `UnauthorizedRetryExhausted` | Generic API failure             | No      |
/// | `Stream`                     | Liveness flag only              | No      |
///
/// The remaining kinds describe API failures that the pipeline passes through
/// unmodified.
///
/// [`SessionManager::logout`]: crate::session::SessionManager::logout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Required authorization settings are missing or inconsistent.
    ///
    /// Fatal at startup; never retried.
    #[error("configuration error")]
    Configuration,

    /// The authorization endpoint rejected the supplied username/password.
    ///
    /// Session state is left exactly as it was before the attempt.
    #[error("login failed")]
    LoginFailure,

    /// The session could not be refreshed and has been cleared.
    ///
    /// The caller must log in again.
    #[error("session expired")]
    SessionExpired,

    /// A request was rejected with 401 even after a successful refresh.
    #[error("unauthorized after retry")]
    UnauthorizedRetryExhausted,

    /// The push channel failed. Only reflected in subscription liveness.
    #[error("stream error")]
    Stream,

    /// HTTP 401 returned outside the retry flow (e.g. by the token endpoint).
    #[error("unauthorized")]
    Unauthorized,

    /// HTTP 403.
    #[error("forbidden")]
    Forbidden,

    /// HTTP 404.
    #[error("not found")]
    NotFound,

    /// HTTP 400 and other client errors.
    #[error("invalid argument")]
    InvalidArgument,

    /// HTTP 409.
    #[error("conflict")]
    Conflict,

    /// HTTP 429.
    #[error("rate limited")]
    RateLimited,

    /// HTTP 503.
    #[error("service unavailable")]
    Unavailable,

    /// Request timed out.
    #[error("timeout")]
    Timeout,

    /// HTTP 5xx other than 503.
    #[error("internal error")]
    Internal,

    /// Could not connect to the server.
    #[error("connection error")]
    Connection,

    /// Any other transport-level failure.
    #[error("transport error")]
    Transport,

    /// A response body could not be decoded.
    #[error("invalid response")]
    InvalidResponse,

    /// The durable credential medium failed to read or write.
    #[error("storage error")]
    Storage,

    /// The entity's capability map does not grant the requested action.
    #[error("action unavailable")]
    ActionUnavailable,

    /// A payload or result failed its declared shape check.
    #[error("schema violation")]
    SchemaViolation,

    /// Unclassified failure.
    #[error("unknown error")]
    Unknown,
}

impl ErrorKind {
    /// Returns `true` for failures raised by the authorization layer itself.
    ///
    /// ```rust
    /// use capgate::ErrorKind;
    ///
    /// assert!(ErrorKind::SessionExpired.is_auth_failure());
    /// assert!(!ErrorKind::NotFound.is_auth_failure());
    /// ```
    #[inline]
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            ErrorKind::LoginFailure
                | ErrorKind::SessionExpired
                | ErrorKind::UnauthorizedRetryExhausted
        )
    }

    /// Returns `true` if the caller has to send the user back to login.
    #[inline]
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            ErrorKind::SessionExpired | ErrorKind::UnauthorizedRetryExhausted
        )
    }

    /// Creates an `ErrorKind` from an HTTP status code.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 => ErrorKind::InvalidArgument,
            401 => ErrorKind::Unauthorized,
            403 => ErrorKind::Forbidden,
            404 => ErrorKind::NotFound,
            409 => ErrorKind::Conflict,
            429 => ErrorKind::RateLimited,
            503 => ErrorKind::Unavailable,
            504 => ErrorKind::Timeout,
            _ if (400..500).contains(&status) => ErrorKind::InvalidArgument,
            _ if status >= 500 => ErrorKind::Internal,
            _ => ErrorKind::Unknown,
        }
    }
}
