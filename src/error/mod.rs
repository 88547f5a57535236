//! Error types for the gateway.
//!
//! Everything fallible returns [`Error`], categorized by [`ErrorKind`].
//!
//! ## Key Invariant
//!
//! Authorization-layer failures (`SessionExpired`,
//! `UnauthorizedRetryExhausted`) are only ever returned after the session has
//! been logged out, so a caller never holds an error while stale credentials
//! are still stored. Other API failures are passed through unmodified.
//!
//! ```rust,ignore
//! match pipeline.execute::<Page<Entity<Document>>>(request).await {
//!     Ok(page) => render(page),
//!     Err(e) if e.kind().requires_login() => navigate_to_login(),
//!     Err(e) => show_api_error(e.status(), e.message()),
//! }
//! ```

mod core;
mod kind;

pub use self::core::Error;
pub use kind::ErrorKind;

/// A specialized `Result` type for gateway operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
