//! The authorization flow seam: anything that can run password and refresh grants.

use std::{future::Future, pin::Pin, sync::Arc};

use super::{LoginCredentials, TokenResponse};
use crate::Error;

/// Boxed future returned by [`AuthorizationFlow`] grants.
pub type TokenFuture<'a> =
    Pin<Box<dyn Future<Output = Result<TokenResponse, Error>> + Send + 'a>>;

/// Exchanges credentials for tokens.
///
/// The session manager only talks to the authorization server through this
/// trait. [`TokenEndpoint`](super::TokenEndpoint) is the HTTP implementation;
/// [`MockAuthorizationFlow`](crate::testing::MockAuthorizationFlow) is a
/// scripted one for tests.
///
/// Failures should be returned as structured errors (see
/// [`Error::from_response`]) so the login form can show the server's
/// `error_description`.
///
/// ## Object Safety
///
/// This trait is object-safe and can be used as `Arc<dyn AuthorizationFlow>`.
///
/// ## Example
///
/// ```rust
/// use capgate::auth::{AuthorizationFlow, TokenFuture};
/// use capgate::{Error, LoginCredentials, TokenResponse};
///
/// struct FixedToken;
///
/// impl AuthorizationFlow for FixedToken {
///     fn password_grant<'a>(&'a self, _credentials: &'a LoginCredentials) -> TokenFuture<'a> {
///         Box::pin(async { Ok(TokenResponse::bearer("fixed")) })
///     }
///
///     fn refresh_grant<'a>(&'a self, _refresh_token: &'a str) -> TokenFuture<'a> {
///         Box::pin(async { Err(Error::session_expired()) })
///     }
/// }
/// ```
pub trait AuthorizationFlow: Send + Sync {
    /// Runs the resource owner password grant.
    fn password_grant<'a>(&'a self, credentials: &'a LoginCredentials) -> TokenFuture<'a>;

    /// Runs the refresh token grant.
    fn refresh_grant<'a>(&'a self, refresh_token: &'a str) -> TokenFuture<'a>;
}

impl<T: AuthorizationFlow + ?Sized> AuthorizationFlow for Arc<T> {
    fn password_grant<'a>(&'a self, credentials: &'a LoginCredentials) -> TokenFuture<'a> {
        (**self).password_grant(credentials)
    }

    fn refresh_grant<'a>(&'a self, refresh_token: &'a str) -> TokenFuture<'a> {
        (**self).refresh_grant(refresh_token)
    }
}

impl<T: AuthorizationFlow + ?Sized> AuthorizationFlow for Box<T> {
    fn password_grant<'a>(&'a self, credentials: &'a LoginCredentials) -> TokenFuture<'a> {
        (**self).password_grant(credentials)
    }

    fn refresh_grant<'a>(&'a self, refresh_token: &'a str) -> TokenFuture<'a> {
        (**self).refresh_grant(refresh_token)
    }
}
