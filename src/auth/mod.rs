//! Authorization against the OAuth token endpoint.
//!
//! - [`LoginCredentials`]: what the user types on the login form
//! - [`TokenResponse`]: what the token endpoint returns
//! - [`AuthorizationFlow`]: the password and refresh grants, as a trait
//! - [`TokenEndpoint`]: the HTTP implementation of that trait
//! - [`User`]: who is signed in, read from the access token

mod credentials;
mod flow;
mod token_endpoint;
mod user;

pub use credentials::{LoginCredentials, TokenResponse};
pub use flow::{AuthorizationFlow, TokenFuture};
pub use token_endpoint::TokenEndpoint;
pub use user::User;
