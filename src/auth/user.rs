//! The signed-in user, read from the access token's claims.

use base64::prelude::*;
use serde::Deserialize;

use crate::Error;
use crate::resource::Party;

/// Identity of the signed-in user.
///
/// Decoded from the claims segment of a JWT access token. The signature is
/// not checked; the token came from the authorization server and is only
/// read for display and party matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    name: Option<String>,
    email: String,
}

#[derive(Deserialize)]
struct Claims {
    email: Option<String>,
    name: Option<String>,
    preferred_username: Option<String>,
    #[serde(rename = "firstName", alias = "given_name")]
    first_name: Option<String>,
    #[serde(rename = "lastName", alias = "family_name")]
    last_name: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl User {
    /// Creates a user directly.
    pub fn new(name: Option<String>, email: impl Into<String>) -> Self {
        Self {
            name,
            email: email.into(),
        }
    }

    /// Reads the user from a JWT access token.
    ///
    /// The display name is `name`, else `preferred_username`, else first
    /// and last name joined by a space.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResponse` if the token is not a JWT, its claims do not
    /// decode, or it carries no `email` claim.
    pub fn from_access_token(token: &str) -> Result<Self, Error> {
        let mut segments = token.split('.');
        let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
            (Some(_), Some(payload), Some(_), None) => payload,
            _ => return Err(Error::invalid_response("Access token is not a JWT")),
        };

        let bytes = BASE64_URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| {
                Error::invalid_response("Access token claims are not base64url").with_source(e)
            })?;
        let claims: Claims = serde_json::from_slice(&bytes).map_err(|e| {
            Error::invalid_response("Access token claims are not a JSON object").with_source(e)
        })?;

        let email = non_empty(claims.email)
            .ok_or_else(|| Error::invalid_response("Access token carries no email claim"))?;

        let full_name = match (non_empty(claims.first_name), non_empty(claims.last_name)) {
            (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
            (first, last) => first.or(last),
        };
        let name = non_empty(claims.name)
            .or_else(|| non_empty(claims.preferred_username))
            .or(full_name);

        Ok(Self { name, email })
    }

    /// Returns the display name, if the token carries one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the email address.
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the display name, falling back to the email address.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }

    /// Returns `true` if `party` accepts this user's email claim.
    pub fn is_party(&self, party: &Party) -> bool {
        party
            .claims
            .get("email")
            .is_some_and(|emails| emails.iter().any(|e| e == &self.email))
    }
}
