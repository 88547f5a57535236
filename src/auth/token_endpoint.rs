//! HTTP implementation of the OAuth token endpoint grants.

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};

use super::{AuthorizationFlow, LoginCredentials, TokenFuture, TokenResponse};
use crate::Error;
use crate::config::AuthConfig;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Talks to an OAuth token endpoint with form-encoded grants.
///
/// Requests carry `grant_type`, `client_id` and the grant-specific fields.
/// Non-success responses are converted with [`Error::from_response`], which
/// keeps the server's `error` and `error_description`.
#[derive(Debug, Clone)]
pub struct TokenEndpoint {
    http: reqwest::Client,
    config: AuthConfig,
    timeout: Duration,
}

impl TokenEndpoint {
    /// Creates a token endpoint client.
    pub fn new(http: reqwest::Client, config: AuthConfig, timeout: Duration) -> Self {
        Self {
            http,
            config,
            timeout,
        }
    }

    /// Returns the auth settings.
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    async fn grant(&self, params: &[(&str, &str)]) -> Result<TokenResponse, Error> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", &self.config.client_id)
            .extend_pairs(params)
            .finish();

        let response = self
            .http
            .post(self.config.token_endpoint.clone())
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .header(ACCEPT, "application/json")
            .timeout(self.timeout)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_response(status.as_u16(), &body));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            Error::invalid_response(format!("Malformed token response: {}", e)).with_source(e)
        })?;
        if token.access_token.is_empty() {
            return Err(Error::invalid_response("Token response has an empty access_token"));
        }
        Ok(token)
    }
}

impl AuthorizationFlow for TokenEndpoint {
    fn password_grant<'a>(&'a self, credentials: &'a LoginCredentials) -> TokenFuture<'a> {
        Box::pin(async move {
            self.grant(&[
                ("grant_type", "password"),
                ("username", credentials.username()),
                ("password", credentials.password()),
            ])
            .await
        })
    }

    fn refresh_grant<'a>(&'a self, refresh_token: &'a str) -> TokenFuture<'a> {
        Box::pin(async move {
            self.grant(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)])
                .await
        })
    }
}
