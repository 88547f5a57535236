//! The authenticated request pipeline.
//!
//! Every API call goes through [`RequestPipeline::send`], which attaches the
//! bearer token, and on a 401 refreshes the session once and re-issues the
//! same request. Concurrent 401s share one refresh.

mod request;
mod resources;

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use url::Url;

pub use request::ApiRequest;
pub use resources::MAX_LIST_PAGES;
pub(crate) use request::{RequestContext, resolve_target};

use crate::session::SessionManager;
use crate::{Error, ErrorKind};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Sends API requests with the current session's bearer token.
///
/// ## Retry policy
///
/// 1. The current access token is attached as `Authorization: Bearer`.
/// 2. A 401 on the first attempt triggers a refresh through
///    [`SessionManager::refresh_after`], then the identical request is sent
///    again with the new token.
/// 3. A failed refresh surfaces as `SessionExpired`; the session has been
///    logged out by then.
/// 4. A 401 on the retry logs out and surfaces as
///    `UnauthorizedRetryExhausted`. There is no second refresh.
///
/// Any other non-success status is returned as an error built by
/// [`Error::from_response`] and leaves the session alone.
#[derive(Debug, Clone)]
pub struct RequestPipeline {
    http: reqwest::Client,
    base_url: Url,
    sessions: Arc<SessionManager>,
    request_timeout: Duration,
}

impl RequestPipeline {
    /// Creates a pipeline for the API at `base_url`.
    pub fn new(
        http: reqwest::Client,
        base_url: Url,
        sessions: Arc<SessionManager>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url,
            sessions,
            request_timeout,
        }
    }

    /// Returns the API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the session manager.
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Sends `request` and returns the successful response.
    ///
    /// # Errors
    ///
    /// - `SessionExpired` if a 401 could not be recovered by refreshing
    /// - `UnauthorizedRetryExhausted` if the retried request got a 401 too
    /// - the mapped API error for any other non-success status
    /// - `Timeout`, `Connection` or `Transport` for transport failures
    pub async fn send(&self, request: &ApiRequest) -> Result<reqwest::Response, Error> {
        let url = request.url(&self.base_url)?;
        let mut context = RequestContext::default();

        loop {
            let credential = self.sessions.credential();
            context.generation = credential.generation;

            let response = self
                .dispatch(request, url.clone(), credential.access_token.as_deref())
                .await?;

            if response.status() != StatusCode::UNAUTHORIZED {
                return check_status(response).await;
            }

            if context.retried {
                tracing::warn!(
                    method = %request.method(),
                    url = %url,
                    "request rejected after token refresh; logging out"
                );
                self.sessions.logout();
                return Err(Error::new(
                    ErrorKind::UnauthorizedRetryExhausted,
                    "Request was rejected again after refreshing the session",
                )
                .with_status(StatusCode::UNAUTHORIZED.as_u16()));
            }

            context.retried = true;
            tracing::debug!(
                method = %request.method(),
                url = %url,
                generation = context.generation,
                "request unauthorized; refreshing session"
            );
            self.sessions.refresh_after(context.generation).await?;
        }
    }

    /// Sends `request` and decodes the JSON response body.
    ///
    /// An empty body decodes as JSON `null`, so `R = ()` or
    /// `R = serde_json::Value` work for bodiless responses.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send), plus `InvalidResponse` if the body does
    /// not decode as `R`.
    pub async fn execute<R: DeserializeOwned>(&self, request: &ApiRequest) -> Result<R, Error> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await?;
        let decoded = if bytes.is_empty() {
            serde_json::from_value(serde_json::Value::Null)
        } else {
            serde_json::from_slice(&bytes)
        };
        decoded.map_err(|e| {
            Error::invalid_response(format!(
                "Unexpected response body for {} {}: {}",
                request.method(),
                request.target(),
                e
            ))
            .with_source(e)
        })
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        url: Url,
        access_token: Option<&str>,
    ) -> Result<reqwest::Response, Error> {
        let mut builder = self
            .http
            .request(request.method().clone(), url)
            .header(ACCEPT, "application/json")
            .timeout(self.request_timeout);

        if let Some(token) = access_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        Ok(builder.send().await?)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let request_id = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = response.text().await.unwrap_or_default();

    let err = Error::from_response(status.as_u16(), &body);
    Err(match request_id {
        Some(id) => err.with_request_id(id),
        None => err,
    })
}
