//! Gateway builder with typestate pattern.

use std::{marker::PhantomData, sync::Arc, time::Duration};

use url::Url;

use super::{Gateway, GatewayInner};
use crate::{
    Error,
    auth::{AuthorizationFlow, TokenEndpoint},
    config::{AuthConfig, HttpConfig},
    pipeline::RequestPipeline,
    session::{CredentialStore, SessionManager},
    stream::StreamManager,
};

/// Marker type: API URL not yet provided.
pub struct NoUrl;

/// Marker type: API URL has been provided.
pub struct HasUrl;

/// Marker type: authorization not yet configured.
pub struct NoAuth;

/// Marker type: authorization has been configured.
pub struct HasAuth;

enum AuthSource {
    Endpoint(AuthConfig),
    Flow(Arc<dyn AuthorizationFlow>),
}

/// Builder for [`Gateway`] instances.
///
/// The API URL and the authorization source are required, and the typestate
/// parameters make `build()` unavailable until both are set.
///
/// ## Required Configuration
///
/// - `url()`: the API base URL
/// - `auth()` or `authorization_flow()`: how tokens are obtained
///
/// ## Optional Configuration
///
/// - `credential_store()`: where the session is persisted (in memory by default)
/// - `http_config()`: timeouts and TLS
/// - `timeout()`: request timeout shortcut
/// - `insecure()`: accept self-signed certificates
///
/// ## Example
///
/// ```rust
/// use std::time::Duration;
/// use capgate::{CredentialStore, Gateway};
/// use capgate::config::AuthConfig;
///
/// # fn main() -> Result<(), capgate::Error> {
/// let gateway = Gateway::builder()
///     .url("http://localhost:12000")
///     .auth(AuthConfig::new("http://localhost:11000/token", "capgate")?)
///     .credential_store(CredentialStore::in_memory())
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// assert!(!gateway.is_authenticated());
/// # Ok(())
/// # }
/// ```
pub struct GatewayBuilder<UrlState, AuthState> {
    url: Option<String>,
    auth: Option<AuthSource>,
    store: Option<CredentialStore>,
    http_config: HttpConfig,
    _url_state: PhantomData<UrlState>,
    _auth_state: PhantomData<AuthState>,
}

impl GatewayBuilder<NoUrl, NoAuth> {
    /// Creates a new gateway builder.
    pub fn new() -> Self {
        Self {
            url: None,
            auth: None,
            store: None,
            http_config: HttpConfig::default(),
            _url_state: PhantomData,
            _auth_state: PhantomData,
        }
    }
}

impl Default for GatewayBuilder<NoUrl, NoAuth> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> GatewayBuilder<NoUrl, A> {
    /// Sets the API base URL.
    pub fn url(self, url: impl Into<String>) -> GatewayBuilder<HasUrl, A> {
        GatewayBuilder {
            url: Some(url.into()),
            auth: self.auth,
            store: self.store,
            http_config: self.http_config,
            _url_state: PhantomData,
            _auth_state: PhantomData,
        }
    }
}

impl<U> GatewayBuilder<U, NoAuth> {
    /// Uses the OAuth token endpoint described by `config`.
    pub fn auth(self, config: AuthConfig) -> GatewayBuilder<U, HasAuth> {
        self.with_auth(AuthSource::Endpoint(config))
    }

    /// Uses a custom authorization flow, e.g. a test double.
    pub fn authorization_flow(
        self,
        flow: impl AuthorizationFlow + 'static,
    ) -> GatewayBuilder<U, HasAuth> {
        self.with_auth(AuthSource::Flow(Arc::new(flow)))
    }

    fn with_auth(self, auth: AuthSource) -> GatewayBuilder<U, HasAuth> {
        GatewayBuilder {
            url: self.url,
            auth: Some(auth),
            store: self.store,
            http_config: self.http_config,
            _url_state: PhantomData,
            _auth_state: PhantomData,
        }
    }
}

impl<U, A> GatewayBuilder<U, A> {
    /// Sets where the session is persisted.
    #[must_use]
    pub fn credential_store(mut self, store: CredentialStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the HTTP configuration.
    #[must_use]
    pub fn http_config(mut self, config: HttpConfig) -> Self {
        self.http_config = config;
        self
    }

    /// Sets the request timeout.
    ///
    /// Applies to API and token requests. Push channels are exempt.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.http_config.request_timeout = timeout;
        self
    }

    /// Accepts invalid TLS certificates.
    ///
    /// **WARNING**: only for local development. Never use this in production.
    #[must_use]
    pub fn insecure(mut self) -> Self {
        self.http_config.accept_invalid_certs = true;
        self
    }
}

impl GatewayBuilder<HasUrl, HasAuth> {
    /// Builds the gateway.
    ///
    /// No network calls are made. Call [`Gateway::initialize`] to restore a
    /// stored session.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if the URL is invalid or the HTTP
    /// client cannot be created.
    pub fn build(self) -> Result<Gateway, Error> {
        let url = self
            .url
            .ok_or_else(|| Error::configuration("API URL is required"))?;
        let api_base_url = Url::parse(&url)
            .map_err(|e| Error::configuration(format!("Invalid API URL: {}", e)).with_source(e))?;
        let auth = self
            .auth
            .ok_or_else(|| Error::configuration("Authorization is required"))?;

        let http = self.http_config.build_client()?;
        let timeout = self.http_config.request_timeout;

        let flow: Arc<dyn AuthorizationFlow> = match auth {
            AuthSource::Endpoint(config) => {
                Arc::new(TokenEndpoint::new(http.clone(), config, timeout))
            }
            AuthSource::Flow(flow) => flow,
        };

        let store = self.store.unwrap_or_else(CredentialStore::in_memory);
        let sessions = Arc::new(SessionManager::new(flow, store));

        tracing::debug!(api = %api_base_url, "gateway built");
        Ok(Gateway {
            inner: Arc::new(GatewayInner {
                pipeline: RequestPipeline::new(
                    http.clone(),
                    api_base_url.clone(),
                    Arc::clone(&sessions),
                    timeout,
                ),
                streams: StreamManager::new(http, api_base_url, Arc::clone(&sessions)),
                sessions,
            }),
        })
    }
}
