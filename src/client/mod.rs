//! The gateway: one session shared by the request pipeline and the stream
//! manager.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use capgate::prelude::*;
//!
//! # async fn run() -> Result<(), Error> {
//! let config = RuntimeConfig::from_env()?;
//! let gateway = Gateway::from_runtime_config(&config, CredentialStore::in_memory())?;
//!
//! if !gateway.initialize().await? {
//!     gateway.login(&LoginCredentials::new("alice", "pw")).await?;
//! }
//!
//! let documents: Page<Entity> = gateway
//!     .pipeline()
//!     .execute(&ApiRequest::get("/npl/document/Document/"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod builder;

pub use builder::{GatewayBuilder, HasAuth, HasUrl, NoAuth, NoUrl};

use std::sync::Arc;

use crate::{
    Error,
    auth::{LoginCredentials, User},
    config::RuntimeConfig,
    pipeline::RequestPipeline,
    session::{CredentialStore, Session, SessionManager},
    stream::{STATE_STREAM_PATH, StreamManager, Subscription},
};

/// Entry point wiring a session, a request pipeline and a stream manager.
///
/// `Gateway` is `Clone` and thread-safe; clones share the same session.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    sessions: Arc<SessionManager>,
    pipeline: RequestPipeline,
    streams: StreamManager,
}

impl Gateway {
    /// Creates a new gateway builder.
    pub fn builder() -> GatewayBuilder<NoUrl, NoAuth> {
        GatewayBuilder::new()
    }

    /// Builds a gateway from runtime configuration.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if the token endpoint cannot be
    /// derived or the HTTP client cannot be created.
    pub fn from_runtime_config(
        config: &RuntimeConfig,
        store: CredentialStore,
    ) -> Result<Self, Error> {
        Self::builder()
            .url(config.api_base_url.as_str())
            .auth(config.auth_config()?)
            .credential_store(store)
            .build()
    }

    /// Returns the session manager.
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.inner.sessions
    }

    /// Returns the request pipeline.
    pub fn pipeline(&self) -> &RequestPipeline {
        &self.inner.pipeline
    }

    /// Returns the stream manager.
    pub fn streams(&self) -> &StreamManager {
        &self.inner.streams
    }

    /// Restores a stored session. See [`SessionManager::initialize`].
    ///
    /// # Errors
    ///
    /// See [`SessionManager::initialize`].
    pub async fn initialize(&self) -> Result<bool, Error> {
        self.inner.sessions.initialize().await
    }

    /// Logs in. See [`SessionManager::login`].
    ///
    /// # Errors
    ///
    /// See [`SessionManager::login`].
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<Session, Error> {
        self.inner.sessions.login(credentials).await
    }

    /// Logs out.
    pub fn logout(&self) {
        self.inner.sessions.logout();
    }

    /// Returns whether a valid session is held.
    pub fn is_authenticated(&self) -> bool {
        self.inner.sessions.is_authenticated()
    }

    /// Returns the signed-in user. See [`SessionManager::current_user`].
    ///
    /// # Errors
    ///
    /// See [`SessionManager::current_user`].
    pub fn me(&self) -> Result<Option<User>, Error> {
        self.inner.sessions.current_user()
    }

    /// Subscribes to entity state changes on the default stream endpoint.
    ///
    /// # Errors
    ///
    /// See [`StreamManager::subscribe`].
    pub fn subscribe_states<F>(&self, on_notify: F) -> Result<Subscription, Error>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.streams.subscribe(STATE_STREAM_PATH, on_notify)
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("api", &self.inner.pipeline.base_url().as_str())
            .field("sessions", &self.inner.sessions)
            .finish()
    }
}
