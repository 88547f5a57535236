//! Login, refresh, logout and startup restore.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::Mutex as AsyncMutex;

use super::{CredentialStore, Session};
use crate::auth::{AuthorizationFlow, LoginCredentials, User};
use crate::{Error, ErrorKind};

const LOGIN_FAILED: &str = "Login failed";

/// Snapshot of the credential a request should carry.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Access token, if a session exists.
    pub access_token: Option<String>,
    /// Session generation the token belongs to.
    pub generation: u64,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("generation", &self.generation)
            .finish()
    }
}

#[derive(Default)]
struct SessionState {
    session: Option<Session>,
    generation: u64,
}

/// Owns the session and its durable mirror.
///
/// Every state change bumps a generation counter. The request pipeline
/// remembers the generation of the token it sent; [`refresh_after`] uses it
/// to tell a stale 401 (someone already refreshed) from one that needs a new
/// refresh, so a burst of concurrent 401s produces a single refresh grant.
///
/// Transitions are serialized by an async mutex. Session state itself sits
/// behind a synchronous lock and is swapped whole, so readers never see a
/// half-applied refresh.
///
/// [`refresh_after`]: SessionManager::refresh_after
pub struct SessionManager {
    flow: Arc<dyn AuthorizationFlow>,
    store: CredentialStore,
    state: RwLock<SessionState>,
    transition: AsyncMutex<()>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("SessionManager")
            .field("store", &self.store)
            .field("authenticated", &state.session.is_some())
            .field("generation", &state.generation)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Creates a manager. Nothing is read from the store until
    /// [`initialize`](Self::initialize).
    pub fn new(flow: Arc<dyn AuthorizationFlow>, store: CredentialStore) -> Self {
        Self {
            flow,
            store,
            state: RwLock::new(SessionState::default()),
            transition: AsyncMutex::new(()),
        }
    }

    /// Returns the credential store.
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Returns the current session generation.
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    /// Returns a copy of the current session.
    pub fn session(&self) -> Option<Session> {
        self.state.read().session.clone()
    }

    /// Returns the current access token.
    pub fn access_token(&self) -> Option<String> {
        self.state
            .read()
            .session
            .as_ref()
            .map(|s| s.access_token().to_owned())
    }

    /// Returns the access token together with its generation.
    pub fn credential(&self) -> Credential {
        let state = self.state.read();
        Credential {
            access_token: state.session.as_ref().map(|s| s.access_token().to_owned()),
            generation: state.generation,
        }
    }

    /// Returns the signed-in user, read from the current access token.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResponse` if the token is not a JWT or carries no
    /// `email` claim.
    pub fn current_user(&self) -> Result<Option<User>, Error> {
        self.state
            .read()
            .session
            .as_ref()
            .map(|s| User::from_access_token(s.access_token()))
            .transpose()
    }

    /// Returns `true` if a session is held and its access token has not
    /// expired.
    pub fn is_authenticated(&self) -> bool {
        self.state
            .read()
            .session
            .as_ref()
            .is_some_and(|s| !s.is_expired())
    }

    /// Exchanges username and password for a session.
    ///
    /// # Errors
    ///
    /// Returns `LoginFailure` carrying the server's `error_description` (or
    /// `error`, or "Login failed"). The previous session is left untouched.
    /// Returns `Storage` if the new session cannot be persisted.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<Session, Error> {
        let _transition = self.transition.lock().await;

        let response = self
            .flow
            .password_grant(credentials)
            .await
            .map_err(|e| {
                let reason = e
                    .description()
                    .or(e.code())
                    .unwrap_or(LOGIN_FAILED)
                    .to_owned();
                tracing::info!(
                    username = %credentials.username(),
                    status = ?e.status(),
                    "login rejected"
                );
                let status = e.status();
                let err = Error::login_failure(reason).with_source(e);
                match status {
                    Some(status) => err.with_status(status),
                    None => err,
                }
            })?;

        let session = Session::from_token_response(&response, None, Utc::now());
        if let Err(e) = self.store.set(&session) {
            tracing::warn!(error = %e, "new session could not be stored; restoring previous");
            self.restore_store();
            return Err(e);
        }
        let generation = self.install(session.clone());

        tracing::info!(username = %credentials.username(), generation, "login succeeded");
        Ok(session)
    }

    /// Refreshes the session with the stored refresh token.
    ///
    /// # Errors
    ///
    /// Returns `SessionExpired` if there is no refresh token or the grant
    /// fails. Either way the session is logged out first.
    pub async fn refresh(&self) -> Result<Session, Error> {
        let _transition = self.transition.lock().await;
        self.refresh_locked().await
    }

    /// Refreshes unless the session moved past `seen_generation`.
    ///
    /// Callers pass the generation of the token that was rejected. If a
    /// login, refresh or logout has happened since, no grant is made: the
    /// current session is returned, or `SessionExpired` if there is none.
    ///
    /// # Errors
    ///
    /// Same as [`refresh`](Self::refresh).
    pub async fn refresh_after(&self, seen_generation: u64) -> Result<Session, Error> {
        let _transition = self.transition.lock().await;

        {
            let state = self.state.read();
            if state.generation != seen_generation {
                tracing::debug!(
                    seen_generation,
                    current_generation = state.generation,
                    "session already replaced; skipping refresh"
                );
                return state.session.clone().ok_or_else(Error::session_expired);
            }
        }

        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<Session, Error> {
        let Some(refresh_token) = self.store.refresh_token() else {
            tracing::info!("no refresh token stored; logging out");
            self.clear();
            return Err(Error::session_expired());
        };

        let response = match self.flow.refresh_grant(&refresh_token).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(status = ?e.status(), error = %e, "token refresh failed; logging out");
                self.clear();
                return Err(Error::session_expired().with_source(e));
            }
        };

        let session = Session::from_token_response(&response, Some(&refresh_token), Utc::now());
        if let Err(e) = self.store.set(&session) {
            tracing::warn!(error = %e, "refreshed session could not be stored; logging out");
            self.clear();
            return Err(Error::session_expired().with_source(e));
        }

        let generation = self.install(session.clone());
        tracing::info!(generation, "session refreshed");
        Ok(session)
    }

    /// Clears the session and the credential store. Idempotent.
    pub fn logout(&self) {
        self.clear();
    }

    fn clear(&self) {
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "failed to clear credential store");
        }
        let mut state = self.state.write();
        let was_authenticated = state.session.take().is_some();
        state.generation += 1;
        if was_authenticated {
            tracing::info!(generation = state.generation, "logged out");
        }
    }

    /// Rewrites the store from the in-memory session after a partial write.
    ///
    /// If even that fails the store cannot be trusted and the session is
    /// logged out.
    fn restore_store(&self) {
        let previous = self.state.read().session.clone();
        let restored = match &previous {
            Some(previous) => self.store.set(previous),
            None => self.store.clear(),
        };
        if let Err(e) = restored {
            tracing::warn!(error = %e, "credential store could not be restored; logging out");
            self.clear();
        }
    }

    fn install(&self, session: Session) -> u64 {
        let mut state = self.state.write();
        state.session = Some(session);
        state.generation += 1;
        state.generation
    }

    /// Restores the session from the credential store at startup.
    ///
    /// A stored token that has not expired is adopted as is. An expired one
    /// is refreshed once if a refresh token is stored, otherwise the store is
    /// cleared. Returns whether the caller ends up authenticated.
    ///
    /// # Errors
    ///
    /// Refresh failures are not errors here; they result in `Ok(false)`.
    /// Only errors other than `SessionExpired` are returned.
    pub async fn initialize(&self) -> Result<bool, Error> {
        let Some(stored) = self.store.load() else {
            tracing::debug!("no stored session");
            return Ok(false);
        };

        if !stored.is_expired() {
            let generation = self.install(stored);
            tracing::info!(generation, "restored stored session");
            return Ok(true);
        }

        if stored.refresh_token().is_none() {
            tracing::info!("stored session expired without refresh token; logging out");
            self.logout();
            return Ok(false);
        }

        match self.refresh().await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::SessionExpired => Ok(false),
            Err(e) => Err(e),
        }
    }
}
