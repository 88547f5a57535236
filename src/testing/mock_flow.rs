//! MockAuthorizationFlow for testing session behaviour without a token server.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};

use parking_lot::Mutex;

use crate::{
    Error,
    auth::{AuthorizationFlow, LoginCredentials, TokenFuture, TokenResponse},
};

/// A scripted authorization flow.
///
/// Known users get a fresh `access-N` / `refresh-N` pair on login; any
/// refresh token is accepted until [`fail_refreshes`](Self::fail_refreshes)
/// is switched on. Grants are counted so tests can assert on them.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use capgate::testing::MockAuthorizationFlow;
/// use capgate::{CredentialStore, LoginCredentials, SessionManager};
///
/// # tokio_test::block_on(async {
/// let flow = Arc::new(MockAuthorizationFlow::new().with_user("alice", "pw"));
/// let sessions = SessionManager::new(flow.clone(), CredentialStore::in_memory());
///
/// sessions.login(&LoginCredentials::new("alice", "pw")).await.unwrap();
/// assert!(sessions.is_authenticated());
/// assert_eq!(flow.login_count(), 1);
/// # });
/// ```
pub struct MockAuthorizationFlow {
    users: HashMap<String, String>,
    expires_in: Option<u64>,
    rotate_refresh_tokens: bool,
    refresh_delay: Option<Duration>,
    login_failure: Mutex<Option<Error>>,
    fail_refreshes: AtomicBool,
    issued: AtomicUsize,
    logins: AtomicUsize,
    refreshes: AtomicUsize,
}

impl Default for MockAuthorizationFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAuthorizationFlow {
    /// Creates a flow with no users and 300 second tokens.
    pub fn new() -> Self {
        Self {
            users: HashMap::new(),
            expires_in: Some(300),
            rotate_refresh_tokens: true,
            refresh_delay: None,
            login_failure: Mutex::new(None),
            fail_refreshes: AtomicBool::new(false),
            issued: AtomicUsize::new(0),
            logins: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
        }
    }

    /// Registers a user.
    #[must_use]
    pub fn with_user(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.users.insert(username.into(), password.into());
        self
    }

    /// Sets the token lifetime. `None` issues non-expiring tokens.
    #[must_use]
    pub fn with_expires_in(mut self, expires_in: Option<u64>) -> Self {
        self.expires_in = expires_in;
        self
    }

    /// Stops issuing new refresh tokens on refresh.
    #[must_use]
    pub fn without_refresh_rotation(mut self) -> Self {
        self.rotate_refresh_tokens = false;
        self
    }

    /// Delays every refresh grant.
    #[must_use]
    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = Some(delay);
        self
    }

    /// Makes the next login fail with `error`.
    #[must_use]
    pub fn failing_login_with(self, error: Error) -> Self {
        *self.login_failure.lock() = Some(error);
        self
    }

    /// Makes refresh grants fail (or succeed again).
    pub fn fail_refreshes(&self, fail: bool) {
        self.fail_refreshes.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of password grants made.
    pub fn login_count(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    /// Returns the number of refresh grants made.
    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    fn issue(&self, with_refresh_token: bool) -> TokenResponse {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let mut response = TokenResponse::bearer(format!("access-{}", n));
        if with_refresh_token {
            response = response.with_refresh_token(format!("refresh-{}", n));
        }
        if let Some(expires_in) = self.expires_in {
            response = response.with_expires_in(expires_in);
        }
        response
    }
}

fn rejected(status: u16, description: &str) -> Error {
    Error::from_response(
        status,
        &serde_json::json!({
            "error": "invalid_grant",
            "error_description": description,
        })
        .to_string(),
    )
}

impl AuthorizationFlow for MockAuthorizationFlow {
    fn password_grant<'a>(&'a self, credentials: &'a LoginCredentials) -> TokenFuture<'a> {
        Box::pin(async move {
            self.logins.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = self.login_failure.lock().take() {
                return Err(error);
            }
            match self.users.get(credentials.username()) {
                Some(password) if password == credentials.password() => Ok(self.issue(true)),
                _ => Err(rejected(401, "Invalid user credentials")),
            }
        })
    }

    fn refresh_grant<'a>(&'a self, _refresh_token: &'a str) -> TokenFuture<'a> {
        Box::pin(async move {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.refresh_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_refreshes.load(Ordering::SeqCst) {
                return Err(rejected(400, "Token is not active"));
            }
            Ok(self.issue(self.rotate_refresh_tokens))
        })
    }
}
