//! Live-state subscriptions over server-sent events.
//!
//! A view subscribes to a push endpoint and gets a callback whenever the
//! server reports a state change, so it can re-fetch its entity list. Event
//! payloads are not interpreted.
//!
//! A channel that fails or is closed by the server stays closed: liveness
//! drops to `false` and no reconnection is attempted. The view has to
//! subscribe again to resume live updates.

mod sse;

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::{Mutex, ReentrantMutex};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use url::Url;
use uuid::Uuid;

pub use sse::{MAX_LINE_BYTES, SseEvent};
pub(crate) use sse::SseDecoder;

use crate::pipeline::resolve_target;
use crate::session::SessionManager;
use crate::Error;

/// Default push endpoint for entity state changes.
pub const STATE_STREAM_PATH: &str = "/api/streams/states";

/// Event type that announces a state change.
pub const STATE_EVENT: &str = "state";

type Listener = Arc<dyn Fn() + Send + Sync>;

/// Returns `true` for events that should trigger a refresh.
pub fn triggers_refresh(event: &SseEvent) -> bool {
    matches!(event.event_type(), "message" | STATE_EVENT)
}

/// Opens server-sent event subscriptions with the session's bearer token.
#[derive(Debug, Clone)]
pub struct StreamManager {
    http: reqwest::Client,
    base_url: Url,
    sessions: Arc<SessionManager>,
}

impl StreamManager {
    /// Creates a stream manager for the API at `base_url`.
    pub fn new(http: reqwest::Client, base_url: Url, sessions: Arc<SessionManager>) -> Self {
        Self {
            http,
            base_url,
            sessions,
        }
    }

    /// Opens a push channel to `endpoint` and calls `on_notify` for every
    /// unnamed or `state` event.
    ///
    /// The channel is opened in the background; [`Subscription::is_active`]
    /// turns `true` once the server accepts it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` or `Configuration` if `endpoint` cannot be
    /// resolved, and `Configuration` when called outside a Tokio runtime.
    pub fn subscribe<F>(&self, endpoint: &str, on_notify: F) -> Result<Subscription, Error>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let url = resolve_target(&self.base_url, endpoint)?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            Error::configuration("Stream subscriptions require a Tokio runtime").with_source(e)
        })?;

        let id = Uuid::new_v4();
        let (liveness, receiver) = watch::channel(false);
        let shared = Arc::new(Shared {
            listener: ReentrantMutex::new(RefCell::new(Some(Arc::new(on_notify)))),
            liveness,
        });

        let task = runtime.spawn(run_channel(
            self.http.clone(),
            url.clone(),
            self.sessions.access_token(),
            Arc::clone(&shared),
            id,
        ));

        tracing::debug!(subscription = %id, url = %url, "stream subscription opened");
        Ok(Subscription {
            id,
            url,
            shared,
            task: Mutex::new(Some(task)),
            liveness: receiver,
        })
    }
}

struct Shared {
    listener: ReentrantMutex<RefCell<Option<Listener>>>,
    liveness: watch::Sender<bool>,
}

impl Shared {
    /// Calls the listener while holding the lock, so `unsubscribe` waits for
    /// an in-flight callback and no callback starts after it.
    fn notify(&self) {
        let guard = self.listener.lock();
        let listener = guard.borrow().clone();
        if let Some(listener) = listener {
            listener();
        }
    }

    fn set_live(&self, live: bool) {
        let guard = self.listener.lock();
        if live && guard.borrow().is_none() {
            return;
        }
        self.liveness.send_replace(live);
    }
}

async fn run_channel(
    http: reqwest::Client,
    url: Url,
    access_token: Option<String>,
    shared: Arc<Shared>,
    id: Uuid,
) {
    let mut request = http
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache");
    if let Some(token) = access_token {
        request = request.bearer_auth(token);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            let error = Error::stream("Stream connection failed").with_source(e);
            tracing::warn!(subscription = %id, %error, "stream not opened");
            shared.set_live(false);
            return;
        }
    };

    let status = response.status();
    if !status.is_success() {
        let error = Error::stream("Stream rejected").with_status(status.as_u16());
        tracing::warn!(subscription = %id, %error, "stream not opened");
        shared.set_live(false);
        return;
    }

    shared.set_live(true);
    tracing::debug!(subscription = %id, "stream open");

    let error = read_events(response, &shared, id).await;
    tracing::warn!(subscription = %id, %error, "stream ended; not reconnecting");
    shared.set_live(false);
}

/// Dispatches events until the stream stops, returning why it stopped.
async fn read_events(response: reqwest::Response, shared: &Shared, id: Uuid) -> Error {
    let mut decoder = SseDecoder::default();
    let mut bytes = response.bytes_stream();
    loop {
        let chunk = match bytes.next().await {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => return Error::stream("Stream failed").with_source(e),
            None => return Error::stream("Stream closed by server"),
        };
        let events = match decoder.push(&chunk) {
            Ok(events) => events,
            Err(e) => return e,
        };
        for event in events {
            if triggers_refresh(&event) {
                shared.notify();
            } else {
                tracing::trace!(subscription = %id, event = event.event_type(), "ignored event");
            }
        }
    }
}

/// A live-state subscription held by one view.
///
/// Dropping it unsubscribes.
pub struct Subscription {
    id: Uuid,
    url: Url,
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
    liveness: watch::Receiver<bool>,
}

impl Subscription {
    /// Returns the subscription id used in logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the endpoint URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns `true` while the channel is open.
    pub fn is_active(&self) -> bool {
        *self.liveness.borrow()
    }

    /// Returns a receiver that observes liveness changes.
    pub fn liveness(&self) -> watch::Receiver<bool> {
        self.liveness.clone()
    }

    /// Removes the callback and closes the channel. Idempotent.
    ///
    /// Once this returns the callback will not be called again. Calling it
    /// from inside the callback is allowed.
    pub fn unsubscribe(&self) {
        let removed = {
            let guard = self.shared.listener.lock();
            let removed = guard.borrow_mut().take().is_some();
            self.shared.liveness.send_replace(false);
            removed
        };
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        if removed {
            tracing::debug!(subscription = %self.id, "stream subscription closed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("url", &self.url.as_str())
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
