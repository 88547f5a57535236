//! Common test harness for capgate integration tests.
//!
//! Provides a scripted OAuth token endpoint on a wiremock server, a gateway
//! wired to it, and a minimal hand-driven SSE server.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use anyhow::{Context, Result};
use capgate::{AuthConfig, CredentialStore, Gateway};
use parking_lot::Mutex;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    sync::mpsc,
};
use wiremock::{
    Mock, MockServer, Request, Respond, ResponseTemplate,
    matchers::{method, path},
};

pub const USERNAME: &str = "alice";
pub const PASSWORD: &str = "pw";
pub const TOKEN_PATH: &str = "/token";

static TRACING: OnceLock<()> = OnceLock::new();

/// Installs a test subscriber once; filter with `RUST_LOG`.
pub fn init_tracing() {
    TRACING.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Token endpoint behaviour shared between the responder and the test.
#[derive(Default)]
pub struct TokenServerState {
    issued: AtomicUsize,
    password_grants: AtomicUsize,
    refresh_grants: AtomicUsize,
    fail_refresh: AtomicBool,
    refresh_delay: Mutex<Option<Duration>>,
    expires_in: Mutex<Option<u64>>,
}

impl TokenServerState {
    pub fn password_grants(&self) -> usize {
        self.password_grants.load(Ordering::SeqCst)
    }

    pub fn refresh_grants(&self) -> usize {
        self.refresh_grants.load(Ordering::SeqCst)
    }

    pub fn fail_refresh(&self, fail: bool) {
        self.fail_refresh.store(fail, Ordering::SeqCst);
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock() = Some(delay);
    }

    pub fn set_expires_in(&self, expires_in: Option<u64>) {
        *self.expires_in.lock() = expires_in;
    }

    fn issue(&self) -> ResponseTemplate {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let mut body = serde_json::json!({
            "access_token": format!("A{}", n),
            "refresh_token": format!("R{}", n),
            "token_type": "Bearer",
        });
        if let Some(expires_in) = *self.expires_in.lock() {
            body["expires_in"] = expires_in.into();
        }
        ResponseTemplate::new(200).set_body_json(body)
    }
}

struct TokenResponder(Arc<TokenServerState>);

fn oauth_error(status: u16, error: &str, description: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(serde_json::json!({
        "error": error,
        "error_description": description,
    }))
}

impl Respond for TokenResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let params: HashMap<String, String> = url::form_urlencoded::parse(&request.body)
            .into_owned()
            .collect();
        let state = &self.0;

        match params.get("grant_type").map(String::as_str) {
            Some("password") => {
                state.password_grants.fetch_add(1, Ordering::SeqCst);
                let valid = params.get("username").map(String::as_str) == Some(USERNAME)
                    && params.get("password").map(String::as_str) == Some(PASSWORD);
                if valid {
                    state.issue()
                } else {
                    oauth_error(401, "invalid_grant", "Invalid user credentials")
                }
            }
            Some("refresh_token") => {
                state.refresh_grants.fetch_add(1, Ordering::SeqCst);
                let delay = *state.refresh_delay.lock();
                let response = if state.fail_refresh.load(Ordering::SeqCst) {
                    oauth_error(400, "invalid_grant", "Token is not active")
                } else {
                    state.issue()
                };
                match delay {
                    Some(delay) => response.set_delay(delay),
                    None => response,
                }
            }
            _ => oauth_error(400, "unsupported_grant_type", "Unsupported grant type"),
        }
    }
}

/// Mounts the scripted token endpoint at [`TOKEN_PATH`].
pub async fn mount_token_endpoint(server: &MockServer) -> Arc<TokenServerState> {
    let state = Arc::new(TokenServerState::default());
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(TokenResponder(Arc::clone(&state)))
        .mount(server)
        .await;
    state
}

/// Builds a gateway whose API and token endpoint both live on `server`.
pub fn gateway(server: &MockServer, store: CredentialStore) -> Result<Gateway> {
    init_tracing();
    let auth = AuthConfig::new(format!("{}{}", server.uri(), TOKEN_PATH), "capgate")?;
    Gateway::builder()
        .url(server.uri())
        .auth(auth)
        .credential_store(store)
        .timeout(Duration::from_secs(5))
        .build()
        .context("gateway should build")
}

/// Polls `condition` for up to five seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// What the SSE test server should do next on the open connection.
pub enum Frame {
    /// Write raw event text.
    Raw(String),
    /// Close the connection.
    Close,
}

/// A one-connection SSE server driven from the test.
pub struct SseServer {
    pub addr: SocketAddr,
    pub connections: Arc<AtomicUsize>,
    pub disconnected: Arc<AtomicBool>,
    pub last_request: Arc<Mutex<Option<String>>>,
    frames: mpsc::UnboundedSender<Frame>,
}

impl SseServer {
    /// Starts a server answering with `status`; 200 streams frames.
    pub async fn start(status: u16) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let connections = Arc::new(AtomicUsize::new(0));
        let disconnected = Arc::new(AtomicBool::new(false));
        let last_request = Arc::new(Mutex::new(None));
        let (frames, receiver) = mpsc::unbounded_channel();

        let accepted = Arc::clone(&connections);
        let captured = Arc::clone(&last_request);
        let closed = Arc::clone(&disconnected);
        tokio::spawn(async move {
            let mut receiver = Some(receiver);
            while let Ok((mut socket, _)) = listener.accept().await {
                accepted.fetch_add(1, Ordering::SeqCst);

                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                *captured.lock() = Some(String::from_utf8_lossy(&head).into_owned());

                if status != 200 {
                    let _ = socket
                        .write_all(
                            format!(
                                "HTTP/1.1 {} Rejected\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                                status
                            )
                            .as_bytes(),
                        )
                        .await;
                    continue;
                }

                let Some(mut frames) = receiver.take() else {
                    continue;
                };
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n",
                    )
                    .await;
                let closed = Arc::clone(&closed);
                tokio::spawn(async move {
                    let (mut reader, mut writer) = socket.into_split();
                    let mut scratch = [0u8; 64];
                    loop {
                        tokio::select! {
                            frame = frames.recv() => match frame {
                                Some(Frame::Raw(text)) => {
                                    if writer.write_all(text.as_bytes()).await.is_err() {
                                        break;
                                    }
                                    let _ = writer.flush().await;
                                }
                                Some(Frame::Close) | None => {
                                    let _ = writer.shutdown().await;
                                    return;
                                }
                            },
                            read = reader.read(&mut scratch) => {
                                if matches!(read, Ok(0) | Err(_)) {
                                    break;
                                }
                            }
                        }
                    }
                    closed.store(true, Ordering::SeqCst);
                });
            }
        });

        Ok(Self {
            addr,
            connections,
            disconnected,
            last_request,
            frames,
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn send(&self, text: &str) {
        let _ = self.frames.send(Frame::Raw(text.to_string()));
    }

    pub fn close(&self) {
        let _ = self.frames.send(Frame::Close);
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Returns `true` once the client has hung up.
    pub fn client_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}
