//! # capgate
//!
//! Authenticated session and capability gateway for REST dashboards.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use capgate::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), capgate::Error> {
//!     let gateway = Gateway::builder()
//!         .url("http://localhost:12000")
//!         .auth(AuthConfig::new("http://localhost:11000/token", "capgate")?)
//!         .build()?;
//!
//!     gateway.login(&LoginCredentials::new("alice", "pw")).await?;
//!
//!     // Every call carries the bearer token and survives one expired token.
//!     let entity: Entity = gateway
//!         .pipeline()
//!         .execute(&ApiRequest::get("/npl/document/Document/d1/"))
//!         .await?;
//!
//!     // Which of the declared actions may the caller perform on it?
//!     let declared = vec![
//!         ActionDescriptor::builder().name("edit").label("Edit").build(),
//!         ActionDescriptor::builder().name("approve").label("Approve").build(),
//!     ];
//!     for action in available_actions(&declared, &entity.actions) {
//!         println!("{}", action.label());
//!     }
//!
//!     // Re-fetch whenever the server reports a state change.
//!     let subscription = gateway.subscribe_states(|| println!("refresh"))?;
//!     subscription.unsubscribe();
//!     Ok(())
//! }
//! ```
//!
//! ## Key Concepts
//!
//! - **One session context**: [`Gateway`] shares a single [`SessionManager`]
//!   between the request pipeline and the stream manager.
//! - **Retry once**: a 401 triggers one refresh and one re-issue; concurrent
//!   401s share the refresh.
//! - **Server-driven capabilities**: an action is available iff the entity's
//!   `@actions` map lists it.
//! - **No reconnect**: a failed push channel stays closed until the view
//!   subscribes again.
//!
//! ## Features
//!
//! - `rustls` (default): Use rustls for TLS
//! - `native-tls`: Use native TLS (OpenSSL on Linux, Secure Transport on macOS)

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

// Core modules
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod resource;
pub mod session;
pub mod stream;

// Testing utilities
pub mod testing;

// Prelude for convenient imports
pub mod prelude;

mod user_agent;

// Re-export main types at crate root for convenience
pub use client::{Gateway, GatewayBuilder};
pub use error::{Error, ErrorKind, Result};

pub use auth::{AuthorizationFlow, LoginCredentials, TokenEndpoint, TokenResponse, User};
pub use config::{AuthConfig, HttpConfig, RuntimeConfig};
pub use pipeline::{ApiRequest, RequestPipeline};
pub use resource::{
    ActionDescriptor, CapabilityMap, Entity, Page, ResourceDefinition, ResourceRegistry,
    available_actions, is_action_available,
};
pub use session::{CredentialStore, FileStore, KeyValueStore, MemoryStore, Session, SessionManager};
pub use stream::{StreamManager, Subscription};
