//! Testing utilities for applications built on the gateway.
//!
//! - [`MockAuthorizationFlow`]: a scripted, counting token server stand-in
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use capgate::testing::MockAuthorizationFlow;
//! use capgate::{CredentialStore, SessionManager};
//!
//! let flow = Arc::new(MockAuthorizationFlow::new().with_user("alice", "pw"));
//! let sessions = SessionManager::new(flow, CredentialStore::in_memory());
//! assert!(!sessions.is_authenticated());
//! ```

mod mock_flow;

pub use mock_flow::MockAuthorizationFlow;
