//! Prelude module for convenient imports.
//!
//! ```rust
//! use capgate::prelude::*;
//! ```
//!
//! This provides access to:
//! - The gateway and its builder
//! - Error types
//! - Session and credential types
//! - Resource, entity and capability types

pub use crate::{
    auth::{AuthorizationFlow, LoginCredentials, TokenResponse, User},
    client::{Gateway, GatewayBuilder},
    config::{AuthConfig, HttpConfig, RuntimeConfig},
    error::{Error, ErrorKind, Result},
    pipeline::{ApiRequest, RequestPipeline},
    resource::{
        ActionDescriptor, CapabilityMap, Entity, Page, ResourceDefinition, ResourceRegistry,
        available_actions, is_action_available,
    },
    session::{CredentialStore, FileStore, MemoryStore, Session, SessionManager},
    stream::{StreamManager, Subscription},
};
