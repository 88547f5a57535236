//! Configuration types for the gateway.
//!
//! This module provides configuration for:
//! - [`RuntimeConfig`]: login mode, deployment target and URLs from the environment
//! - [`AuthConfig`]: token endpoint and OAuth client id
//! - [`HttpConfig`]: timeouts and TLS settings for the shared HTTP client

mod http;
mod runtime;

pub use http::HttpConfig;
pub use runtime::{
    AuthConfig, DEFAULT_CLIENT_ID, DeploymentTarget, ENV_PREFIX, LoginMode, RuntimeConfig,
};
