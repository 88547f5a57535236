//! Integration tests for capgate.
//!
//! Every test runs against local servers started by the test itself: a
//! wiremock server hosts both the API and the OAuth token endpoint, and a
//! small TCP server plays the push channel.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test --test integration
//!
//! # With gateway logs
//! RUST_LOG=capgate=debug cargo test --test integration -- --nocapture
//! ```

mod capability_tests;
mod common;
mod pipeline_tests;
mod stream_tests;
