//! User-Agent header sent on every token, API and stream request.

use std::sync::OnceLock;

const CRATE_NAME: &str = "capgate";

const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

static USER_AGENT: OnceLock<String> = OnceLock::new();

/// Returns the User-Agent string, computed once.
///
/// Format: `capgate/0.1.0 (rust/1.92; linux/x86_64)`
pub fn user_agent() -> &'static str {
    USER_AGENT.get_or_init(|| {
        format!(
            "{}/{} ({}; {}/{})",
            CRATE_NAME,
            CRATE_VERSION,
            rust_version(),
            os_name(),
            std::env::consts::ARCH,
        )
    })
}

fn rust_version() -> &'static str {
    concat!("rust/", env!("CARGO_PKG_RUST_VERSION"))
}

fn os_name() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        os => os,
    }
}
