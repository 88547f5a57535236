//! HTTP client configuration shared by every outbound connection.

use std::time::Duration;

use crate::Error;
use crate::user_agent;

/// Configuration for the HTTP client used by the token endpoint, the request
/// pipeline and the stream manager.
///
/// The request timeout applies to ordinary calls only. Push channels are
/// long-lived and are exempt from it.
///
/// ## Example
///
/// ```rust
/// use capgate::config::HttpConfig;
/// use std::time::Duration;
///
/// let config = HttpConfig::builder()
///     .request_timeout(Duration::from_secs(10))
///     .build();
/// assert!(!config.accept_invalid_certs);
/// ```
#[derive(Debug, Clone, bon::Builder)]
pub struct HttpConfig {
    /// Timeout for a single API or token request.
    #[builder(default = Duration::from_secs(30))]
    pub request_timeout: Duration,

    /// Timeout for establishing a TCP/TLS connection.
    #[builder(default = Duration::from_secs(10))]
    pub connect_timeout: Duration,

    /// Additional CA certificate in PEM form.
    #[builder(into)]
    pub ca_cert_pem: Option<String>,

    /// Whether to accept invalid certificates.
    ///
    /// **WARNING**: only for local development against self-signed servers.
    #[builder(default = false)]
    pub accept_invalid_certs: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl HttpConfig {
    /// Creates a configuration that accepts self-signed certificates.
    pub fn insecure() -> Self {
        Self::builder().accept_invalid_certs(true).build()
    }

    /// Builds the shared `reqwest` client.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if the CA certificate is malformed or
    /// the TLS backend cannot be initialized.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(user_agent::user_agent());

        if self.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(ref pem) = self.ca_cert_pem {
            let cert = reqwest::Certificate::from_pem(pem.as_bytes()).map_err(|e| {
                Error::configuration(format!("Invalid CA certificate PEM: {}", e))
            })?;
            builder = builder.add_root_certificate(cert);
        }

        builder
            .build()
            .map_err(|e| Error::configuration(format!("Failed to create HTTP client: {}", e)))
    }
}
