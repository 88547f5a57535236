//! Runtime configuration loaded from the environment.

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::Error;

/// Prefix shared by every environment variable the gateway reads.
pub const ENV_PREFIX: &str = "CAPGATE_";

/// How users authenticate against the authorization server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoginMode {
    /// Keycloak realm token endpoint.
    Keycloak,
    /// Generic OIDC authority exposing `/token`.
    #[default]
    Oidc,
    /// Local development identity provider.
    DevMode,
}

impl LoginMode {
    /// Returns the environment variable spelling of this mode.
    pub fn as_env(&self) -> &'static str {
        match self {
            LoginMode::Keycloak => "KEYCLOAK",
            LoginMode::Oidc => "OIDC",
            LoginMode::DevMode => "DEV_MODE",
        }
    }
}

impl FromStr for LoginMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "KEYCLOAK" => Ok(LoginMode::Keycloak),
            "OIDC" => Ok(LoginMode::Oidc),
            "DEV_MODE" => Ok(LoginMode::DevMode),
            other => Err(Error::configuration(format!("unknown login mode '{}'", other))),
        }
    }
}

impl fmt::Display for LoginMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_env())
    }
}

/// Where the application is deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeploymentTarget {
    /// Local development stack.
    #[default]
    Local,
    /// Managed Noumena Cloud deployment.
    NoumenaCloud,
}

impl DeploymentTarget {
    /// Returns the environment variable spelling of this target.
    pub fn as_env(&self) -> &'static str {
        match self {
            DeploymentTarget::Local => "LOCAL",
            DeploymentTarget::NoumenaCloud => "NOUMENA_CLOUD",
        }
    }
}

impl FromStr for DeploymentTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOCAL" => Ok(DeploymentTarget::Local),
            "NOUMENA_CLOUD" => Ok(DeploymentTarget::NoumenaCloud),
            other => Err(Error::configuration(format!(
                "unknown deployment target '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for DeploymentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_env())
    }
}

/// Settings needed to talk to the API and the authorization server.
///
/// Variables read (shown for the `LOCAL` target and `OIDC` mode):
///
/// | Variable                           | Meaning                          |
/// |------------------------------------|----------------------------------|
/// | `CAPGATE_LOGIN_MODE`               | `KEYCLOAK`, `OIDC` or `DEV_MODE` |
/// | `CAPGATE_DEPLOYMENT_TARGET`        | `LOCAL` or `NOUMENA_CLOUD`       |
/// | `CAPGATE_LOCAL_API_URL`            | API base URL                     |
/// | `CAPGATE_LOCAL_OIDC_AUTH_URL`      | Authorization server URL         |
/// | `CAPGATE_APPLICATION_NAME`         | Realm and client id (OIDC/Keycloak) |
/// | `CAPGATE_CLIENT_ID`                | Explicit client id override      |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// API base URL.
    pub api_base_url: Url,
    /// Authorization server URL.
    pub auth_url: Url,
    /// Keycloak realm, if any.
    pub realm: Option<String>,
    /// OAuth client id sent with every grant.
    pub client_id: String,
    /// Selected login mode.
    pub login_mode: LoginMode,
    /// Selected deployment target.
    pub deployment_target: DeploymentTarget,
}

/// Client id used when neither the application name nor an override is set.
pub const DEFAULT_CLIENT_ID: &str = "capgate";

impl RuntimeConfig {
    /// Loads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if a required URL is missing or
    /// malformed, or if `DEV_MODE` is combined with `NOUMENA_CLOUD`.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through an arbitrary variable lookup.
    ///
    /// ```rust
    /// use std::collections::HashMap;
    /// use capgate::config::{LoginMode, RuntimeConfig};
    ///
    /// let vars = HashMap::from([
    ///     ("CAPGATE_LOCAL_API_URL", "http://localhost:12000"),
    ///     ("CAPGATE_LOCAL_OIDC_AUTH_URL", "http://localhost:11000"),
    ///     ("CAPGATE_APPLICATION_NAME", "documents"),
    /// ]);
    ///
    /// let config = RuntimeConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
    /// assert_eq!(config.login_mode, LoginMode::Oidc);
    /// assert_eq!(config.client_id, "documents");
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.trim().is_empty())
        };

        let login_mode = var("LOGIN_MODE")
            .map(|v| v.parse::<LoginMode>())
            .transpose()?
            .unwrap_or_default();
        let deployment_target = var("DEPLOYMENT_TARGET")
            .map(|v| v.parse::<DeploymentTarget>())
            .transpose()?
            .unwrap_or_default();

        if deployment_target == DeploymentTarget::NoumenaCloud && login_mode == LoginMode::DevMode
        {
            return Err(Error::configuration(
                "DEV_MODE login is not supported for NOUMENA_CLOUD deployment target",
            ));
        }

        let api_key = format!("{}_API_URL", deployment_target.as_env());
        let auth_key = format!(
            "{}_{}_AUTH_URL",
            deployment_target.as_env(),
            login_mode.as_env()
        );

        let api_base_url = required_url(&api_key, var(&api_key))?;
        let auth_url = required_url(&auth_key, var(&auth_key))?;

        let app_name = var("APPLICATION_NAME");
        let realm = match login_mode {
            LoginMode::Oidc | LoginMode::Keycloak => app_name.clone(),
            LoginMode::DevMode => None,
        };
        if login_mode == LoginMode::Keycloak && realm.is_none() {
            return Err(Error::configuration(format!(
                "{}APPLICATION_NAME is required for KEYCLOAK login",
                ENV_PREFIX
            )));
        }

        let client_id = var("CLIENT_ID")
            .or(realm.clone())
            .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string());

        let config = Self {
            api_base_url,
            auth_url,
            realm,
            client_id,
            login_mode,
            deployment_target,
        };

        tracing::info!(
            login_mode = %config.login_mode,
            deployment_target = %config.deployment_target,
            api_base_url = %config.api_base_url,
            "loaded runtime configuration"
        );

        Ok(config)
    }

    /// Derives the token endpoint settings for the configured login mode.
    pub fn auth_config(&self) -> Result<AuthConfig, Error> {
        let base = self.auth_url.as_str().trim_end_matches('/');
        let endpoint = match (self.login_mode, &self.realm) {
            (LoginMode::Keycloak, Some(realm)) => format!(
                "{}/realms/{}/protocol/openid-connect/token",
                base,
                urlencoding::encode(realm)
            ),
            _ => format!("{}/token", base),
        };

        Ok(AuthConfig {
            token_endpoint: Url::parse(&endpoint)?,
            client_id: self.client_id.clone(),
        })
    }
}

fn required_url(name: &str, value: Option<String>) -> Result<Url, Error> {
    let value = value.ok_or_else(|| {
        Error::configuration(format!("{}{} is not configured", ENV_PREFIX, name))
    })?;
    Url::parse(&value).map_err(|e| {
        Error::configuration(format!("{}{} is not a valid URL: {}", ENV_PREFIX, name, e))
            .with_source(e)
    })
}

/// Token endpoint settings used by the authorization flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Absolute URL of the OAuth token endpoint.
    pub token_endpoint: Url,
    /// OAuth client id.
    pub client_id: String,
}

impl AuthConfig {
    /// Creates auth settings from an explicit token endpoint.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if the endpoint is not a URL or the
    /// client id is empty.
    pub fn new(token_endpoint: impl AsRef<str>, client_id: impl Into<String>) -> Result<Self, Error> {
        let client_id = client_id.into();
        if client_id.trim().is_empty() {
            return Err(Error::configuration("client id must not be empty"));
        }
        Ok(Self {
            token_endpoint: Url::parse(token_endpoint.as_ref())?,
            client_id,
        })
    }
}
