//! Request descriptions and URL resolution.

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::Error;

/// A replayable description of an API call.
///
/// The pipeline may issue the same request twice (once more after a token
/// refresh), so requests are plain data rather than a consumed builder.
///
/// ## Example
///
/// ```rust
/// use capgate::ApiRequest;
///
/// let request = ApiRequest::get("/npl/document/Document/")
///     .with_query("page", "1")
///     .with_query("pageSize", "25");
/// assert_eq!(request.target(), "/npl/document/Document/");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: Method,
    target: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
}

impl ApiRequest {
    /// Creates a request. `target` is a path below the API base URL or an
    /// absolute URL on the same origin.
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Creates a GET request.
    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    /// Creates a POST request.
    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::POST, target)
    }

    /// Creates a PUT request.
    pub fn put(target: impl Into<String>) -> Self {
        Self::new(Method::PUT, target)
    }

    /// Creates a DELETE request.
    pub fn delete(target: impl Into<String>) -> Self {
        Self::new(Method::DELETE, target)
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Sets a JSON body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serializes `body` as the JSON body.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidArgument` error if `body` cannot be serialized.
    pub fn with_json<B: Serialize + ?Sized>(self, body: &B) -> Result<Self, Error> {
        let value = serde_json::to_value(body).map_err(|e| {
            Error::new(
                crate::ErrorKind::InvalidArgument,
                format!("Request body is not serializable: {}", e),
            )
        })?;
        Ok(self.with_body(value))
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the target path or URL.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the query parameters.
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// Returns the JSON body.
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub(crate) fn url(&self, base: &Url) -> Result<Url, Error> {
        let mut url = resolve_target(base, &self.target)?;
        if !self.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(self.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }
}

/// Resolves `target` against the API base URL.
///
/// Paths are appended to the base path. Absolute URLs must share the base
/// URL's origin, since the bearer token is attached to every request.
pub(crate) fn resolve_target(base: &Url, target: &str) -> Result<Url, Error> {
    if target.starts_with("http://") || target.starts_with("https://") {
        let url = Url::parse(target)?;
        if url.origin() != base.origin() {
            return Err(Error::new(
                crate::ErrorKind::InvalidArgument,
                format!(
                    "Refusing to send credentials to foreign origin {}",
                    url.origin().ascii_serialization()
                ),
            ));
        }
        return Ok(url);
    }

    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        target.trim_start_matches('/')
    );
    Ok(Url::parse(&joined)?)
}

/// Per-call retry bookkeeping.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct RequestContext {
    /// Whether the call has already been re-issued after a refresh.
    pub(crate) retried: bool,
    /// Generation of the credential attached to the latest attempt.
    pub(crate) generation: u64,
}
