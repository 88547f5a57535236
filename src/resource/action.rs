//! Action descriptors: what a resource type declares it can do.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use super::ActionHandle;
use crate::pipeline::{ApiRequest, RequestPipeline};
use crate::Error;

/// Boxed future returned by [`ActionInvoker::invoke`].
pub type ActionFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, Error>> + Send + 'a>>;

/// Checks that a JSON value has the expected shape.
///
/// This is the hook for schema validation. Any closure
/// `Fn(&Value) -> Result<(), String>` is a validator.
pub trait ShapeValidator: Send + Sync {
    /// Returns a description of the first violation, if any.
    fn validate(&self, value: &Value) -> Result<(), String>;
}

impl<F> ShapeValidator for F
where
    F: Fn(&Value) -> Result<(), String> + Send + Sync,
{
    fn validate(&self, value: &Value) -> Result<(), String> {
        self(value)
    }
}

/// Requires a JSON object with the listed keys present.
#[derive(Debug, Clone)]
pub struct RequiredFields(Vec<String>);

impl RequiredFields {
    /// Creates a validator requiring `fields`.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(fields.into_iter().map(Into::into).collect())
    }
}

impl ShapeValidator for RequiredFields {
    fn validate(&self, value: &Value) -> Result<(), String> {
        let object = value.as_object().ok_or("expected a JSON object")?;
        match self.0.iter().find(|f| !object.contains_key(f.as_str())) {
            Some(missing) => Err(format!("missing field `{}`", missing)),
            None => Ok(()),
        }
    }
}

/// Performs an action through its capability handle.
pub trait ActionInvoker: Send + Sync {
    /// Invokes the action at `handle` with an optional payload.
    fn invoke<'a>(
        &'a self,
        pipeline: &'a RequestPipeline,
        handle: &'a ActionHandle,
        payload: Option<Value>,
    ) -> ActionFuture<'a>;
}

/// POSTs the payload as JSON to the handle URL and returns the JSON reply.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostToHandle;

impl ActionInvoker for PostToHandle {
    fn invoke<'a>(
        &'a self,
        pipeline: &'a RequestPipeline,
        handle: &'a ActionHandle,
        payload: Option<Value>,
    ) -> ActionFuture<'a> {
        Box::pin(async move {
            let mut request = ApiRequest::post(handle.as_str());
            if let Some(payload) = payload {
                request = request.with_body(payload);
            }
            pipeline.execute(&request).await
        })
    }
}

/// A named operation a resource type declares.
///
/// Whether it can be invoked on a given entity is decided by the entity's
/// capability map, not by the descriptor.
///
/// ## Example
///
/// ```rust
/// use capgate::resource::{ActionDescriptor, RequiredFields};
///
/// let approve = ActionDescriptor::builder()
///     .name("approve")
///     .label("Approve")
///     .requires_confirmation(true)
///     .confirmation_message("Are you sure you want to approve this document?")
///     .build();
///
/// let edit = ActionDescriptor::builder()
///     .name("edit")
///     .label("Edit Document")
///     .payload_shape(RequiredFields::new(["content"]))
///     .build();
///
/// assert!(approve.requires_confirmation());
/// assert!(edit.validate_payload(Some(&serde_json::json!({}))).is_err());
/// ```
#[derive(bon::Builder)]
pub struct ActionDescriptor {
    #[builder(into)]
    name: String,
    #[builder(into)]
    label: String,
    #[builder(into)]
    description: Option<String>,
    #[builder(with = |v: impl ShapeValidator + 'static| Arc::new(v) as Arc<dyn ShapeValidator>)]
    payload_shape: Option<Arc<dyn ShapeValidator>>,
    #[builder(with = |v: impl ShapeValidator + 'static| Arc::new(v) as Arc<dyn ShapeValidator>)]
    result_shape: Option<Arc<dyn ShapeValidator>>,
    #[builder(default = false)]
    requires_confirmation: bool,
    #[builder(into)]
    confirmation_message: Option<String>,
    #[builder(
        default = Arc::new(PostToHandle) as Arc<dyn ActionInvoker>,
        with = |v: impl ActionInvoker + 'static| Arc::new(v) as Arc<dyn ActionInvoker>
    )]
    invoker: Arc<dyn ActionInvoker>,
}

impl ActionDescriptor {
    /// Returns the action name, the key looked up in capability maps.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the display label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns whether the user must confirm before invoking.
    pub fn requires_confirmation(&self) -> bool {
        self.requires_confirmation
    }

    /// Returns the confirmation prompt.
    pub fn confirmation_message(&self) -> Option<&str> {
        self.confirmation_message.as_deref()
    }

    /// Returns the invoker.
    pub fn invoker(&self) -> &dyn ActionInvoker {
        self.invoker.as_ref()
    }

    /// Checks the payload against the declared payload shape.
    ///
    /// # Errors
    ///
    /// Returns `SchemaViolation` if a shape is declared and the payload is
    /// missing or does not match.
    pub fn validate_payload(&self, payload: Option<&Value>) -> Result<(), Error> {
        let Some(shape) = &self.payload_shape else {
            return Ok(());
        };
        let payload = payload.ok_or_else(|| {
            Error::schema_violation(format!("Action `{}` requires a payload", self.name))
        })?;
        shape.validate(payload).map_err(|reason| {
            Error::schema_violation(format!("Invalid payload for `{}`: {}", self.name, reason))
        })
    }

    /// Checks a result against the declared result shape.
    ///
    /// # Errors
    ///
    /// Returns `SchemaViolation` if a shape is declared and does not match.
    pub fn validate_result(&self, result: &Value) -> Result<(), Error> {
        match &self.result_shape {
            Some(shape) => shape.validate(result).map_err(|reason| {
                Error::schema_violation(format!("Invalid result of `{}`: {}", self.name, reason))
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("description", &self.description)
            .field("payload_shape", &self.payload_shape.is_some())
            .field("result_shape", &self.result_shape.is_some())
            .field("requires_confirmation", &self.requires_confirmation)
            .field("confirmation_message", &self.confirmation_message)
            .finish_non_exhaustive()
    }
}
