//! Typed resource calls on top of the pipeline.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{ApiRequest, RequestPipeline};
use crate::resource::{Entity, Page, ResourceDefinition};
use crate::{Error, ErrorKind};

/// Upper bound on the pages [`RequestPipeline::list_all`] will fetch.
pub const MAX_LIST_PAGES: u32 = 1_000;

impl RequestPipeline {
    /// Fetches one page of `resource`, using its default page size when
    /// `page_size` is `None`.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send) and [`execute`](Self::execute).
    pub async fn list<T: DeserializeOwned>(
        &self,
        resource: &ResourceDefinition,
        page: u32,
        page_size: Option<u32>,
    ) -> Result<Page<Entity<T>>, Error> {
        let request = ApiRequest::get(resource.list_path())
            .with_query("page", page)
            .with_query("pageSize", page_size.unwrap_or(resource.default_page_size()));
        self.execute(&request).await
    }

    /// Fetches every page of `resource`.
    ///
    /// Paging stops at an empty page, after the reported total, or, when no
    /// total is reported, at a page shorter than the page size. A server that
    /// answers with a different page number than the one requested ends the
    /// walk as well.
    ///
    /// # Errors
    ///
    /// Fails on the first failing page, and with `InvalidResponse` if the
    /// listing does not end within [`MAX_LIST_PAGES`] pages.
    pub async fn list_all<T: DeserializeOwned>(
        &self,
        resource: &ResourceDefinition,
    ) -> Result<Vec<Entity<T>>, Error> {
        let page_size = resource.default_page_size();
        let mut all = Vec::new();
        let mut page: u32 = 1;
        loop {
            let current = self.list::<T>(resource, page, Some(page_size)).await?;
            if let Some(echoed) = current.page.filter(|&echoed| echoed != page) {
                tracing::warn!(
                    resource = resource.name(),
                    requested = page,
                    echoed,
                    "server returned a different page; stopping"
                );
                return Ok(all);
            }

            let more = current.has_more_after(page, page_size);
            all.extend(current.items);
            if !more {
                return Ok(all);
            }

            page = match page.checked_add(1).filter(|&next| next <= MAX_LIST_PAGES) {
                Some(next) => next,
                None => {
                    return Err(Error::invalid_response(format!(
                        "Listing `{}` did not end within {} pages",
                        resource.name(),
                        MAX_LIST_PAGES
                    )));
                }
            };
        }
    }

    /// Fetches a single entity by id.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute); a missing entity is `NotFound`.
    pub async fn detail<T: DeserializeOwned>(
        &self,
        resource: &ResourceDefinition,
        id: &str,
    ) -> Result<Entity<T>, Error> {
        self.execute(&ApiRequest::get(resource.detail_path_for(id)))
            .await
    }

    /// Creates an entity.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the resource has no create endpoint,
    /// otherwise the same as [`execute`](Self::execute).
    pub async fn create<T, B>(&self, resource: &ResourceDefinition, body: &B) -> Result<Entity<T>, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let path = resource.create_path().ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidArgument,
                format!("Resource `{}` cannot be created", resource.name()),
            )
        })?;
        self.execute(&ApiRequest::post(path).with_json(body)?).await
    }

    /// Invokes a declared action on `entity`.
    ///
    /// The handle comes from the entity's capability map. The payload and
    /// the result are checked against the action's declared shapes.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `resource` declares no such action
    /// - `ActionUnavailable` if the entity's capability map does not list it
    /// - `SchemaViolation` if the payload or the result has the wrong shape
    /// - anything the invocation itself returns
    pub async fn invoke_action<T>(
        &self,
        resource: &ResourceDefinition,
        entity: &Entity<T>,
        action: &str,
        payload: Option<Value>,
    ) -> Result<Value, Error> {
        let descriptor = resource.action(action).ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidArgument,
                format!("Resource `{}` declares no action `{}`", resource.name(), action),
            )
        })?;
        let handle = entity
            .actions
            .get(action)
            .ok_or_else(|| Error::action_unavailable(action))?;

        descriptor.validate_payload(payload.as_ref())?;
        tracing::debug!(resource = resource.name(), entity = %entity.id, action, "invoking action");

        let result = descriptor.invoker().invoke(self, handle, payload).await?;
        descriptor.validate_result(&result)?;
        Ok(result)
    }
}
