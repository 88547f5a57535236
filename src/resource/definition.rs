//! Resource definitions: display metadata, endpoints, columns and actions.

use serde_json::Value;

use super::ActionDescriptor;

/// Where a column reads its value from in an entity's JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSource {
    /// The `@id` field.
    Id,
    /// The `@state` field.
    State,
    /// A party from `@parties`, by role name.
    Party(String),
    /// A JSON pointer into the entity, e.g. `/content`.
    Pointer(String),
}

/// Horizontal alignment of a column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Align {
    /// Left aligned.
    #[default]
    Left,
    /// Centered.
    Center,
    /// Right aligned.
    Right,
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Eq, bon::Builder)]
pub struct Column {
    /// Stable column key.
    #[builder(into)]
    pub key: String,
    /// Header label.
    #[builder(into)]
    pub label: String,
    /// Value source.
    pub source: ColumnSource,
    /// CSS width, if fixed.
    #[builder(into)]
    pub width: Option<String>,
    /// Alignment.
    #[builder(default)]
    pub align: Align,
}

impl Column {
    /// Extracts this column's value from an entity's JSON representation.
    pub fn value<'a>(&self, entity: &'a Value) -> Option<&'a Value> {
        match &self.source {
            ColumnSource::Id => entity.get("@id"),
            ColumnSource::State => entity.get("@state"),
            ColumnSource::Party(role) => entity.get("@parties").and_then(|p| p.get(role)),
            ColumnSource::Pointer(pointer) => entity.pointer(pointer),
        }
    }
}

/// Everything the dashboard knows about one resource type.
///
/// `detail_path` contains an `{id}` placeholder that is replaced by the
/// percent-encoded entity id.
///
/// ## Example
///
/// ```rust
/// use capgate::resource::{ActionDescriptor, Column, ColumnSource, ResourceDefinition};
///
/// let documents = ResourceDefinition::builder()
///     .name("documents")
///     .display_name("Document")
///     .display_name_plural("Documents")
///     .reference_key("Document")
///     .list_path("/npl/document/Document/")
///     .detail_path("/npl/document/Document/{id}/")
///     .create_path("/npl/document/Document/")
///     .columns(vec![Column::builder().key("id").label("ID").source(ColumnSource::Id).build()])
///     .actions(vec![ActionDescriptor::builder().name("edit").label("Edit").build()])
///     .build();
///
/// assert_eq!(documents.detail_path_for("d 1"), "/npl/document/Document/d%201/");
/// assert!(documents.action("edit").is_some());
/// ```
#[derive(Debug, bon::Builder)]
pub struct ResourceDefinition {
    #[builder(into)]
    name: String,
    #[builder(into)]
    display_name: String,
    #[builder(into)]
    display_name_plural: String,
    #[builder(into)]
    reference_key: Option<String>,
    #[builder(into)]
    list_path: String,
    #[builder(into)]
    detail_path: String,
    #[builder(into)]
    create_path: Option<String>,
    #[builder(default)]
    columns: Vec<Column>,
    #[builder(default)]
    actions: Vec<ActionDescriptor>,
    #[builder(default = 10)]
    default_page_size: u32,
}

impl ResourceDefinition {
    /// Returns the registry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the singular display name.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns the plural display name.
    pub fn display_name_plural(&self) -> &str {
        &self.display_name_plural
    }

    /// Returns the key other resources use to reference this one.
    pub fn reference_key(&self) -> Option<&str> {
        self.reference_key.as_deref()
    }

    /// Returns the list endpoint path.
    pub fn list_path(&self) -> &str {
        &self.list_path
    }

    /// Returns the detail endpoint for entity `id`.
    pub fn detail_path_for(&self, id: &str) -> String {
        self.detail_path.replace("{id}", &urlencoding::encode(id))
    }

    /// Returns the create endpoint path, if the resource can be created.
    pub fn create_path(&self) -> Option<&str> {
        self.create_path.as_deref()
    }

    /// Returns the columns.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the declared actions in declaration order.
    pub fn actions(&self) -> &[ActionDescriptor] {
        &self.actions
    }

    /// Returns the declared action named `name`.
    pub fn action(&self, name: &str) -> Option<&ActionDescriptor> {
        self.actions.iter().find(|a| a.name() == name)
    }

    /// Returns the default page size of the list view.
    pub fn default_page_size(&self) -> u32 {
        self.default_page_size
    }
}
