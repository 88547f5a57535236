//! Resource types, their declared actions, and the capability gate.
//!
//! A [`ResourceDefinition`] is declared once per resource type and lists the
//! [`ActionDescriptor`]s the dashboard knows about. Each fetched [`Entity`]
//! carries a [`CapabilityMap`]; [`available_actions`] intersects the two.

mod action;
mod definition;
mod entity;
mod gate;
mod registry;

pub use action::{
    ActionDescriptor, ActionFuture, ActionInvoker, PostToHandle, RequiredFields, ShapeValidator,
};
pub use definition::{Align, Column, ColumnSource, ResourceDefinition};
pub use entity::{ActionHandle, CapabilityMap, Entity, Page, Party};
pub use gate::{available_actions, is_action_available};
pub use registry::ResourceRegistry;
