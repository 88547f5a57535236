//! The capability gate: which declared actions an entity allows.

use super::{ActionDescriptor, CapabilityMap};

/// Returns the declared actions whose names appear in `capabilities`, in
/// declaration order.
///
/// This is a pure lookup. Nothing is cached and the server's map is the only
/// input that decides availability.
///
/// ```rust
/// use capgate::resource::{ActionDescriptor, CapabilityMap, available_actions};
///
/// let declared = vec![
///     ActionDescriptor::builder().name("edit").label("Edit").build(),
///     ActionDescriptor::builder().name("approve").label("Approve").build(),
/// ];
/// let capabilities: CapabilityMap = [("edit", "/d1/edit")].into_iter().collect();
///
/// let names: Vec<_> = available_actions(&declared, &capabilities)
///     .iter()
///     .map(|a| a.name())
///     .collect();
/// assert_eq!(names, ["edit"]);
/// ```
pub fn available_actions<'a>(
    declared: &'a [ActionDescriptor],
    capabilities: &CapabilityMap,
) -> Vec<&'a ActionDescriptor> {
    declared
        .iter()
        .filter(|action| capabilities.contains(action.name()))
        .collect()
}

/// Returns `true` if `capabilities` permits `action`.
pub fn is_action_available(action: &str, capabilities: &CapabilityMap) -> bool {
    capabilities.contains(action)
}
