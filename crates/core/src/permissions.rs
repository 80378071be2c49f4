//! Page capabilities and the permission oracle seam.
//!
//! Capability names must match the ones issued by the admin backend. Checks
//! here only keep the editor from sending requests that would be refused;
//! the server enforces authorization independently.

use std::collections::HashSet;

use crate::error::CoreError;

/// Known capability names.
pub mod capabilities {
    pub const PAGES_VIEW: &str = "pages:view";
    pub const PAGES_EDIT: &str = "pages:edit";
    pub const PAGES_APPROVE: &str = "pages:approve";
    pub const PAGES_PUBLISH: &str = "pages:publish";
    pub const PAGES_SCHEDULE: &str = "pages:schedule";
    pub const PAGES_BULK_PUBLISH: &str = "pages:bulk-publish";
}

/// The set of all known capabilities.
pub const ALL_CAPABILITIES: &[&str] = &[
    capabilities::PAGES_VIEW,
    capabilities::PAGES_EDIT,
    capabilities::PAGES_APPROVE,
    capabilities::PAGES_PUBLISH,
    capabilities::PAGES_SCHEDULE,
    capabilities::PAGES_BULK_PUBLISH,
];

/// Answers whether the current operator holds a capability.
pub trait PermissionOracle: Send + Sync {
    fn can(&self, capability: &str) -> bool;

    fn can_any(&self, capabilities: &[&str]) -> bool {
        capabilities.iter().any(|c| self.can(c))
    }
}

/// Reject with a read-only notice unless the oracle grants one of
/// `capabilities`.
pub fn require_any(
    oracle: &dyn PermissionOracle,
    capabilities: &[&str],
    action: &str,
) -> Result<(), CoreError> {
    if oracle.can_any(capabilities) {
        return Ok(());
    }
    Err(CoreError::Forbidden(format!(
        "Read-only: {action} requires {}",
        capabilities.join(" or ")
    )))
}

/// A fixed set of granted capabilities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    granted: HashSet<String>,
}

impl CapabilitySet {
    /// Every known capability.
    pub fn all() -> Self {
        ALL_CAPABILITIES.iter().copied().collect()
    }

    /// Parse a comma-separated list such as `pages:view,pages:edit`.
    ///
    /// Unknown names are rejected so typos do not silently drop a grant.
    pub fn parse(list: &str) -> Result<Self, CoreError> {
        let mut granted = HashSet::new();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if !ALL_CAPABILITIES.contains(&name) {
                return Err(CoreError::Validation(format!(
                    "Unknown capability '{name}'. Must be one of: {}",
                    ALL_CAPABILITIES.join(", ")
                )));
            }
            granted.insert(name.to_string());
        }
        Ok(Self { granted })
    }

    pub fn len(&self) -> usize {
        self.granted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.granted.is_empty()
    }
}

impl<'a> FromIterator<&'a str> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self {
            granted: iter.into_iter().map(str::to_string).collect(),
        }
    }
}

impl PermissionOracle for CapabilitySet {
    fn can(&self, capability: &str) -> bool {
        self.granted.contains(capability)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::capabilities::*;
    use super::*;

    #[test]
    fn parse_comma_separated_list() {
        let set = CapabilitySet::parse("pages:view, pages:edit,").unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.can(PAGES_EDIT));
        assert!(!set.can(PAGES_PUBLISH));
    }

    #[test]
    fn parse_rejects_unknown_capability() {
        let err = CapabilitySet::parse("pages:view,pages:delete").unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("pages:delete"));
    }

    #[test]
    fn all_grants_every_capability() {
        let set = CapabilitySet::all();
        assert!(ALL_CAPABILITIES.iter().all(|c| set.can(c)));
    }

    #[test]
    fn require_any_passes_with_one_grant() {
        let set: CapabilitySet = [PAGES_PUBLISH].into_iter().collect();
        assert!(require_any(&set, &[PAGES_SCHEDULE, PAGES_PUBLISH], "cancel schedule").is_ok());
    }

    #[test]
    fn require_any_reports_read_only() {
        let set = CapabilitySet::default();
        let err = require_any(&set, &[PAGES_EDIT], "save draft").unwrap_err();
        assert_matches!(err, CoreError::Forbidden(msg) if msg.starts_with("Read-only") && msg.contains("pages:edit"));
    }
}
