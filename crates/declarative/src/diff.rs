//! Diff computation for resources

use crate::resource::Resource;
use crate::types::ResourceState;
use anyhow::Result;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A diff between current and desired state of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDiff {
    /// Unique identifier of the resource
    pub resource_id: String,
    /// Type of the resource
    pub resource_type: String,
    /// Human-readable description
    pub description: String,
    /// Current state
    pub current: ResourceState,
    /// Desired state
    pub desired: ResourceState,
}

impl ResourceDiff {
    /// Create a diff from a resource, returning None if no changes needed
    pub fn from_resource(resource: &dyn Resource) -> Result<Option<Self>> {
        let current = resource.current_state()?;
        Ok(Self::between(resource, current))
    }

    fn between(resource: &dyn Resource, current: ResourceState) -> Option<Self> {
        let desired = resource.desired_state();
        if current == desired {
            return None;
        }

        Some(Self {
            resource_id: resource.id(),
            resource_type: resource.resource_type().to_string(),
            description: resource.description(),
            current,
            desired,
        })
    }

    /// Check if this diff represents an addition
    pub fn is_addition(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Absent, ResourceState::Present { .. })
        )
    }

    /// Check if this diff represents a modification
    pub fn is_modification(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Modified { .. }, _)
                | (_, ResourceState::Modified { .. })
                | (ResourceState::Present { .. }, ResourceState::Present { .. })
        )
    }

    /// Check if the current state could not be determined
    pub fn is_unknown(&self) -> bool {
        matches!(self.current, ResourceState::Unknown)
    }
}

/// Compute diffs for a list of resources
///
/// Returns only resources that have differences between current and desired
/// state. A resource whose current state cannot be read is reported with
/// `ResourceState::Unknown` instead of being dropped.
pub fn compute_diffs(resources: &[Box<dyn Resource>]) -> Vec<ResourceDiff> {
    resources
        .iter()
        .filter_map(|r| {
            let current = r.current_state().unwrap_or_else(|e| {
                warn!("{}: cannot read current state: {e:#}", r.id());
                ResourceState::Unknown
            });
            ResourceDiff::between(r.as_ref(), current)
        })
        .collect()
}

/// Diff summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    /// Number of resources to add
    pub additions: usize,
    /// Number of resources to modify
    pub modifications: usize,
    /// Number of resources whose state is unknown
    pub unknown: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs(diffs: &[ResourceDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            if diff.is_addition() {
                summary.additions += 1;
            } else if diff.is_unknown() {
                summary.unknown += 1;
            } else {
                summary.modifications += 1;
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.modifications + self.unknown
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group diffs by resource type, ordered by type name
pub fn group_by_type(diffs: &[ResourceDiff]) -> BTreeMap<String, Vec<&ResourceDiff>> {
    let mut groups: BTreeMap<String, Vec<&ResourceDiff>> = BTreeMap::new();
    for diff in diffs {
        groups
            .entry(diff.resource_type.clone())
            .or_default()
            .push(diff);
    }
    groups
}
