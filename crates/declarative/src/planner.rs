//! Execution planner - builds resource execution plans

use crate::resource::{BoxedResource, Resource};

/// An execution plan with resources grouped by whether they may run
/// concurrently
#[derive(Default)]
pub struct ExecutionPlan {
    /// Resources applied on the thread pool
    pub parallel: Vec<BoxedResource>,
    /// Resources applied one at a time, in insertion order
    pub sequential: Vec<BoxedResource>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource to the plan, classifying by `can_parallelize`
    pub fn add_resource(&mut self, resource: BoxedResource) {
        if resource.can_parallelize() {
            self.parallel.push(resource);
        } else {
            self.sequential.push(resource);
        }
    }

    /// Filter plan to only include resources matching a predicate
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&dyn Resource) -> bool,
    {
        Self {
            parallel: self
                .parallel
                .into_iter()
                .filter(|r| predicate(r.as_ref()))
                .collect(),
            sequential: self
                .sequential
                .into_iter()
                .filter(|r| predicate(r.as_ref()))
                .collect(),
        }
    }

    /// Filter plan to only include resources matching a target pattern
    ///
    /// Target format: "type" or "type.name"
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (resource_type, name) = parse_target(t);
                self.filter(|r| matches_filter(r, resource_type, name))
            }
        }
    }

    /// All resources, parallel ones first
    pub fn resources(&self) -> impl Iterator<Item = &BoxedResource> {
        self.parallel.iter().chain(&self.sequential)
    }

    /// Total number of resources in the plan
    pub fn total_resources(&self) -> usize {
        self.parallel.len() + self.sequential.len()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.parallel.is_empty() && self.sequential.is_empty()
    }
}

/// Parse a target string like "type.name" into (type, name)
///
/// Only the first dot separates; names may contain dots themselves.
fn parse_target(target: &str) -> (&str, Option<&str>) {
    match target.split_once('.') {
        Some((resource_type, name)) => (resource_type, Some(name)),
        None => (target, None),
    }
}

/// Check if a resource matches the filter criteria
fn matches_filter(resource: &dyn Resource, resource_type: &str, name: Option<&str>) -> bool {
    let actual = resource.resource_type();
    // Allow common aliases
    let matches_type = match resource_type {
        "all" | "profiles" => true,
        "macos" => actual.starts_with("macos_"),
        "mobile" => actual.starts_with("mobile_device_"),
        _ => actual == resource_type || actual.starts_with(resource_type),
    };
    if !matches_type {
        return false;
    }

    if let Some(n) = name
        && resource.id() != n
    {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ApplyContext;
    use crate::types::{ApplyResult, ResourceState};
    use anyhow::Result;

    #[derive(Debug)]
    struct Named {
        id: &'static str,
        kind: &'static str,
        parallel: bool,
    }

    impl Resource for Named {
        fn id(&self) -> String {
            self.id.to_string()
        }

        fn description(&self) -> String {
            self.id.to_string()
        }

        fn resource_type(&self) -> &'static str {
            self.kind
        }

        fn current_state(&self) -> Result<ResourceState> {
            Ok(ResourceState::Absent)
        }

        fn desired_state(&self) -> ResourceState {
            ResourceState::Absent
        }

        fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
            Ok(ApplyResult::NoChange)
        }

        fn can_parallelize(&self) -> bool {
            self.parallel
        }
    }

    fn plan() -> ExecutionPlan {
        let mut plan = ExecutionPlan::new();
        for (id, kind, parallel) in [
            ("corp.wifi", "macos_configuration_profile", true),
            ("vpn", "macos_configuration_profile", false),
            ("corp.wifi", "mobile_device_configuration_profile", true),
        ] {
            plan.add_resource(Box::new(Named { id, kind, parallel }));
        }
        plan
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(parse_target("macos"), ("macos", None));
        assert_eq!(parse_target("macos.vpn"), ("macos", Some("vpn")));
        assert_eq!(parse_target("macos.corp.wifi"), ("macos", Some("corp.wifi")));
    }

    #[test]
    fn test_add_resource_classifies_by_parallelism() {
        let plan = plan();
        assert_eq!(plan.parallel.len(), 2);
        assert_eq!(plan.sequential.len(), 1);
        assert_eq!(plan.total_resources(), 3);
    }

    #[test]
    fn test_filter_by_target() {
        assert_eq!(plan().filter_by_target(None).total_resources(), 3);
        assert_eq!(plan().filter_by_target(Some("profiles")).total_resources(), 3);
        assert_eq!(plan().filter_by_target(Some("macos")).total_resources(), 2);
        assert_eq!(plan().filter_by_target(Some("mobile.corp.wifi")).total_resources(), 1);
        assert!(plan().filter_by_target(Some("macos.missing")).is_empty());
    }
}
