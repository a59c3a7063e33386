//! Resources managed by profilesync
//!
//! The trait and state types come from the `declarative` crate; this module
//! holds the profile-specific implementation and builds plans from config.

mod configuration_profile;

pub use configuration_profile::ConfigurationProfileResource;
pub use declarative::{ApplyContext, ApplyResult, Resource, ResourceState};

use anyhow::Result;
use declarative::ExecutionPlan;
use std::sync::Arc;

use crate::config::{Config, KindSettings};
use crate::store::ProfileStore;

/// One resource per `[[profiles]]` entry
pub fn build_resources(
    config: &Config,
    store: &Arc<dyn ProfileStore>,
    settings: &Arc<KindSettings>,
) -> Result<Vec<ConfigurationProfileResource>> {
    config
        .profiles
        .iter()
        .map(|entry| {
            ConfigurationProfileResource::from_file(
                &entry.name,
                entry.kind,
                &config.profile_path(entry),
                Arc::clone(store),
                Arc::clone(settings),
            )
            .map(|resource| resource.with_level(entry.level))
        })
        .collect()
}

/// Plan every configured profile, narrowed to `target`
pub fn build_plan(
    config: &Config,
    store: &Arc<dyn ProfileStore>,
    settings: &Arc<KindSettings>,
    target: Option<&str>,
) -> Result<ExecutionPlan> {
    let mut plan = ExecutionPlan::new();
    for resource in build_resources(config, store, settings)? {
        plan.add_resource(Box::new(resource));
    }
    Ok(plan.filter_by_target(target))
}
