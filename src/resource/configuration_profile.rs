//! Configuration profile resource - converge a stored profile to a local payload

use anyhow::{Context, Result};
use log::{debug, info, warn};
use plistkit::{ConfigurationProfile, ContentHash, PayloadScope, Reconciler, content_hash};
use std::path::Path;
use std::sync::Arc;

use super::{ApplyContext, ApplyResult, Resource, ResourceState};
use crate::config::{KindPolicy, KindSettings, ProfileKind};
use crate::store::ProfileStore;

/// A profile that should exist in the store with the given content
#[derive(Debug)]
pub struct ConfigurationProfileResource {
    name: String,
    kind: ProfileKind,
    payload: String,
    level: Option<PayloadScope>,
    /// Canonical hash of `payload` under the kind's ignore list
    desired: ContentHash,
    store: Arc<dyn ProfileStore>,
    settings: Arc<KindSettings>,
}

impl ConfigurationProfileResource {
    pub fn new(
        name: &str,
        kind: ProfileKind,
        payload: String,
        store: Arc<dyn ProfileStore>,
        settings: Arc<KindSettings>,
    ) -> Result<Self> {
        let desired = content_hash(&payload, &settings.for_kind(kind).strip)
            .with_context(|| format!("Cannot canonicalize payload of '{name}'"))?;
        Ok(Self {
            name: name.to_string(),
            kind,
            payload,
            level: None,
            desired,
            store,
            settings,
        })
    }

    /// Load the payload from a file
    pub fn from_file(
        name: &str,
        kind: ProfileKind,
        path: &Path,
        store: Arc<dyn ProfileStore>,
        settings: Arc<KindSettings>,
    ) -> Result<Self> {
        let payload = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read payload: {}", path.display()))?;
        Self::new(name, kind, payload, store, settings)
    }

    pub fn with_level(mut self, level: Option<PayloadScope>) -> Self {
        self.level = level;
        self
    }

    fn policy(&self) -> &KindPolicy {
        self.settings.for_kind(self.kind)
    }

    /// Validation gate run before anything is sent
    fn check_payload(&self) -> Result<()> {
        let profile = ConfigurationProfile::parse(&self.payload)?;
        for warning in profile.validate().into_result()? {
            debug!("{}: {warning}", self.name);
        }
        if let Some(level) = self.level {
            profile.check_scope(level)?;
        }
        Ok(())
    }

    /// Carry server identifiers into the local payload
    fn resolve_against(&self, trusted: &str) -> Result<String> {
        ConfigurationProfile::parse(trusted)?
            .check_root_identity()
            .with_context(|| format!("Stored profile '{}' has an inconsistent root identity", self.name))?;

        let reconciliation = Reconciler::default().reconcile(trusted, &self.payload)?;
        if self.policy().strict_parity {
            return Ok(reconciliation.into_verified()?);
        }
        for mismatch in &reconciliation.mismatches {
            warn!("{}: identifier mismatch at {mismatch}", self.name);
        }
        Ok(reconciliation.resolved)
    }
}

impl Resource for ConfigurationProfileResource {
    fn id(&self) -> String {
        self.name.clone()
    }

    fn description(&self) -> String {
        format!("{} configuration profile '{}'", self.kind.label(), self.name)
    }

    fn resource_type(&self) -> &'static str {
        self.kind.resource_type()
    }

    fn current_state(&self) -> Result<ResourceState> {
        let Some(stored) = self.store.fetch(self.kind, &self.name)? else {
            return Ok(ResourceState::Absent);
        };
        let hash = content_hash(&stored, &self.policy().strip)
            .with_context(|| format!("Cannot canonicalize stored profile '{}'", self.name))?;
        Ok(ResourceState::Present {
            details: Some(hash.short()),
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present {
            details: Some(self.desired.short()),
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if ctx.dry_run {
            return Ok(ApplyResult::Skipped {
                reason: "Dry run".into(),
            });
        }

        self.check_payload()?;

        match self.store.fetch(self.kind, &self.name)? {
            None => {
                self.store.create(self.kind, &self.name, &self.payload)?;
                info!("Created {}", self.description());
                Ok(ApplyResult::Created)
            }
            Some(trusted) => {
                let current = content_hash(&trusted, &self.policy().strip)?;
                if current == self.desired {
                    return Ok(ApplyResult::NoChange);
                }

                let resolved = self.resolve_against(&trusted)?;
                self.store.update(self.kind, &self.name, &resolved)?;
                info!("Updated {}", self.description());
                Ok(ApplyResult::Modified)
            }
        }
    }
}
