//! Declarative commands for profilesync
//!
//! - `status` - Show which configured profiles are in sync with the store
//! - `diff` - Preview what apply would change
//! - `apply` - Push local payloads so the store matches them

use anyhow::{Result, bail};
use colored::Colorize;
use declarative::{
    ExecuteOptions, ExecutionPlan, Resource, ResourceDiff, ResourceState, compute_diffs, execute,
};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::Context;
use crate::config::{Config, ProfileKind};
use crate::engine::{self, PromptConfirm, TerminalProgress};
use crate::resource;
use crate::store::{DirectoryStore, ProfileStore};
use crate::ui;

/// Everything a declarative command needs, loaded once
struct Workspace {
    config: Config,
    store: Arc<dyn ProfileStore>,
}

impl Workspace {
    fn load(ctx: &Context) -> Result<Self> {
        let config = Config::load(ctx.config_path.as_deref())?;
        let store: Arc<dyn ProfileStore> = Arc::new(DirectoryStore::new(config.store_dir()?));
        Ok(Self { config, store })
    }

    fn plan(&self, target: Option<&str>) -> Result<ExecutionPlan> {
        let settings = self.config.kind_settings();
        resource::build_plan(&self.config, &self.store, &settings, target)
    }

    /// Stored profiles of `kind` with no `[[profiles]]` entry
    fn unmanaged(&self, kind: ProfileKind) -> Result<Vec<String>> {
        let managed: BTreeSet<&str> = self
            .config
            .profiles
            .iter()
            .filter(|p| p.kind == kind)
            .map(|p| p.name.as_str())
            .collect();
        Ok(self
            .store
            .list(kind)?
            .into_iter()
            .filter(|name| !managed.contains(name.as_str()))
            .collect())
    }

    fn store_display(&self) -> String {
        self.config
            .store_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "<unknown>".to_string())
    }
}

fn plan_diffs(plan: &ExecutionPlan) -> Vec<ResourceDiff> {
    let mut diffs = compute_diffs(&plan.parallel);
    diffs.extend(compute_diffs(&plan.sequential));
    diffs
}

// ============================================================================
// Status Command
// ============================================================================

pub fn status(ctx: &Context, target: Option<&str>) -> Result<()> {
    ui::header("Profile Status");

    let workspace = Workspace::load(ctx)?;
    let plan = workspace.plan(target)?;

    if plan.is_empty() {
        ui::info("No configured profiles match");
    }

    for kind in ProfileKind::ALL {
        let resources: Vec<_> = plan
            .resources()
            .filter(|r| r.resource_type() == kind.resource_type())
            .collect();
        let unmanaged = if target.is_none() {
            workspace.unmanaged(kind)?
        } else {
            Vec::new()
        };
        if resources.is_empty() && unmanaged.is_empty() {
            continue;
        }

        ui::section(engine::differ::type_label(kind.resource_type()));
        for resource in resources {
            show_resource_status(resource.as_ref(), ctx);
        }
        for name in unmanaged {
            println!("  {} {} {}", "·".dimmed(), name, "(not in config)".dimmed());
        }
    }

    if !ctx.quiet {
        println!();
        ui::kv("Store", &workspace.store_display());
    }
    Ok(())
}

fn show_resource_status(resource: &dyn Resource, ctx: &Context) {
    let desired = resource.desired_state();
    let current = resource.current_state().unwrap_or_else(|e| {
        if !ctx.quiet {
            ui::dim(&format!("{}: {e:#}", resource.id()));
        }
        ResourceState::Unknown
    });

    let (icon, label) = match &current {
        ResourceState::Absent => ("+".green(), "not in store"),
        ResourceState::Unknown => ("?".dimmed(), "unknown"),
        state if *state == desired => ("✓".green(), "in sync"),
        _ => ("~".yellow(), "drifted"),
    };

    println!("  {} {} {}", icon, resource.id().bold(), format!("({label})").dimmed());
    if ctx.verbose > 0 {
        ui::dim(&format!(
            "    stored: {}  local: {}",
            current.details().unwrap_or("-"),
            desired.details().unwrap_or("-")
        ));
    }
}

// ============================================================================
// Diff Command
// ============================================================================

pub fn diff(ctx: &Context, target: Option<&str>) -> Result<()> {
    let workspace = Workspace::load(ctx)?;
    let plan = workspace.plan(target)?;
    engine::display_diff(&plan_diffs(&plan));
    Ok(())
}

// ============================================================================
// Apply Command
// ============================================================================

pub fn apply(ctx: &Context, target: Option<&str>, dry_run: bool, jobs: usize, yes: bool) -> Result<()> {
    ui::header("Applying Profiles");

    if dry_run {
        ui::warn("Dry run - no changes will be made");
    }

    let workspace = Workspace::load(ctx)?;
    let plan = workspace.plan(target)?;

    let diffs = plan_diffs(&plan);
    engine::display_diff(&diffs);
    if diffs.is_empty() {
        return Ok(());
    }

    let opts = ExecuteOptions {
        dry_run,
        jobs: jobs.max(1),
        verbose: ctx.verbose > 0,
    };
    let mut progress = TerminalProgress::new(ctx.quiet);
    let mut confirm = PromptConfirm { assume_yes: yes };
    let summary = execute(plan, opts, &mut progress, &mut confirm)?;

    if dry_run {
        println!();
        ui::info("Dry run - no changes made");
        return Ok(());
    }
    if summary.skipped > 0 && summary.skipped == summary.total() {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }

    engine::print_summary(&summary, progress.failures());
    if !summary.is_success() {
        bail!("{} profile(s) failed to apply", summary.failed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const PAYLOAD: &str = r#"<plist version="1.0"><dict>
<key>PayloadContent</key><array/>
<key>PayloadDescription</key><string>Test</string>
<key>PayloadDisplayName</key><string>Test</string>
<key>PayloadEnabled</key><true/>
<key>PayloadIdentifier</key><string>com.example.test</string>
<key>PayloadOrganization</key><string>Example</string>
<key>PayloadRemovalDisallowed</key><false/>
<key>PayloadScope</key><string>System</string>
<key>PayloadType</key><string>Configuration</string>
<key>PayloadUUID</key><string>local</string>
<key>PayloadVersion</key><integer>1</integer>
</dict></plist>"#;

    fn setup() -> (tempfile::TempDir, Context) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("test.mobileconfig"), PAYLOAD).unwrap();
        let config = format!(
            r#"store = "{}"

[[profiles]]
name = "test"
kind = "macos"
path = "test.mobileconfig"
"#,
            dir.path().join("store").display()
        );
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, config).unwrap();

        let ctx = Context {
            verbose: 0,
            quiet: true,
            config_path: Some(config_path),
        };
        (dir, ctx)
    }

    #[test]
    fn test_apply_creates_then_converges() {
        let (dir, ctx) = setup();

        let workspace = Workspace::load(&ctx).unwrap();
        assert_eq!(plan_diffs(&workspace.plan(None).unwrap()).len(), 1);

        apply(&ctx, None, false, 2, true).unwrap();
        assert!(dir.path().join("store/macos/test.mobileconfig").exists());
        assert!(plan_diffs(&workspace.plan(None).unwrap()).is_empty());
    }

    #[test]
    fn test_dry_run_leaves_store_untouched() {
        let (dir, ctx) = setup();
        apply(&ctx, None, true, 1, true).unwrap();
        assert!(!dir.path().join("store/macos/test.mobileconfig").exists());
    }

    #[test]
    fn test_target_narrows_plan() {
        let (_dir, ctx) = setup();
        let workspace = Workspace::load(&ctx).unwrap();
        assert!(workspace.plan(Some("mobile")).unwrap().is_empty());
        assert_eq!(workspace.plan(Some("macos.test")).unwrap().total_resources(), 1);
    }

    #[test]
    fn test_unmanaged_profiles_listed() {
        let (_dir, ctx) = setup();
        let workspace = Workspace::load(&ctx).unwrap();
        workspace.store.create(ProfileKind::Macos, "legacy", PAYLOAD).unwrap();
        workspace.store.create(ProfileKind::Macos, "test", PAYLOAD).unwrap();

        assert_eq!(workspace.unmanaged(ProfileKind::Macos).unwrap(), vec!["legacy"]);
        assert!(workspace.unmanaged(ProfileKind::MobileDevice).unwrap().is_empty());
    }
}
