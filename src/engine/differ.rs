//! Diff display - profilesync-specific UI

use colored::Colorize;
use declarative::{DiffSummary, ResourceDiff, ResourceState, group_by_type};

/// Display a list of diffs in a user-friendly format
pub fn display_diff(diffs: &[ResourceDiff]) {
    if diffs.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Profile Diff".bold()
    );
    println!("│");

    for (resource_type, type_diffs) in group_by_type(diffs) {
        println!("│ {}", type_label(&resource_type).bold());

        for diff in type_diffs {
            let symbol = match change_symbol(diff) {
                '+' => "+".green(),
                '~' => "~".yellow(),
                _ => "?".dimmed(),
            };
            println!(
                "│   {} {:<30} {}",
                symbol,
                diff.resource_id,
                describe_change(diff).dimmed()
            );
        }
        println!("│");
    }

    let summary = DiffSummary::from_diffs(diffs);
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} changes ({} new, {} changed, {} unknown)",
        summary.total().to_string().bold(),
        summary.additions.to_string().green(),
        summary.modifications.to_string().yellow(),
        summary.unknown.to_string().dimmed()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

pub fn type_label(resource_type: &str) -> &str {
    match resource_type {
        "macos_configuration_profile" => "Profiles (macOS)",
        "mobile_device_configuration_profile" => "Profiles (mobile device)",
        other => other,
    }
}

fn change_symbol(diff: &ResourceDiff) -> char {
    if diff.is_addition() {
        '+'
    } else if diff.is_unknown() {
        '?'
    } else {
        '~'
    }
}

/// Short text for a diff line, e.g. "3f2a… → 9c1d…"
pub fn describe_change(diff: &ResourceDiff) -> String {
    match (&diff.current, &diff.desired) {
        (ResourceState::Absent, desired) => format!(
            "(not in store){}",
            desired
                .details()
                .map(|d| format!(" → {d}"))
                .unwrap_or_default()
        ),
        (ResourceState::Unknown, _) => "(could not read store)".to_string(),
        (current, desired) => format!(
            "{} → {}",
            current.details().unwrap_or("stored"),
            desired.details().unwrap_or("local")
        ),
    }
}
