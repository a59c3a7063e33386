//! Terminal progress and confirmation for the declarative executor

use anyhow::Result;
use colored::Colorize;
use declarative::{ApplyResult, ConfirmCallback, ExecuteSummary, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar per batch, failures collected for the summary
#[derive(Default)]
pub struct TerminalProgress {
    bar: Option<ProgressBar>,
    quiet: bool,
    failures: Vec<(String, String)>,
}

impl TerminalProgress {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            ..Default::default()
        }
    }

    pub fn failures(&self) -> &[(String, String)] {
        &self.failures
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_batch_start(&mut self, count: usize, parallel: bool) {
        if self.quiet {
            return;
        }
        println!();
        println!(
            "  {} Applying {} profile(s){}...",
            "→".cyan(),
            count,
            if parallel { " in parallel" } else { "" }
        );

        let bar = ProgressBar::new(count as u64);
        if let Ok(style) = ProgressStyle::with_template("  [{bar:30.cyan/blue}] {pos}/{len} {msg}") {
            bar.set_style(style.progress_chars("=>-"));
        }
        self.bar = Some(bar);
    }

    fn on_resource_start(&mut self, id: &str, _description: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(id.to_string());
        }
    }

    fn on_resource_complete(&mut self, id: &str, result: &ApplyResult) {
        if let ApplyResult::Failed { error } = result {
            self.failures.push((id.to_string(), error.clone()));
        }
        if let Some(bar) = &self.bar {
            bar.set_message(format!("{} {id}", result_symbol(result)));
            bar.inc(1);
        }
    }

    fn on_batch_complete(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

fn result_symbol(result: &ApplyResult) -> &'static str {
    match result {
        ApplyResult::NoChange => "○",
        ApplyResult::Created | ApplyResult::Modified => "✓",
        ApplyResult::Failed { .. } => "✗",
        ApplyResult::Skipped { .. } => "⊘",
    }
}

/// Interactive confirmation, bypassed by `--yes`
pub struct PromptConfirm {
    pub assume_yes: bool,
}

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .interact()?;
        Ok(confirmed)
    }
}

/// Print final summary
pub fn print_summary(summary: &ExecuteSummary, failures: &[(String, String)]) {
    println!();
    if summary.is_success() {
        println!("  {} Profiles applied successfully!", "✓".green().bold());
    } else {
        println!("  {} Profiles applied with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} profiles created", summary.created);
    }
    if summary.modified > 0 {
        println!("    • {} profiles updated", summary.modified);
    }
    if summary.no_change > 0 {
        println!("    • {} profiles already in sync", summary.no_change);
    }
    if summary.skipped > 0 {
        println!("    • {} profiles skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "profiles".red());
        for (id, error) in failures {
            println!("      {} {id}", "✗".red());
            for line in error.lines() {
                println!("        {}", line.dimmed());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_progress_collects_failures() {
        let mut progress = TerminalProgress::new(true);
        progress.on_batch_start(2, true);
        progress.on_resource_complete("wifi", &ApplyResult::Created);
        progress.on_resource_complete(
            "vpn",
            &ApplyResult::Failed {
                error: "mismatch".into(),
            },
        );
        progress.on_batch_complete();

        assert_eq!(progress.failures(), &[("vpn".to_string(), "mismatch".to_string())]);
    }

    #[test]
    fn test_assume_yes_skips_prompt() {
        let mut confirm = PromptConfirm { assume_yes: true };
        assert!(confirm.confirm("Apply 1 change(s)?").unwrap());
    }

    #[test]
    fn test_result_symbol() {
        assert_eq!(result_symbol(&ApplyResult::NoChange), "○");
        assert_eq!(result_symbol(&ApplyResult::Modified), "✓");
    }
}
