//! `profilesync validate` - structural checks before a profile is pushed

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use plistkit::{ConfigurationProfile, Issue, PayloadScope, Severity};

use crate::Context;
use crate::cli::ValidateArgs;
use crate::ui;

/// All findings for a profile, including the deployment level check
fn collect_issues(xml: &str, level: Option<PayloadScope>) -> Result<Vec<Issue>> {
    let profile = ConfigurationProfile::parse(xml)?;
    let mut issues = profile.validate().issues;
    if let Some(level) = level
        && let Err(plistkit::Error::InvalidProfile { issues: scope }) = profile.check_scope(level)
    {
        issues.extend(scope);
    }
    Ok(issues)
}

pub fn run(ctx: &Context, args: &ValidateArgs) -> Result<()> {
    let xml = super::read_payload(&args.file)?;
    let issues = collect_issues(&xml, args.level.map(Into::into))
        .with_context(|| format!("Could not parse {}", args.file.display()))?;

    ui::header(&format!("Validating {}", args.file.display()));

    let errors = issues.iter().filter(|i| i.severity == Severity::Error).count();
    for issue in &issues {
        match issue.severity {
            Severity::Error => println!("  {} {}", "✗".red(), issue),
            Severity::Warning if !ctx.quiet => println!("  {} {}", "⚠".yellow(), issue),
            Severity::Warning => {}
        }
    }

    if errors > 0 {
        println!();
        bail!("{errors} validation error(s)");
    }

    println!();
    ui::success("Profile is valid");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE: &str = r#"<plist version="1.0"><dict>
<key>PayloadContent</key><array/>
<key>PayloadDescription</key><string>Test</string>
<key>PayloadDisplayName</key><string>Test</string>
<key>PayloadEnabled</key><true/>
<key>PayloadIdentifier</key><string>ROOT</string>
<key>PayloadOrganization</key><string>Example</string>
<key>PayloadRemovalDisallowed</key><false/>
<key>PayloadScope</key><string>User</string>
<key>PayloadType</key><string>Configuration</string>
<key>PayloadUUID</key><string>ROOT</string>
<key>PayloadVersion</key><integer>1</integer>
</dict></plist>"#;

    #[test]
    fn test_valid_profile_has_no_issues() {
        assert!(collect_issues(PROFILE, None).unwrap().is_empty());
        assert!(collect_issues(PROFILE, Some(PayloadScope::User)).unwrap().is_empty());
    }

    #[test]
    fn test_level_mismatch_is_an_error() {
        let issues = collect_issues(PROFILE, Some(PayloadScope::System)).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Error);
        assert_eq!(issues[0].path, "Payload.PayloadScope");
    }

    #[test]
    fn test_missing_keys_reported() {
        let xml = PROFILE.replace("<key>PayloadVersion</key><integer>1</integer>", "");
        let issues = collect_issues(&xml, None).unwrap();
        assert!(issues.iter().any(|i| i.path == "Payload.PayloadVersion"));
    }

    #[test]
    fn test_not_a_dictionary() {
        assert!(collect_issues(r#"<plist version="1.0"><array/></plist>"#, None).is_err());
    }
}
