//! `profilesync reconcile` - carry server identifiers into a local payload

use anyhow::{Context as AnyhowContext, Result, bail};
use log::info;
use plistkit::{DisplayNameJoiner, DisplayNameTypeJoiner, Mismatch, Reconciler, Reconciliation};
use serde::Serialize;
use std::fs;

use crate::Context;
use crate::cli::{JoinerArg, ReconcileArgs};

/// Machine-readable outcome for `--json`
#[derive(Debug, Serialize)]
struct Report<'a> {
    joiner: &'static str,
    consistent: bool,
    mismatches: &'a [Mismatch],
}

impl<'a> Report<'a> {
    fn new(reconciler: &Reconciler, reconciliation: &'a Reconciliation) -> Self {
        Self {
            joiner: reconciler.joiner().name(),
            consistent: reconciliation.is_consistent(),
            mismatches: &reconciliation.mismatches,
        }
    }
}

fn reconciler_for(joiner: JoinerArg) -> Reconciler {
    match joiner {
        JoinerArg::Name => Reconciler::new(DisplayNameJoiner),
        JoinerArg::NameType => Reconciler::new(DisplayNameTypeJoiner),
    }
}

pub fn run(_ctx: &Context, args: &ReconcileArgs) -> Result<()> {
    let trusted = super::read_payload(&args.trusted)?;
    let candidate = super::read_payload(&args.candidate)?;

    let reconciler = reconciler_for(args.joiner);
    let reconciliation = reconciler
        .reconcile(&trusted, &candidate)
        .context("Could not reconcile payloads")?;

    if args.json {
        let report = Report::new(&reconciler, &reconciliation);
        println!("{}", serde_json::to_string_pretty(&report)?);
        if !report.consistent {
            bail!("{} identifier mismatch(es)", report.mismatches.len());
        }
    }

    let resolved = reconciliation.into_verified()?;
    match &args.output {
        Some(path) => {
            fs::write(path, &resolved)
                .with_context(|| format!("Could not write {}", path.display()))?;
            info!("Wrote resolved payload to {}", path.display());
        }
        None if !args.json => print!("{resolved}"),
        None => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRUSTED: &str = r#"<plist version="1.0"><dict>
<key>PayloadContent</key><array><dict>
<key>PayloadDisplayName</key><string>Wi-Fi</string>
<key>PayloadType</key><string>com.apple.wifi.managed</string>
<key>PayloadUUID</key><string>SERVER-WIFI</string>
</dict></array>
<key>PayloadUUID</key><string>SERVER-ROOT</string>
</dict></plist>"#;

    fn candidate(name: &str) -> String {
        TRUSTED
            .replace("SERVER-WIFI", "local-wifi")
            .replace("SERVER-ROOT", "local-root")
            .replace(">Wi-Fi<", &format!(">{name}<"))
    }

    #[test]
    fn test_report_serializes_mismatches() {
        let reconciler = reconciler_for(JoinerArg::Name);
        let reconciliation = reconciler.reconcile(TRUSTED, &candidate("Guest")).unwrap();
        let report = Report::new(&reconciler, &reconciliation);

        let json: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(json["joiner"], "name");
        assert_eq!(json["consistent"], false);
        assert_eq!(
            json["mismatches"][0]["path"],
            "Payload.PayloadContent[0].PayloadUUID"
        );
        assert_eq!(json["mismatches"][0]["trusted"], "SERVER-WIFI");
        assert_eq!(json["mismatches"][0]["candidate"], "local-wifi");
    }

    #[test]
    fn test_joiner_selection() {
        assert_eq!(reconciler_for(JoinerArg::Name).joiner().name(), "name");
        assert_eq!(reconciler_for(JoinerArg::NameType).joiner().name(), "name-type");

        let reconciliation = reconciler_for(JoinerArg::NameType)
            .reconcile(TRUSTED, &candidate("Wi-Fi"))
            .unwrap();
        assert!(reconciliation.is_consistent());
        assert!(reconciliation.resolved.contains("SERVER-WIFI"));
        assert!(reconciliation.resolved.contains("SERVER-ROOT"));
    }

    #[test]
    fn test_run_writes_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let trusted = dir.path().join("trusted.mobileconfig");
        let local = dir.path().join("local.mobileconfig");
        let output = dir.path().join("resolved.mobileconfig");
        fs::write(&trusted, TRUSTED).unwrap();
        fs::write(&local, candidate("Wi-Fi")).unwrap();

        let args = ReconcileArgs {
            trusted,
            candidate: local,
            output: Some(output.clone()),
            json: false,
            joiner: JoinerArg::Name,
        };
        let ctx = Context {
            verbose: 0,
            quiet: true,
            config_path: None,
        };
        run(&ctx, &args).unwrap();

        let resolved = fs::read_to_string(output).unwrap();
        assert!(resolved.contains("SERVER-WIFI"));
        assert!(!resolved.contains("local-root"));
    }
}
