//! Command implementations

pub mod canonicalize;
pub mod compare;
pub mod declarative;
pub mod reconcile;
pub mod validate;

use anyhow::{Context as AnyhowContext, Result};
use plistkit::StripFields;
use std::fs;
use std::path::Path;

use crate::Context;
use crate::cli::StripArgs;
use crate::config::Config;

/// Read a payload file
fn read_payload(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))
}

/// Ignore list selected on the command line
fn strip_fields(ctx: &Context, args: &StripArgs) -> Result<StripFields> {
    match args.kind {
        Some(kind) => {
            let config = Config::load(ctx.config_path.as_deref())?;
            Ok(config.kind_settings().for_kind(kind.into()).strip.clone())
        }
        None => Ok(StripFields::new(&args.strip)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::KindArg;

    fn ctx(config: &Path) -> Context {
        Context {
            verbose: 0,
            quiet: true,
            config_path: Some(config.to_path_buf()),
        }
    }

    #[test]
    fn test_strip_fields_from_flags() {
        let dir = tempfile::tempdir().unwrap();
        let args = StripArgs {
            kind: None,
            strip: vec!["PayloadUUID".into(), "payloadidentifier".into()],
        };
        let fields = strip_fields(&ctx(&dir.path().join("unused.toml")), &args).unwrap();
        assert_eq!(fields.len(), 2);
        assert!(fields.contains("PayloadIdentifier"));
    }

    #[test]
    fn test_strip_fields_from_kind_uses_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[kinds.macos]\nstrip_fields = [\"PayloadUUID\"]\n").unwrap();

        let args = StripArgs {
            kind: Some(KindArg::Macos),
            strip: Vec::new(),
        };
        let fields = strip_fields(&ctx(&path), &args).unwrap();
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn test_read_payload_missing() {
        let err = read_payload(Path::new("/nonexistent/profile.mobileconfig")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/profile.mobileconfig"));
    }
}
