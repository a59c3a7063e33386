//! `profilesync canonicalize` - print the normal form of a payload

use anyhow::{Context as AnyhowContext, Result};
use log::info;
use plistkit::Canonicalizer;

use crate::Context;
use crate::cli::CanonicalizeArgs;

pub fn run(ctx: &Context, args: &CanonicalizeArgs) -> Result<()> {
    let xml = super::read_payload(&args.file)?;
    let fields = super::strip_fields(ctx, &args.fields)?;
    if !fields.is_empty() {
        info!("Stripping: {fields}");
    }

    let canonical = Canonicalizer::new(fields)
        .canonicalize_str(&xml)
        .with_context(|| format!("Could not canonicalize {}", args.file.display()))?;
    print!("{canonical}");
    Ok(())
}
