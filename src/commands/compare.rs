//! `profilesync compare` - are two payloads the same after canonicalization?

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use plistkit::{Canonicalizer, ContentHash};
use std::path::Path;

use crate::Context;
use crate::cli::CompareArgs;
use crate::ui;

/// Canonical forms of both sides
struct Comparison {
    left: String,
    right: String,
}

impl Comparison {
    fn new(canonicalizer: &Canonicalizer, left: &str, right: &str) -> Result<Self> {
        Ok(Self {
            left: canonicalizer.canonicalize_str(left).context("Could not canonicalize first payload")?,
            right: canonicalizer.canonicalize_str(right).context("Could not canonicalize second payload")?,
        })
    }

    fn is_equal(&self) -> bool {
        self.left == self.right
    }

    /// `-`/`+` lines of a line diff between the canonical forms
    fn changed_lines(&self) -> Vec<(char, String)> {
        similar::TextDiff::from_lines(&self.left, &self.right)
            .iter_all_changes()
            .filter_map(|change| {
                let sign = match change.tag() {
                    similar::ChangeTag::Delete => '-',
                    similar::ChangeTag::Insert => '+',
                    similar::ChangeTag::Equal => return None,
                };
                Some((sign, change.value().trim_end_matches('\n').to_string()))
            })
            .collect()
    }
}

pub fn run(ctx: &Context, args: &CompareArgs) -> Result<()> {
    let fields = super::strip_fields(ctx, &args.fields)?;
    let comparison = Comparison::new(
        &Canonicalizer::new(fields),
        &super::read_payload(&args.left)?,
        &super::read_payload(&args.right)?,
    )?;

    if !ctx.quiet {
        ui::header("Payload Comparison");
        print_side(&args.left, &comparison.left);
        print_side(&args.right, &comparison.right);
        println!();
    }

    if comparison.is_equal() {
        ui::success("Payloads are equal under canonicalization");
        return Ok(());
    }

    if args.show_diff {
        println!();
        for (sign, line) in comparison.changed_lines() {
            let text = format!("{sign} {line}");
            if sign == '-' {
                println!("    {}", text.red());
            } else {
                println!("    {}", text.green());
            }
        }
    }

    bail!("Payloads differ after canonicalization");
}

fn print_side(path: &Path, canonical: &str) {
    ui::kv(
        &path.display().to_string(),
        &ContentHash::of_canonical(canonical).short(),
    );
}
