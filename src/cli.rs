use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::config::ProfileKind;

#[derive(Parser)]
#[command(name = "profilesync")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative sync of MDM configuration profiles", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (defaults to ~/.config/profilesync/config.toml)
    #[arg(long, global = true, env = "PROFILESYNC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the canonical form of a profile payload
    Canonicalize(CanonicalizeArgs),

    /// Check whether two payloads are equal after canonicalization
    Compare(CompareArgs),

    /// Copy server-assigned identifiers into a local payload
    Reconcile(ReconcileArgs),

    /// Validate a configuration profile
    Validate(ValidateArgs),

    /// Show configured profiles and whether they are in sync
    Status(TargetArgs),

    /// Preview what apply would change
    Diff(TargetArgs),

    /// Push configured profiles to the store
    Apply(ApplyArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Payload Commands
// ============================================================================

/// Which fields to ignore when comparing payloads
#[derive(Parser, Clone, Default)]
pub struct StripArgs {
    /// Use the built-in ignore list for a profile kind
    #[arg(short, long, value_enum, conflicts_with = "strip")]
    pub kind: Option<KindArg>,

    /// Field to strip from every dictionary (repeatable)
    #[arg(short, long)]
    pub strip: Vec<String>,
}

#[derive(Parser)]
pub struct CanonicalizeArgs {
    /// Payload file (.mobileconfig or plist XML)
    pub file: PathBuf,

    #[command(flatten)]
    pub fields: StripArgs,
}

#[derive(Parser)]
pub struct CompareArgs {
    /// First payload
    pub left: PathBuf,

    /// Second payload
    pub right: PathBuf,

    #[command(flatten)]
    pub fields: StripArgs,

    /// Print a line diff of the canonical forms
    #[arg(long)]
    pub show_diff: bool,
}

#[derive(Parser)]
pub struct ReconcileArgs {
    /// Payload as returned by the server
    pub trusted: PathBuf,

    /// Local payload to receive the server identifiers
    pub candidate: PathBuf,

    /// Write the resolved payload here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report mismatches as JSON
    #[arg(long)]
    pub json: bool,

    /// How nested payloads are matched between the two trees
    #[arg(long, value_enum, default_value = "name")]
    pub joiner: JoinerArg,
}

#[derive(Parser)]
pub struct ValidateArgs {
    /// Profile file
    pub file: PathBuf,

    /// Required PayloadScope
    #[arg(short, long, value_enum)]
    pub level: Option<LevelArg>,
}

// ============================================================================
// Declarative Commands
// ============================================================================

#[derive(Parser)]
pub struct TargetArgs {
    /// Limit to a kind or profile: macos, mobile, macos.<name>
    pub target: Option<String>,
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Limit to a kind or profile: macos, mobile, macos.<name>
    pub target: Option<String>,

    /// Dry run - show what would be done
    #[arg(short, long)]
    pub dry_run: bool,

    /// Number of parallel jobs
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

// ============================================================================
// Value Enums
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Macos,
    MobileDevice,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum JoinerArg {
    /// PayloadDisplayName
    Name,
    /// PayloadType and PayloadDisplayName
    NameType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LevelArg {
    System,
    User,
    Computer,
}

impl From<KindArg> for ProfileKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Macos => Self::Macos,
            KindArg::MobileDevice => Self::MobileDevice,
        }
    }
}

impl From<LevelArg> for plistkit::PayloadScope {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::System => Self::System,
            LevelArg::User => Self::User,
            LevelArg::Computer => Self::Computer,
        }
    }
}
