//! Execution engine for profilesync
//!
//! The engine orchestrates:
//! 1. Planning - one resource per configured profile
//! 2. Diffing - stored vs local canonical content hashes
//! 3. Executing - the declarative executor, with terminal progress

pub mod differ;
pub mod reporter;

pub use differ::display_diff;
pub use reporter::{PromptConfirm, TerminalProgress, print_summary};
