//! # Declarative
//!
//! A small framework for converging remote resources to a desired state.
//!
//! ## Core Concepts
//!
//! - **Resource**: Something with state that can be managed (a stored
//!   configuration profile, for instance)
//! - **ResourceState**: The current or desired state of a resource
//! - **ExecutionPlan**: Resources grouped by whether they may run concurrently
//! - **Executor**: Applies resources with rayon-backed parallelism
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{ExecutionPlan, ExecuteOptions, execute_simple};
//!
//! let mut plan = ExecutionPlan::new();
//! plan.add_resource(Box::new(my_resource));
//!
//! let summary = execute_simple(plan, ExecuteOptions::default())?;
//! println!("{} change(s)", summary.total_changes());
//! ```
//!
//! ## Callback Traits
//!
//! - [`ProgressCallback`]: Receives progress updates
//! - [`ConfirmCallback`]: Handles user confirmations
//!
//! This allows the crate to be used without a hard dependency on any
//! particular terminal UI.

pub mod context;
pub mod diff;
pub mod executor;
pub mod planner;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use context::{ApplyContext, AutoConfirm, AutoDecline, ConfirmCallback, NoProgress, ProgressCallback};
pub use diff::{DiffSummary, ResourceDiff, compute_diffs, group_by_type};
pub use executor::{execute, execute_simple};
pub use planner::ExecutionPlan;
pub use resource::{BoxedResource, Resource};
pub use types::{ApplyResult, ExecuteOptions, ExecuteSummary, ResourceState};
