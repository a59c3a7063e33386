//! Execution engine - applies resources with parallelism

use crate::context::{ApplyContext, ConfirmCallback, ProgressCallback};
use crate::diff::compute_diffs;
use crate::planner::ExecutionPlan;
use crate::resource::Resource;
use crate::types::{ApplyResult, ExecuteOptions, ExecuteSummary};
use anyhow::{Context, Result};
use rayon::prelude::*;

/// Execute a plan with the given options and callbacks
///
/// Parallel resources run on a rayon pool of `opts.jobs` threads, then
/// sequential resources run one by one in plan order.
pub fn execute<P, C>(
    plan: ExecutionPlan,
    opts: ExecuteOptions,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ExecuteSummary>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    // Compute diffs for reporting
    let total_changes = compute_diffs(&plan.parallel).len() + compute_diffs(&plan.sequential).len();

    if total_changes == 0 {
        return Ok(ExecuteSummary::default());
    }

    if opts.dry_run {
        return Ok(ExecuteSummary {
            skipped: total_changes,
            ..Default::default()
        });
    }

    if !confirm.confirm(&format!("Apply {total_changes} change(s)?"))? {
        return Ok(ExecuteSummary {
            skipped: total_changes,
            ..Default::default()
        });
    }

    let mut summary = ExecuteSummary::default();

    if !plan.parallel.is_empty() {
        progress.on_batch_start(plan.parallel.len(), true);
        for result in execute_batch(&plan.parallel, opts.jobs, opts.verbose, progress)? {
            summary.add_result(&result);
        }
        progress.on_batch_complete();
    }

    if !plan.sequential.is_empty() {
        progress.on_batch_start(plan.sequential.len(), false);
        for result in execute_batch(&plan.sequential, 1, opts.verbose, progress)? {
            summary.add_result(&result);
        }
        progress.on_batch_complete();
    }

    Ok(summary)
}

/// Execute a batch of resources
fn execute_batch<P: ProgressCallback>(
    resources: &[Box<dyn Resource>],
    jobs: usize,
    verbose: bool,
    progress: &mut P,
) -> Result<Vec<ApplyResult>> {
    if jobs <= 1 || resources.len() == 1 {
        let mut results = Vec::with_capacity(resources.len());
        for resource in resources {
            progress.on_resource_start(&resource.id(), &resource.description());
            let result = apply_resource(resource.as_ref(), verbose);
            progress.on_resource_complete(&resource.id(), &result);
            results.push(result);
        }
        Ok(results)
    } else {
        execute_parallel(resources, jobs, verbose, progress)
    }
}

/// Execute resources in parallel using rayon
fn execute_parallel<P: ProgressCallback>(
    resources: &[Box<dyn Resource>],
    jobs: usize,
    verbose: bool,
    progress: &mut P,
) -> Result<Vec<ApplyResult>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context("Failed to create thread pool")?;

    // The progress callback isn't Sync; results are reported once the pool is done.
    let results: Vec<(String, ApplyResult)> = pool.install(|| {
        resources
            .par_iter()
            .map(|resource| (resource.id(), apply_resource(resource.as_ref(), verbose)))
            .collect()
    });

    for (id, result) in &results {
        progress.on_resource_complete(id, result);
    }

    Ok(results.into_iter().map(|(_, r)| r).collect())
}

/// Apply a single resource
fn apply_resource(resource: &dyn Resource, verbose: bool) -> ApplyResult {
    let mut ctx = ApplyContext::new(false, verbose);

    match resource.apply(&mut ctx) {
        Ok(result) => result,
        Err(e) => ApplyResult::Failed {
            error: format!("{e:#}"),
        },
    }
}

/// Simple execution without callbacks
///
/// For basic use cases where you don't need progress or confirmation.
pub fn execute_simple(plan: ExecutionPlan, opts: ExecuteOptions) -> Result<ExecuteSummary> {
    use crate::context::{AutoConfirm, NoProgress};

    execute(plan, opts, &mut NoProgress, &mut AutoConfirm)
}
