//! Execution engine - reconciles planned objects in parallel

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use rayon::prelude::*;
use reconcile::{Catalog, ConfigObject, Reconciler, SchemaCatalog, Transition, Version};
use std::sync::{Arc, Mutex};

use super::differ::display_plan;
use super::planner::{ExecutionPlan, Orphan, PlanItem};
use crate::declared::address;
use crate::progress;
use crate::state::ManagedState;
use crate::store::RemoteStore;

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Number of parallel jobs
    pub jobs: usize,
    /// Skip confirmation prompts
    pub yes: bool,
    /// Release managed instances that are no longer declared
    pub prune: bool,
    /// Read each managed object before updating it
    pub refresh: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
            yes: false,
            prune: false,
            refresh: false,
        }
    }
}

/// Summary of execution results
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ExecuteSummary {
    pub created: usize,
    pub adopted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub forgotten: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ExecuteSummary {
    pub fn total_changes(&self) -> usize {
        self.created + self.adopted + self.updated + self.deleted + self.forgotten
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    fn count(&mut self, transition: Transition) {
        match transition {
            Transition::Create => self.created += 1,
            Transition::Adopt => self.adopted += 1,
            Transition::Update => self.updated += 1,
            Transition::NoOp => self.unchanged += 1,
            Transition::Delete => self.deleted += 1,
            Transition::Forget => self.forgotten += 1,
        }
    }
}

/// Shared, read-only inputs of every task
struct Env<'a> {
    catalog: &'a Catalog,
    store: &'a RemoteStore,
    version: Version,
    refresh: bool,
}

enum Task<'a> {
    Reconcile(&'a PlanItem),
    Release(&'a Orphan),
}

impl Task<'_> {
    fn address(&self) -> String {
        match self {
            Self::Reconcile(item) => item.address(),
            Self::Release(orphan) => orphan.address(),
        }
    }
}

#[derive(Debug)]
enum Outcome {
    Applied {
        resource: String,
        transition: Transition,
        object: ConfigObject,
    },
    Released {
        resource: String,
        id: String,
        transition: Transition,
    },
    Failed {
        address: String,
        error: String,
    },
}

impl Outcome {
    fn address(&self) -> String {
        match self {
            Self::Applied {
                resource, object, ..
            } => address(resource, &object.id),
            Self::Released { resource, id, .. } => address(resource, id),
            Self::Failed { address, .. } => address.clone(),
        }
    }
}

/// Execute the plan, recording every change in `state`
pub fn execute(
    plan: &ExecutionPlan,
    catalog: &Catalog,
    store: &RemoteStore,
    state: &mut ManagedState,
    version: Version,
    opts: &ExecuteOptions,
) -> Result<ExecuteSummary> {
    // 1. Display what will change
    display_plan(plan, opts.prune);

    // A refresh may find drift the plan cannot see, so it always runs
    let changes = plan.change_count(opts.prune);
    if changes == 0 && !opts.refresh {
        return Ok(ExecuteSummary {
            unchanged: plan.items.len(),
            ..Default::default()
        });
    }

    // 2. Confirm (unless --yes)
    if changes > 0 && !opts.yes && !opts.dry_run && !confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(ExecuteSummary {
            skipped: changes,
            ..Default::default()
        });
    }

    if opts.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok(ExecuteSummary::default());
    }

    // 3. Reconcile in parallel
    let mut tasks: Vec<Task<'_>> = plan.items.iter().map(Task::Reconcile).collect();
    if opts.prune {
        tasks.extend(plan.orphans.iter().map(Task::Release));
    }

    println!();
    println!("  {} Reconciling {} objects...", "→".cyan(), tasks.len());

    let env = Env {
        catalog,
        store,
        version,
        refresh: opts.refresh,
    };
    let outcomes = execute_parallel(&tasks, &env, opts.jobs)?;

    // 4. Record results
    let summary = record_outcomes(state, outcomes);
    print_summary(&summary);

    Ok(summary)
}

/// Run tasks on a rayon pool of `jobs` threads
fn execute_parallel(tasks: &[Task<'_>], env: &Env<'_>, jobs: usize) -> Result<Vec<Outcome>> {
    let pb = progress::bar(tasks.len() as u64, "Applying");
    let outcomes: Arc<Mutex<Vec<Outcome>>> = Arc::new(Mutex::new(Vec::new()));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .context("Failed to create apply thread pool")?;

    pool.install(|| {
        tasks.par_iter().for_each(|task| {
            let outcome = match run_task(task, env) {
                Ok(outcome) => outcome,
                Err(e) => Outcome::Failed {
                    address: task.address(),
                    error: format!("{e:#}"),
                },
            };

            let symbol = match &outcome {
                Outcome::Applied {
                    transition: Transition::NoOp,
                    ..
                } => "○",
                Outcome::Applied { .. } | Outcome::Released { .. } => "✓",
                Outcome::Failed { .. } => "✗",
            };

            pb.set_message(format!("{} {}", symbol, task.address()));
            pb.inc(1);

            push_outcome(&outcomes, outcome);
        });
    });

    pb.finish_and_clear();

    let mut outcomes = into_outcomes(outcomes)?;
    // Completion order varies between runs
    outcomes.sort_by_cached_key(Outcome::address);
    Ok(outcomes)
}

fn run_task(task: &Task<'_>, env: &Env<'_>) -> Result<Outcome> {
    match task {
        Task::Reconcile(item) => reconcile_item(item, env),
        Task::Release(orphan) => release_orphan(orphan, env),
    }
}

fn reconcile_item(item: &PlanItem, env: &Env<'_>) -> Result<Outcome> {
    let schema = env.catalog.require(&item.resource)?;
    let reconciler = Reconciler::new(env.store.client(&item.resource)?, schema, env.version);
    let applied = |transition, object| Outcome::Applied {
        resource: item.resource.clone(),
        transition,
        object,
    };

    let Some(snapshot) = &item.last else {
        let object = reconciler.create(&item.desired)?;
        return Ok(applied(item.change.transition, object));
    };

    let last = if env.refresh {
        match reconciler.read(&snapshot.kind, &snapshot.id) {
            Ok(current) => current,
            Err(e) if e.is_not_found() && !schema.is_adopt_only(&snapshot.kind) => {
                log::warn!(
                    "{} disappeared from the remote, creating it again",
                    item.address()
                );
                let object = reconciler.create(&item.desired)?;
                return Ok(applied(Transition::Create, object));
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        snapshot.clone()
    };

    let outcome = reconciler.update(&item.desired, &last)?;
    let transition = if outcome.operations_applied {
        Transition::Update
    } else {
        Transition::NoOp
    };
    Ok(applied(transition, outcome.object))
}

fn release_orphan(orphan: &Orphan, env: &Env<'_>) -> Result<Outcome> {
    let schema = env.catalog.require(&orphan.resource)?;
    let reconciler = Reconciler::new(env.store.client(&orphan.resource)?, schema, env.version);
    let released = |transition| Outcome::Released {
        resource: orphan.resource.clone(),
        id: orphan.snapshot.id.clone(),
        transition,
    };

    if orphan.transition == Transition::Forget {
        return Ok(released(Transition::Forget));
    }

    match reconciler.delete(&orphan.snapshot.kind, &orphan.snapshot.id) {
        Ok(transition) => Ok(released(transition)),
        Err(e) if e.is_not_found() => {
            log::info!("{} was already deleted remotely", orphan.address());
            Ok(released(Transition::Delete))
        }
        Err(e) => Err(e.into()),
    }
}

fn push_outcome(outcomes: &Arc<Mutex<Vec<Outcome>>>, outcome: Outcome) {
    match outcomes.lock() {
        Ok(mut locked) => locked.push(outcome),
        Err(poisoned) => poisoned.into_inner().push(outcome),
    }
}

fn into_outcomes(outcomes: Arc<Mutex<Vec<Outcome>>>) -> Result<Vec<Outcome>> {
    let mutex = Arc::try_unwrap(outcomes)
        .map_err(|_| anyhow::anyhow!("Failed to collect apply results: shared result state"))?;

    match mutex.into_inner() {
        Ok(collected) => Ok(collected),
        Err(poisoned) => Ok(poisoned.into_inner()),
    }
}

/// Apply outcomes to managed state and count them
fn record_outcomes(state: &mut ManagedState, outcomes: Vec<Outcome>) -> ExecuteSummary {
    let mut summary = ExecuteSummary::default();

    for outcome in outcomes {
        match outcome {
            Outcome::Applied {
                resource,
                transition,
                object,
            } => {
                state.record(&resource, object, transition == Transition::Adopt);
                summary.count(transition);
            }
            Outcome::Released {
                resource,
                id,
                transition,
            } => {
                state.remove(&resource, &id);
                summary.count(transition);
            }
            Outcome::Failed { address, error } => {
                println!("    {} {}: {}", "✗".red(), address, error);
                summary.failed += 1;
            }
        }
    }

    summary
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

/// Print final summary
fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!(
            "  {} Configuration applied successfully!",
            "✓".green().bold()
        );
    } else {
        println!(
            "  {} Configuration applied with errors",
            "⚠".yellow().bold()
        );
    }

    let lines = [
        (summary.created, "created"),
        (summary.adopted, "adopted"),
        (summary.updated, "updated"),
        (summary.unchanged, "unchanged"),
        (summary.deleted, "deleted"),
        (summary.forgotten, "forgotten"),
    ];
    for (n, label) in lines {
        if n > 0 {
            println!("    • {n} {label}");
        }
    }
    if summary.failed > 0 {
        println!("    • {} {}", summary.failed, "failed".red());
    }
}
