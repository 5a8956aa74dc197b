use anyhow::{Result, bail};

use super::Session;
use crate::Context;
use crate::cli::ApplyArgs;
use crate::declared::DeclaredConfig;
use crate::engine::differ::display_failures;
use crate::engine::{ExecuteOptions, ExecuteSummary, build_plan, execute};
use crate::ui;

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let declared = DeclaredConfig::load(&args.file)?;
    let mut session = Session::open(&ctx.config)?;

    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        jobs: args.jobs.unwrap_or(ctx.config.jobs),
        yes: args.yes,
        prune: args.prune,
        refresh: args.refresh,
    };
    let summary = apply(&mut session, &declared, &opts)?;

    if !summary.is_success() {
        bail!("{} failed to reconcile", ui::count(summary.failed, "object"));
    }
    Ok(())
}

/// Plan, execute and persist; partial progress is saved even on failure
fn apply(
    session: &mut Session,
    declared: &DeclaredConfig,
    opts: &ExecuteOptions,
) -> Result<ExecuteSummary> {
    let plan = build_plan(
        declared,
        &session.state,
        &session.catalog,
        &session.store,
        session.version,
    )?;

    if !plan.is_valid() {
        display_failures(&plan);
        bail!(
            "{} cannot be reconciled, nothing was applied",
            ui::count(plan.failures.len(), "object")
        );
    }

    let summary = execute(
        &plan,
        &session.catalog,
        &session.store,
        &mut session.state,
        session.version,
        opts,
    )?;
    log::debug!("Sent {} remote call(s)", session.store.call_count());

    // An aborted run leaves both files untouched
    if !opts.dry_run && summary.skipped == 0 {
        session.save()?;
    }
    Ok(summary)
}
