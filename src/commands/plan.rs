use anyhow::{Result, bail};

use super::Session;
use crate::Context;
use crate::cli::PlanArgs;
use crate::declared::DeclaredConfig;
use crate::engine::build_plan;
use crate::engine::differ::{display_failures, display_plan};
use crate::ui;

pub fn run(ctx: &Context, args: &PlanArgs) -> Result<()> {
    let declared = DeclaredConfig::load(&args.file)?;
    let session = Session::open(&ctx.config)?;

    let plan = build_plan(
        &declared,
        &session.state,
        &session.catalog,
        &session.store,
        session.version,
    )?;

    if !plan.is_valid() {
        display_failures(&plan);
        bail!(
            "{} cannot be reconciled",
            ui::count(plan.failures.len(), "object")
        );
    }

    display_plan(&plan, args.prune);
    if !ctx.quiet && !session.state.is_empty() {
        ui::dim(&format!(
            "{} tracked in {}",
            ui::count(session.state.len(), "managed instance"),
            session.state_path.display()
        ));
    }
    Ok(())
}
