use anyhow::{Context as AnyhowContext, Result, anyhow};
use dialoguer::Confirm;
use reconcile::{Reconciler, SchemaCatalog, Transition};

use super::Session;
use crate::Context;
use crate::cli::DestroyArgs;
use crate::declared::address;
use crate::ui;

pub fn run(ctx: &Context, args: &DestroyArgs) -> Result<()> {
    let mut session = Session::open(&ctx.config)?;
    let target = address(&args.resource, &args.id);

    let instance = session
        .state
        .get(&args.resource, &args.id)
        .ok_or_else(|| anyhow!("'{target}' is not managed"))?;
    let schema = session.catalog.require(&args.resource)?;
    let adopt_only = instance.adopted || schema.is_adopt_only(&instance.snapshot.kind);

    if !args.yes {
        let prompt = if adopt_only {
            format!("Stop managing {target}? The remote object is left in place")
        } else {
            format!("Delete {target} from the remote?")
        };
        let confirmed = Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?;
        if !confirmed {
            ui::info("Aborted");
            return Ok(());
        }
    }

    let transition = destroy(&mut session, &args.resource, &args.id)?;
    session.save()?;

    if !ctx.quiet {
        match transition {
            Transition::Forget => ui::success(&format!("Forgot {target}")),
            _ => ui::success(&format!("Deleted {target}")),
        }
    }
    Ok(())
}

/// Release a managed instance and drop it from state
///
/// An instance already gone from the remote is still dropped.
fn destroy(session: &mut Session, resource: &str, id: &str) -> Result<Transition> {
    let instance = session
        .state
        .get(resource, id)
        .ok_or_else(|| anyhow!("'{}' is not managed", address(resource, id)))?;
    let kind = instance.snapshot.kind.clone();
    let adopted = instance.adopted;

    let transition = if adopted {
        Transition::Forget
    } else {
        let schema = session.catalog.require(resource)?;
        let reconciler = Reconciler::new(session.store.client(resource)?, schema, session.version);
        match reconciler.delete(&kind, id) {
            Ok(transition) => transition,
            Err(e) if e.is_not_found() => {
                ui::warn(&format!(
                    "{} was already gone from the remote",
                    address(resource, id)
                ));
                Transition::Delete
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to delete {}", address(resource, id)));
            }
        }
    };

    session.state.remove(resource, id);
    Ok(transition)
}
