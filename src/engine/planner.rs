//! Execution planner - compares declared objects with managed state

use anyhow::Result;
use reconcile::{
    Catalog, ConfigObject, PlannedChange, Reconciler, SchemaCatalog, Transition, Version,
};

use crate::declared::{DeclaredConfig, address};
use crate::state::ManagedState;
use crate::store::RemoteStore;

/// A declared object and what reconciling it would do
#[derive(Debug, Clone)]
pub struct PlanItem {
    pub resource: String,
    pub desired: ConfigObject,
    /// Snapshot from managed state; None when unmanaged
    pub last: Option<ConfigObject>,
    pub change: PlannedChange,
}

impl PlanItem {
    pub fn address(&self) -> String {
        address(&self.resource, &self.desired.id)
    }
}

/// A managed instance that is no longer declared
#[derive(Debug, Clone)]
pub struct Orphan {
    pub resource: String,
    pub snapshot: ConfigObject,
    /// Delete, or Forget for adopt-only kinds
    pub transition: Transition,
}

impl Orphan {
    pub fn address(&self) -> String {
        address(&self.resource, &self.snapshot.id)
    }
}

/// A declared object that cannot be reconciled as written
#[derive(Debug)]
pub struct PlanFailure {
    pub address: String,
    pub error: reconcile::Error,
}

#[derive(Debug, Default)]
pub struct ExecutionPlan {
    pub items: Vec<PlanItem>,
    pub orphans: Vec<Orphan>,
    pub failures: Vec<PlanFailure>,
}

impl ExecutionPlan {
    /// Items that would send a mutating request
    pub fn changes(&self) -> impl Iterator<Item = &PlanItem> {
        self.items.iter().filter(|i| i.change.transition.is_change())
    }

    /// Number of instances apply would touch
    pub fn change_count(&self, prune: bool) -> usize {
        let orphans = if prune { self.orphans.len() } else { 0 };
        self.changes().count() + orphans
    }

    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Plan every declared object against managed state
///
/// Nothing is sent to the remote: the store only supplies the client each
/// reconciler is bound to.
pub fn build_plan(
    declared: &DeclaredConfig,
    state: &ManagedState,
    catalog: &Catalog,
    store: &RemoteStore,
    version: Version,
) -> Result<ExecutionPlan> {
    let mut plan = ExecutionPlan::default();

    for declaration in &declared.objects {
        let Some(schema) = catalog.schema(&declaration.resource) else {
            plan.failures.push(PlanFailure {
                address: declaration.address(),
                error: reconcile::Error::UnknownResource(declaration.resource.clone()),
            });
            continue;
        };

        let reconciler = Reconciler::new(store.client(&declaration.resource)?, schema, version);
        let last = state.snapshot(&declaration.resource, &declaration.object.id);

        match reconciler.plan(&declaration.object, last) {
            Ok(change) => plan.items.push(PlanItem {
                resource: declaration.resource.clone(),
                desired: declaration.object.clone(),
                last: last.cloned(),
                change,
            }),
            Err(error) => plan.failures.push(PlanFailure {
                address: declaration.address(),
                error,
            }),
        }
    }

    for instance in state.orphans(|resource, id| declared.find(resource, id).is_some()) {
        let adopt_only = catalog
            .schema(&instance.resource)
            .is_some_and(|schema| schema.is_adopt_only(&instance.snapshot.kind));
        plan.orphans.push(Orphan {
            resource: instance.resource.clone(),
            snapshot: instance.snapshot.clone(),
            transition: if adopt_only || instance.adopted {
                Transition::Forget
            } else {
                Transition::Delete
            },
        });
    }

    log::debug!(
        "Planned {} object(s), {} orphan(s), {} failure(s)",
        plan.items.len(),
        plan.orphans.len(),
        plan.failures.len()
    );
    Ok(plan)
}
