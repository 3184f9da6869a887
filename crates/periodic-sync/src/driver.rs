use std::collections::HashSet;
use std::fmt;

use periodic_registry::TaskRegistry;
use tracing::info;

use crate::error::Result;
use crate::reconciler::{ReconcileOutcome, TaskReconciler};
use crate::resolver::ScheduleResolver;
use crate::store::PeriodicStore;
use crate::sweeper::OrphanSweeper;

/// Counts of what one reconciliation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
}

impl SyncSummary {
    /// Rows written (created, updated or deleted).
    pub fn changed(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={} updated={} unchanged={} deleted={}",
            self.created, self.updated, self.unchanged, self.deleted
        )
    }
}

/// Runs resolve → reconcile → sweep over a registry snapshot.
pub struct SyncDriver<'s, S: PeriodicStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: PeriodicStore + ?Sized> SyncDriver<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// One full pass. Any error aborts the rest of the pass.
    ///
    /// Idempotent: a second run over an unchanged registry reports every
    /// task as unchanged and writes nothing.
    pub fn run(&self, registry: &TaskRegistry) -> Result<SyncSummary> {
        let definitions = registry.all_definitions();
        info!(count = definitions.len(), "synchronizing periodic tasks with the database");

        let mut resolver = ScheduleResolver::new(self.store);
        let reconciler = TaskReconciler::new(self.store);
        let mut summary = SyncSummary::default();

        for definition in &definitions {
            let schedule = resolver.resolve(&definition.schedule)?;
            match reconciler.reconcile(definition, schedule)? {
                ReconcileOutcome::Created => summary.created += 1,
                ReconcileOutcome::Updated(_) => summary.updated += 1,
                ReconcileOutcome::Unchanged => summary.unchanged += 1,
            }
        }

        let live_names: HashSet<String> = definitions.into_iter().map(|d| d.name).collect();
        summary.deleted = OrphanSweeper::new(self.store).sweep(&live_names)?;

        if summary.changed() > 0 {
            self.store.mark_changed()?;
            info!(
                total = live_names.len(),
                changed = summary.changed(),
                "successfully synchronized periodic task(s)"
            );
        } else {
            info!("all periodic tasks are up-to-date");
        }
        Ok(summary)
    }
}
