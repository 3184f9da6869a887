use std::sync::atomic::{AtomicBool, Ordering};

use periodic_core::SyncConfig;
use periodic_registry::TaskRegistry;
use tracing::debug;

use crate::driver::{SyncDriver, SyncSummary};
use crate::error::Result;
use crate::store::PeriodicStore;

/// Startup entry point: runs the sync driver once per instance.
///
/// Hosts that initialise twice (dev reloaders, repeated setup calls) get a
/// single pass; `reset` re-arms it for tests or an on-demand resync.
pub struct StartupSync {
    migrate: bool,
    synced: AtomicBool,
}

impl StartupSync {
    pub fn new(migrate: bool) -> Self {
        Self {
            migrate,
            synced: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.migrate)
    }

    /// Run the pass unless it already ran.
    ///
    /// Returns `Ok(None)` when skipped: already synced, or the tables are
    /// missing and migration is off. A missing schema and a failed pass both
    /// leave the hook armed. Logging the returned summary is up to the caller.
    pub fn run<S: PeriodicStore + ?Sized>(
        &self,
        store: &S,
        registry: &TaskRegistry,
    ) -> Result<Option<SyncSummary>> {
        if self.synced.swap(true, Ordering::SeqCst) {
            debug!("periodic tasks already synchronized; skipping");
            return Ok(None);
        }

        let outcome = self.run_pass(store, registry);
        if !matches!(outcome, Ok(Some(_))) {
            self.reset();
        }
        outcome
    }

    fn run_pass<S: PeriodicStore + ?Sized>(
        &self,
        store: &S,
        registry: &TaskRegistry,
    ) -> Result<Option<SyncSummary>> {
        if self.migrate {
            store.migrate()?;
        } else if !store.schema_ready()? {
            debug!("periodic task tables do not exist yet; skipping sync");
            return Ok(None);
        }
        SyncDriver::new(store).run(registry).map(Some)
    }

    pub fn has_run(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.synced.store(false, Ordering::SeqCst);
    }
}
