use std::collections::HashSet;

use tracing::info;

use crate::error::Result;
use crate::store::PeriodicStore;

/// Deletes managed task rows whose names are gone from the registry.
pub struct OrphanSweeper<'s, S: PeriodicStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: PeriodicStore + ?Sized> OrphanSweeper<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Delete every managed row not named in `live_names`. Returns the count.
    ///
    /// Rows without the ownership marker are never considered.
    pub fn sweep(&self, live_names: &HashSet<String>) -> Result<usize> {
        let stale: Vec<_> = self
            .store
            .list_owned_tasks()?
            .into_iter()
            .filter(|row| row.is_managed() && !live_names.contains(&row.name))
            .collect();

        for row in &stale {
            self.store.delete_task(row.id)?;
        }

        if !stale.is_empty() {
            let names: Vec<&str> = stale.iter().map(|row| row.name.as_str()).collect();
            info!(count = stale.len(), ?names, "removed stale periodic task(s)");
        }
        Ok(stale.len())
    }
}
