use std::collections::HashMap;

use periodic_registry::ScheduleDescriptor;
use tracing::debug;

use crate::error::Result;
use crate::store::PeriodicStore;
use crate::types::ScheduleRef;

/// Maps schedule descriptors to persisted schedule rows for one pass.
///
/// Identical descriptors resolve to the same row; each distinct descriptor
/// hits the store at most once per resolver.
pub struct ScheduleResolver<'s, S: PeriodicStore + ?Sized> {
    store: &'s S,
    resolved: HashMap<ScheduleDescriptor, ScheduleRef>,
}

impl<'s, S: PeriodicStore + ?Sized> ScheduleResolver<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            resolved: HashMap::new(),
        }
    }

    /// Find or create the schedule row for `descriptor`.
    ///
    /// The descriptor is re-validated first, so a malformed one that skipped
    /// registration still fails here with a configuration error.
    pub fn resolve(&mut self, descriptor: &ScheduleDescriptor) -> Result<ScheduleRef> {
        let normalized = descriptor.normalized()?;
        if let Some(schedule) = self.resolved.get(&normalized) {
            return Ok(*schedule);
        }

        let schedule = match &normalized {
            ScheduleDescriptor::Interval { seconds } => {
                self.store.find_or_create_interval(*seconds)?
            }
            ScheduleDescriptor::Crontab(fields) => self.store.find_or_create_crontab(fields)?,
        };
        debug!(%normalized, %schedule, "schedule resolved");
        self.resolved.insert(normalized, schedule);
        Ok(schedule)
    }

    /// Number of distinct schedules resolved so far.
    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}
