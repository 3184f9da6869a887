//! `periodic-sync` makes the persisted periodic task tables mirror a
//! [`periodic_registry::TaskRegistry`].
//!
//! # Pass
//!
//! 1. [`resolver::ScheduleResolver`] finds or creates one schedule row per
//!    distinct descriptor.
//! 2. [`reconciler::TaskReconciler`] creates, updates (changed fields only) or
//!    skips each task row.
//! 3. [`sweeper::OrphanSweeper`] deletes managed rows no longer registered.
//!
//! [`driver::SyncDriver`] runs the three in order; [`hook::StartupSync`] wraps
//! the driver for host start-up.
//!
//! Only rows whose description carries [`types::MANAGED_DESCRIPTION`] are
//! ever written or deleted. Schedule rows are never updated or removed.
//! Concurrent passes from several processes are not coordinated.

pub mod db;
pub mod driver;
pub mod error;
pub mod hook;
pub mod reconciler;
pub mod resolver;
pub mod store;
pub mod sweeper;
pub mod types;

pub use driver::{SyncDriver, SyncSummary};
pub use error::{Result, SyncError};
pub use hook::StartupSync;
pub use reconciler::ReconcileOutcome;
pub use store::{PeriodicStore, SqliteStore};
pub use types::{ScheduleRef, TaskField, TaskRow, MANAGED_DESCRIPTION};
