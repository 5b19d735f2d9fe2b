//! # Caulk Node Crate
//!
//! The pull/seal scheduling engine of a storage-fleet node: watches the
//! file records produced by the chain indexers, decides cooperatively with
//! the rest of the replica group which files this node should fetch and
//! seal, and supervises those seals to completion or failure.
//!
//! ## Loops
//!
//! Each loop is an independently scheduled, strictly serial tokio task
//! sharing the same record store and collaborator clients:
//!
//! - [`scheduler`]: admission control: candidate selection, filtering,
//!   capacity and disk checks, seal launch
//! - [`watchdog`]: progress-based stall detection for live seals
//! - [`retry`]: ages out permanently-stuck records, recycles transient ones
//! - [`reconciler`]: cancels worker-side seal jobs with no local record
//! - [`gc`]: periodic content-store repo garbage collection
//!
//! The loops own disjoint status transitions, so their only shared state is
//! the store itself; collaborator failures abort a single tick and are
//! retried on the next one.

pub mod clients;
pub mod context;
pub mod filter;
pub mod gc;
pub mod reconciler;
pub mod retry;
pub mod scheduler;
pub mod task;
pub mod watchdog;

use std::sync::Arc;
use std::time::Duration;

pub use context::AppContext;
use task::{spawn_interval, TaskHandle};

/// Start every engine loop; the returned handles stop them.
///
/// The scheduler starts almost immediately; the slower housekeeping loops
/// wait out a full interval first, matching a restart-safe cold boot.
pub fn start_tasks(ctx: &Arc<AppContext>) -> Vec<TaskHandle> {
    let minute = Duration::from_secs(60);
    vec![
        spawn_interval(
            "pull-scheduler",
            Duration::from_secs(10),
            minute,
            ctx.clone(),
            scheduler::schedule_tick,
        ),
        spawn_interval("seal-watchdog", 2 * minute, 2 * minute, ctx.clone(), watchdog::watchdog_tick),
        spawn_interval("file-retry", 30 * minute, 30 * minute, ctx.clone(), retry::retry_tick),
        spawn_interval("seal-reconciler", 60 * minute, 60 * minute, ctx.clone(), reconciler::reconcile_tick),
        spawn_interval("content-gc", 60 * minute, 60 * minute, ctx.clone(), gc::gc_tick),
    ]
}
