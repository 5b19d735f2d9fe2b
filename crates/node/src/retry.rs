//! Retry sweeper over stuck file records.
//!
//! Two sweeps per tick: records that have waited longer than the maximum
//! pending age are failed for good, and records parked in a transient
//! status past the cooldown go back to `new` for another pass through the
//! filter pipeline.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use caulk_common::util::unix_now;

use crate::context::AppContext;

/// Records older than this are beyond saving.
pub const MAX_FILE_PENDING_SECS: i64 = 30 * 24 * 3600;

/// Cooldown before a transiently-parked record is retried.
pub const FILE_RETRY_INTERVAL_SECS: i64 = 30 * 60;

pub async fn retry_tick(ctx: Arc<AppContext>) -> Result<()> {
    let now = unix_now();
    let failed = ctx.db.fail_aged_files(now - MAX_FILE_PENDING_SECS, now)?;
    if failed > 0 {
        info!(count = failed, "aged out stuck file records");
    }
    let reset = ctx.db.reset_stuck_files(now - FILE_RETRY_INTERVAL_SECS, now)?;
    if reset > 0 {
        info!(count = reset, "recycled file records for retry");
    }
    Ok(())
}
