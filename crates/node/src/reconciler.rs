//! Orphan reconciliation between the worker's pending jobs and the local
//! pin records.
//!
//! A crash between `seal_end` and the record write (or a wiped database)
//! can leave the worker sealing cids this node no longer tracks. Those jobs
//! burn disk for nothing, so they get cancelled. The sweep runs on a slow
//! persisted cadence and deliberately skips its first opportunity after a
//! fresh database, when "no local record" proves nothing.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use caulk_common::util::unix_now;

use crate::context::AppContext;

const KEY_LAST_RECONCILE: &str = "seal-cleanup:last-run";

pub const RECONCILE_INTERVAL_SECS: i64 = 2 * 24 * 3600;

pub async fn reconcile_tick(ctx: Arc<AppContext>) -> Result<()> {
    let now = unix_now();
    match ctx.db.read_time(KEY_LAST_RECONCILE)? {
        None => {
            // arm the timer only; never sweep against a fresh database
            ctx.db.save_time(KEY_LAST_RECONCILE, now)?;
            debug!("first reconciler run, arming timer only");
            return Ok(());
        }
        Some(last) if now - last < RECONCILE_INTERVAL_SECS => {
            return Ok(());
        }
        Some(_) => {}
    }

    let jobs = ctx.worker.pending_jobs().await.context("query pending jobs")?;
    let local: HashSet<String> = ctx
        .db
        .sealing_records()?
        .into_iter()
        .map(|r| r.cid)
        .collect();

    let mut cancelled = 0usize;
    for cid in jobs.keys() {
        if local.contains(cid) {
            continue;
        }
        match ctx.worker.seal_end(cid).await {
            Ok(_) => cancelled += 1,
            Err(err) => warn!(cid = %cid, error = %err, "orphan seal end failed"),
        }
    }
    if cancelled > 0 {
        info!(count = cancelled, "cancelled orphaned seal jobs");
    }
    ctx.db.save_time(KEY_LAST_RECONCILE, now)?;
    Ok(())
}
