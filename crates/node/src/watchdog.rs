//! Seal supervision: progress-based stall detection over live pin records.
//!
//! The watchdog is the only writer of pin-record transitions out of
//! `sealing`. Each tick compares the worker's live pending-job map against
//! the local records; a job that exists but made no progress since the last
//! check is stalled, a job the worker no longer carries is finished one way
//! or the other.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use caulk_common::util::unix_now;
use caulk_store::{PinRecord, PinStatus};

use crate::clients::SealInfoKind;
use crate::context::AppContext;

/// Grace period after seal start, and the minimum spacing between progress
/// checks of the same record.
pub const SEAL_START_GRACE_SECS: i64 = 600;

pub async fn watchdog_tick(ctx: Arc<AppContext>) -> Result<()> {
    let records = ctx.db.sealing_records()?;
    if records.is_empty() {
        return Ok(());
    }
    let jobs = ctx.worker.pending_jobs().await.context("query pending jobs")?;
    let now = unix_now();

    for record in records {
        if now - record.pin_at < SEAL_START_GRACE_SECS {
            continue;
        }
        if record.last_check_at > 0 && now - record.last_check_at < SEAL_START_GRACE_SECS {
            continue;
        }

        match jobs.get(&record.cid) {
            Some(job) if job.sealed_size > record.sealed_size => {
                debug!(cid = %record.cid, sealed = job.sealed_size, "seal progressing");
                ctx.db.update_pin_progress(record.id, job.sealed_size, now)?;
            }
            Some(_) => {
                info!(cid = %record.cid, sealed = record.sealed_size, "seal stalled");
                fail_seal(&ctx, &record, now).await?;
            }
            None => {
                // no longer pending: either done or abandoned by the worker
                match ctx.worker.seal_info(&record.cid).await? {
                    Some(SealInfoKind::Valid) | Some(SealInfoKind::Lost) => {
                        info!(cid = %record.cid, "seal complete");
                        ctx.db.update_pin_status(record.id, PinStatus::Sealed, now)?;
                        ctx.pulls.remove(&record.cid);
                    }
                    Some(SealInfoKind::Pending) | None => {
                        info!(cid = %record.cid, "seal vanished from worker");
                        fail_seal(&ctx, &record, now).await?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Fail one seal: record first, then cancel the pull and tell the worker to
/// drop the job. Worker refusal is logged, not propagated; the record is
/// already terminal.
async fn fail_seal(ctx: &Arc<AppContext>, record: &PinRecord, now: i64) -> Result<()> {
    ctx.db.update_pin_status(record.id, PinStatus::Failed, now)?;
    if let Some(handle) = ctx.pulls.take(&record.cid) {
        handle.abort();
    }
    match ctx.worker.seal_end(&record.cid).await {
        Ok(true) => {}
        Ok(false) => debug!(cid = %record.cid, "worker had no job to end"),
        Err(err) => warn!(cid = %record.cid, error = %err, "seal end failed"),
    }
    Ok(())
}
