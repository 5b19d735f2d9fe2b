//! The pull scheduler: one serial admission pass per tick.
//!
//! A tick drains candidates from the file-record queue until the capacity
//! buckets fill up, every source runs dry, or the per-tick round cap hits.
//! Each admitted candidate gets a pin record and a spawned pull task; the
//! watchdog takes over from there.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use caulk_common::weighted::WeightedSelection;
use caulk_common::{util::unix_now, BlockAndTime, Source};
use caulk_store::{FileRecord, FileStatus, SealingStats};

use crate::clients::{SealInfoKind, Workload};
use crate::context::{AppContext, FleetSnapshot};
use crate::filter::{filter_file, FilterOutcome};

/// Files at or above this size compete for the large capacity bucket.
pub const LARGE_FILE_BYTES: u64 = 5 * 1024 * 1024 * 1024;

/// Hard floor of free system-disk space; below it nothing is admitted.
pub const SYS_MIN_FREE_BYTES: u64 = 10 * 1024 * 1024 * 1024;

/// Upper bound on candidate rounds per tick, a backstop against a queue
/// full of rejects.
const MAX_ROUNDS_PER_TICK: u32 = 100;

/// A source is exhausted after this many consecutive empty selections.
const MAX_EMPTY_STRIKES: u32 = 2;

const BASE_PIN_TIMEOUT: Duration = Duration::from_secs(3600);

/// Assumed worst-case pull bandwidth, sizing the per-file timeout.
const PULL_BANDWIDTH_BYTES_PER_SEC: u64 = 200 * 1024;

/// Share of `max_pending_tasks` reserved for large files.
const LARGE_BUCKET_SHARE: f64 = 0.4;

/// Slot capacity of the (large, small) buckets. Both floors at one slot so
/// neither class can starve the other entirely.
pub fn bucket_capacity(max_pending_tasks: u32) -> (u64, u64) {
    let large = (max_pending_tasks as f64 * LARGE_BUCKET_SHARE).floor() as u64;
    let small = (max_pending_tasks as f64 * (1.0 - LARGE_BUCKET_SHARE)).floor() as u64;
    (large.max(1), small.max(1))
}

/// Filler-data commitment as a percentage of total worker capacity.
pub fn srd_ratio(w: &Workload) -> f64 {
    let total = w.srd_complete + w.disk_available;
    if total == 0 {
        return 0.0;
    }
    w.srd_complete as f64 / total as f64 * 100.0
}

/// Disk admission: the system disk keeps its hard floor and the worker disk
/// can hold the file plus everything already sealing, at a 2.2x expansion
/// factor. Integer arithmetic keeps the boundary exact.
pub fn disk_enough(file_size: u64, pending_bytes: u64, worker_free: u64, sys_free: u64) -> bool {
    if sys_free <= SYS_MIN_FREE_BYTES {
        return false;
    }
    (worker_free as u128) * 10 >= (file_size as u128 + pending_bytes as u128) * 22
}

/// Admission draw stream, seeded from the node account so that replays of
/// the same queue on the same node shed the same files.
pub fn admission_rng(account: &str) -> ChaCha20Rng {
    let digest = Sha256::digest(account.as_bytes());
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&digest);
    ChaCha20Rng::from_seed(seed)
}

fn pull_timeout(size: u64) -> Duration {
    BASE_PIN_TIMEOUT + Duration::from_secs(size / PULL_BANDWIDTH_BYTES_PER_SEC)
}

/// One scheduler pass.
pub async fn schedule_tick(ctx: Arc<AppContext>) -> Result<()> {
    let Some(fleet) = ctx.fleet() else {
        info!("fleet topology unknown, skipping scheduling");
        return Ok(());
    };
    if fleet.members.is_empty() || fleet.fleet_nodes == 0 {
        info!("fleet snapshot empty, skipping scheduling");
        return Ok(());
    }

    let workload = ctx.worker.workload().await.context("query worker workload")?;
    let cfg = &ctx.config.scheduler;
    let ratio = srd_ratio(&workload);
    if ratio < cfg.min_srd_ratio as f64 {
        info!(
            srd_ratio = ratio,
            min = cfg.min_srd_ratio,
            "filler commitment below threshold, skipping scheduling"
        );
        return Ok(());
    }

    let block_time = ctx.chain.latest_block_time().await.context("query block time")?;
    let Some(selection) = WeightedSelection::new(cfg.strategy.as_items()) else {
        warn!("no usable strategy weights, skipping scheduling");
        return Ok(());
    };
    let mut rng = admission_rng(&ctx.config.node.account);

    // candidates parked in this tick without a status write
    let mut deferred: HashSet<i64> = HashSet::new();
    let mut strikes = [0u32; 3];

    for _round in 0..MAX_ROUNDS_PER_TICK {
        let stats = ctx.db.sealing_stats(LARGE_FILE_BYTES)?;
        let (large_cap, small_cap) = bucket_capacity(cfg.max_pending_tasks);
        if stats.large.count >= large_cap && stats.small.count >= small_cap {
            debug!("both capacity buckets full");
            break;
        }

        let Some((record, strategy)) = next_candidate(
            &ctx,
            &selection,
            &mut rng,
            &stats,
            large_cap,
            small_cap,
            &deferred,
            &mut strikes,
        )?
        else {
            break;
        };

        process_candidate(
            &ctx, record, strategy, &block_time, &fleet, &workload, &stats, &mut rng,
            &mut deferred,
        )
        .await?;
    }
    Ok(())
}

fn strike_slot(source: Source) -> usize {
    match source {
        Source::Wanted => 0,
        Source::ChainEvent => 1,
        Source::DbScan => 2,
    }
}

/// Pick the next candidate record and the strategy it is judged under.
///
/// Explicitly wanted files are always served first and never drawn through
/// the weighted selection. Otherwise a source is drawn by weight and probed
/// for a record fitting a bucket with headroom; repeated empty probes
/// exhaust the source for this tick.
#[allow(clippy::too_many_arguments)]
fn next_candidate(
    ctx: &AppContext,
    selection: &WeightedSelection<Source>,
    rng: &mut ChaCha20Rng,
    stats: &SealingStats,
    large_cap: u64,
    small_cap: u64,
    deferred: &HashSet<i64>,
    strikes: &mut [u32; 3],
) -> Result<Option<(FileRecord, Source)>> {
    loop {
        let exhausted = |s: Source| {
            // zero-weight sources are never drawn at all
            if s != Source::Wanted && selection.weight_of(s) == 0.0 {
                return true;
            }
            strikes[strike_slot(s)] >= MAX_EMPTY_STRIKES
        };
        if [Source::Wanted, Source::ChainEvent, Source::DbScan]
            .into_iter()
            .all(|s| exhausted(s))
        {
            return Ok(None);
        }

        let source = if !exhausted(Source::Wanted) {
            Source::Wanted
        } else {
            selection.pick(rng)
        };
        if exhausted(source) {
            continue;
        }

        let record = if source == Source::Wanted {
            ctx.db.get_pending_file(Source::Wanted, None, None)?
        } else {
            let mut found = None;
            if stats.large.count < large_cap {
                found = ctx
                    .db
                    .get_pending_file(source, Some(LARGE_FILE_BYTES), None)?;
            }
            if found.is_none() && stats.small.count < small_cap {
                found = ctx
                    .db
                    .get_pending_file(source, None, Some(LARGE_FILE_BYTES))?;
            }
            found
        };

        match record {
            Some(rec) if deferred.contains(&rec.id) => {
                // already parked this tick; treat the source as dry
                strikes[strike_slot(source)] += 1;
            }
            Some(rec) => {
                strikes[strike_slot(source)] = 0;
                // wanted records carry the indexing source of their row but
                // are judged under the wanted strategy
                return Ok(Some((rec, source)));
            }
            None => {
                strikes[strike_slot(source)] += 1;
            }
        }
    }
}

/// Run one candidate through the filter pipeline and the capacity, seal and
/// disk checks, then either launch the pull or dispose of the record.
#[allow(clippy::too_many_arguments)]
async fn process_candidate(
    ctx: &Arc<AppContext>,
    record: FileRecord,
    strategy: Source,
    block_time: &BlockAndTime,
    fleet: &FleetSnapshot,
    workload: &Workload,
    stats: &SealingStats,
    rng: &mut ChaCha20Rng,
    deferred: &mut HashSet<i64>,
) -> Result<()> {
    let now = unix_now();
    let cfg = &ctx.config.scheduler;

    // explicitly wanted files skip the filter pipeline, nothing else
    if strategy != Source::Wanted {
        let draw = rng.gen::<f64>();
        let outcome = filter_file(&record, strategy, block_time, fleet, cfg, draw, now);
        match outcome {
            FilterOutcome::Good => {}
            FilterOutcome::ReplicasNotEnough => {
                debug!(cid = %record.cid, "below replica floor, deferring");
                deferred.insert(record.id);
                return Ok(());
            }
            other => {
                debug!(cid = %record.cid, outcome = ?other, "filtered out");
                if let Some(status) = other.file_status() {
                    ctx.db.update_file_status(record.id, status, now)?;
                }
                return Ok(());
            }
        }
    }

    // a cid with a live seal, or one the worker already knows terminally,
    // needs no second pull
    if ctx.db.has_live_seal(&record.cid)? {
        ctx.db
            .update_file_status(record.id, FileStatus::Handled, now)?;
        return Ok(());
    }
    match ctx.worker.seal_info(&record.cid).await? {
        Some(SealInfoKind::Valid) | Some(SealInfoKind::Lost) => {
            ctx.db
                .update_file_status(record.id, FileStatus::Handled, now)?;
            return Ok(());
        }
        Some(SealInfoKind::Pending) | None => {}
    }

    if !disk_enough(
        record.size,
        stats.total_bytes(),
        workload.disk_available,
        workload.sys_disk_available,
    ) {
        info!(cid = %record.cid, size = record.size, "not enough disk space");
        ctx.db
            .update_file_status(record.id, FileStatus::InsufficientSpace, now)?;
        return Ok(());
    }

    ctx.db.add_pin(&record.cid, record.size, strategy, now)?;
    ctx.db
        .update_file_status(record.id, FileStatus::Handled, now)?;
    info!(cid = %record.cid, size = record.size, strategy = %strategy, "pull admitted");
    spawn_pull(ctx, record.cid, record.size);
    Ok(())
}

/// Launch the pull in its own task and register the handle for the
/// watchdog. The task only reports and deregisters itself; all pin-record
/// transitions out of `sealing` belong to the watchdog.
fn spawn_pull(ctx: &Arc<AppContext>, cid: String, size: u64) {
    let ctx2 = ctx.clone();
    let cid2 = cid.clone();
    let handle = tokio::spawn(async move {
        let timeout = pull_timeout(size);
        match ctx2.content.pin(&cid2, timeout).await {
            Ok(true) => debug!(cid = %cid2, "pull complete"),
            Ok(false) => warn!(cid = %cid2, "pull rejected by content store"),
            Err(err) => warn!(cid = %cid2, error = %err, "pull failed"),
        }
        ctx2.pulls.remove(&cid2);
    });
    ctx.pulls.insert(cid, handle);
}
