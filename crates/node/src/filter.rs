//! The filter pipeline: a pure decision function over one file record.
//!
//! Rules are evaluated in a fixed order and the first match wins. Every
//! input is passed in explicitly (current time included), so identical
//! inputs always produce the identical outcome.

use caulk_common::chain_math::estimate_time_at_block;
use caulk_common::cid::shard_residue;
use caulk_common::{BlockAndTime, SchedulerConfig, Source};
use caulk_common::util::bytes_to_mb;
use caulk_store::{FileRecord, FileStatus};

use crate::context::FleetSnapshot;

/// Fleet-wide herd-control constant: the expected number of nodes racing
/// for any newly ordered file.
pub const PROB_TAKE_BASE: f64 = 150.0;

/// A dbScan record with no replica count after this long is presumed dead.
pub const MAX_NO_REPLICA_SECS: i64 = 10 * 24 * 3600;

/// Minimum remaining file lifetime worth sealing for.
pub const MIN_LIFETIME_SECS: i64 = 4 * 30 * 24 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    /// Admit to the capacity and disk checks.
    Good,
    /// The CID does not parse at all.
    InvalidCid,
    /// Sat too long without ever getting a replica count.
    InvalidNoReplica,
    /// Another member of the replica group owns this file.
    NodeSkipped,
    /// Shed by the probabilistic admission draw.
    PfSkipped,
    /// Estimated on-chain expiry already passed.
    Expired,
    /// Remaining lifetime below the sealing-worthiness floor.
    LifeTimeTooShort,
    SizeTooSmall,
    SizeTooLarge,
    /// Below the configured replica floor; re-selected later, no status
    /// change.
    ReplicasNotEnough,
    /// Already well-replicated, no value in pulling.
    TooManyReplicas,
    /// No expiry known yet; re-check later.
    PendingForReplica,
}

impl FilterOutcome {
    /// The file-record status this outcome maps to; `None` when the record
    /// is left untouched.
    pub fn file_status(&self) -> Option<FileStatus> {
        match self {
            FilterOutcome::Good | FilterOutcome::ReplicasNotEnough => None,
            FilterOutcome::InvalidCid | FilterOutcome::InvalidNoReplica => {
                Some(FileStatus::Invalid)
            }
            FilterOutcome::NodeSkipped
            | FilterOutcome::PfSkipped
            | FilterOutcome::LifeTimeTooShort
            | FilterOutcome::SizeTooSmall
            | FilterOutcome::SizeTooLarge
            | FilterOutcome::TooManyReplicas => Some(FileStatus::Skipped),
            FilterOutcome::Expired => Some(FileStatus::Expired),
            FilterOutcome::PendingForReplica => Some(FileStatus::PendingReplica),
        }
    }
}

/// Probability of taking a fresh chain-event file: throttle the fleet-wide
/// herd down to roughly [`PROB_TAKE_BASE`] nodes, then compensate for the
/// group-internal sharding split.
pub fn p_take(fleet_nodes: u64, group_size: u64) -> f64 {
    let base = (PROB_TAKE_BASE / fleet_nodes.max(1) as f64).min(1.0);
    base * group_size.max(1) as f64
}

/// Decide what to do with one candidate record.
///
/// `draw` is a uniform sample in `[0, 1)` from the per-node-account seeded
/// stream; keeping it a parameter keeps the function pure.
pub fn filter_file(
    record: &FileRecord,
    strategy: Source,
    block_time: &BlockAndTime,
    fleet: &FleetSnapshot,
    cfg: &SchedulerConfig,
    draw: f64,
    now: i64,
) -> FilterOutcome {
    // 1. deterministic sharding across the replica group
    match shard_residue(&record.cid, fleet.group_size()) {
        Ok(residue) => {
            if residue != fleet.position as u64 {
                return FilterOutcome::NodeSkipped;
            }
        }
        Err(_) => return FilterOutcome::InvalidCid,
    }

    // 2. probabilistic load shedding, fresh chain orders only
    match strategy {
        Source::ChainEvent => {
            if p_take(fleet.fleet_nodes, fleet.group_size()) <= draw {
                return FilterOutcome::PfSkipped;
            }
        }
        Source::DbScan | Source::Wanted => {}
    }

    // 3. size bounds (MB, 0 = unbounded)
    let size_mb = bytes_to_mb(record.size);
    if cfg.min_file_size_mb > 0 && size_mb < cfg.min_file_size_mb as f64 {
        return FilterOutcome::SizeTooSmall;
    }
    if cfg.max_file_size_mb > 0 && size_mb > cfg.max_file_size_mb as f64 {
        return FilterOutcome::SizeTooLarge;
    }

    // 4. replica bounds
    if strategy == Source::DbScan && cfg.min_replicas > 0 && record.replicas < cfg.min_replicas {
        return FilterOutcome::ReplicasNotEnough;
    }
    if cfg.max_replicas > 0 && record.replicas >= cfg.max_replicas {
        return FilterOutcome::TooManyReplicas;
    }

    // 5. freshness, for records discovered by the db scan
    if record.indexer == Source::DbScan {
        if record.expire_at == 0 {
            if now - record.create_at > MAX_NO_REPLICA_SECS {
                return FilterOutcome::InvalidNoReplica;
            }
            return FilterOutcome::PendingForReplica;
        }
        let expires_at = estimate_time_at_block(record.expire_at, block_time);
        if expires_at <= now {
            return FilterOutcome::Expired;
        }
        if expires_at - now < MIN_LIFETIME_SECS {
            return FilterOutcome::LifeTimeTooShort;
        }
    }

    FilterOutcome::Good
}

#[cfg(test)]
mod tests {
    use super::*;
    use caulk_common::chain_math::BLOCK_TIME_SECS;
    use caulk_common::StrategyWeights;

    const NOW: i64 = 1_700_000_000;
    const MB: u64 = 1024 * 1024;

    fn cfg() -> SchedulerConfig {
        SchedulerConfig {
            strategy: StrategyWeights { new_files: 60.0, existing_files: 40.0 },
            min_srd_ratio: 0,
            max_pending_tasks: 16,
            min_file_size_mb: 0,
            max_file_size_mb: 0,
            min_replicas: 0,
            max_replicas: 0,
        }
    }

    fn fleet(n_members: usize, position: usize, fleet_nodes: u64) -> FleetSnapshot {
        FleetSnapshot {
            members: (0..n_members).map(|i| format!("node{i}")).collect(),
            position,
            fleet_nodes,
        }
    }

    fn record(cid: &str, source: Source) -> FileRecord {
        FileRecord {
            id: 1,
            cid: cid.to_string(),
            expire_at: 0,
            size: 10 * MB,
            amount: 0,
            replicas: 1,
            indexer: source,
            status: FileStatus::New,
            last_updated: NOW,
            create_at: NOW,
        }
    }

    fn anchor() -> BlockAndTime {
        BlockAndTime { block: 1_000_000, time: NOW }
    }

    // "f00" decodes to [0x00]: residue 0 for every group size
    const CID_ZERO: &str = "f00";
    // "f01" decodes to [0x01]: residue 1 in any group of 2+
    const CID_ONE: &str = "f01";

    #[test]
    fn test_sharding_first() {
        let r = record(CID_ONE, Source::ChainEvent);
        assert_eq!(
            filter_file(&r, Source::ChainEvent, &anchor(), &fleet(2, 0, 10), &cfg(), 0.0, NOW),
            FilterOutcome::NodeSkipped
        );
        let bad = record("definitely not a cid", Source::ChainEvent);
        assert_eq!(
            filter_file(&bad, Source::ChainEvent, &anchor(), &fleet(1, 0, 10), &cfg(), 0.0, NOW),
            FilterOutcome::InvalidCid
        );
    }

    #[test]
    fn test_p_take_shape() {
        assert_eq!(p_take(10, 1), 1.0); // small fleet: always take
        assert!((p_take(1_000, 4) - 0.6).abs() < 1e-9);
        assert!(p_take(1_000_000, 1) < 0.001);
    }

    #[test]
    fn test_probabilistic_shedding_only_for_chain_events() {
        let r = record(CID_ZERO, Source::ChainEvent);
        let big_fleet = fleet(1, 0, 1_000_000);
        assert_eq!(
            filter_file(&r, Source::ChainEvent, &anchor(), &big_fleet, &cfg(), 0.5, NOW),
            FilterOutcome::PfSkipped
        );
        // dbScan strategy never sheds; this record has no expiry yet
        let r = record(CID_ZERO, Source::DbScan);
        assert_eq!(
            filter_file(&r, Source::DbScan, &anchor(), &big_fleet, &cfg(), 0.5, NOW),
            FilterOutcome::PendingForReplica
        );
    }

    #[test]
    fn test_size_bounds() {
        let mut c = cfg();
        c.min_file_size_mb = 20;
        let r = record(CID_ZERO, Source::ChainEvent);
        assert_eq!(
            filter_file(&r, Source::ChainEvent, &anchor(), &fleet(1, 0, 10), &c, 0.0, NOW),
            FilterOutcome::SizeTooSmall
        );
        let mut c = cfg();
        c.max_file_size_mb = 5;
        assert_eq!(
            filter_file(&r, Source::ChainEvent, &anchor(), &fleet(1, 0, 10), &c, 0.0, NOW),
            FilterOutcome::SizeTooLarge
        );
    }

    #[test]
    fn test_replicas_not_enough_scenario() {
        // 10 MB file, 0 replicas, floor of 5, prefer-existing strategy
        let mut c = cfg();
        c.min_replicas = 5;
        let mut r = record(CID_ZERO, Source::DbScan);
        r.replicas = 0;
        assert_eq!(
            filter_file(&r, Source::DbScan, &anchor(), &fleet(1, 0, 10), &c, 0.0, NOW),
            FilterOutcome::ReplicasNotEnough
        );
        // the replica floor only binds the prefer-existing strategy
        let mut r = record(CID_ZERO, Source::ChainEvent);
        r.replicas = 0;
        assert_eq!(
            filter_file(&r, Source::ChainEvent, &anchor(), &fleet(1, 0, 10), &c, 0.0, NOW),
            FilterOutcome::Good
        );
    }

    #[test]
    fn test_too_many_replicas() {
        let mut c = cfg();
        c.max_replicas = 200;
        let mut r = record(CID_ZERO, Source::ChainEvent);
        r.replicas = 200;
        assert_eq!(
            filter_file(&r, Source::ChainEvent, &anchor(), &fleet(1, 0, 10), &c, 0.0, NOW),
            FilterOutcome::TooManyReplicas
        );
    }

    #[test]
    fn test_no_replica_grace_window() {
        let mut r = record(CID_ZERO, Source::DbScan);
        r.expire_at = 0;
        r.create_at = NOW - 11 * 24 * 3600;
        assert_eq!(
            filter_file(&r, Source::DbScan, &anchor(), &fleet(1, 0, 10), &cfg(), 0.0, NOW),
            FilterOutcome::InvalidNoReplica
        );
        r.create_at = NOW - 9 * 24 * 3600;
        assert_eq!(
            filter_file(&r, Source::DbScan, &anchor(), &fleet(1, 0, 10), &cfg(), 0.0, NOW),
            FilterOutcome::PendingForReplica
        );
    }

    #[test]
    fn test_lifetime_rules() {
        let mut r = record(CID_ZERO, Source::DbScan);
        // expiry one block in the past
        r.expire_at = anchor().block - 1;
        assert_eq!(
            filter_file(&r, Source::DbScan, &anchor(), &fleet(1, 0, 10), &cfg(), 0.0, NOW),
            FilterOutcome::Expired
        );
        // expiry in ~2 months: under the 4 month floor
        r.expire_at = anchor().block + (60 * 24 * 3600 / BLOCK_TIME_SECS) as u64;
        assert_eq!(
            filter_file(&r, Source::DbScan, &anchor(), &fleet(1, 0, 10), &cfg(), 0.0, NOW),
            FilterOutcome::LifeTimeTooShort
        );
        // expiry in ~1 year: good
        r.expire_at = anchor().block + (365 * 24 * 3600 / BLOCK_TIME_SECS) as u64;
        assert_eq!(
            filter_file(&r, Source::DbScan, &anchor(), &fleet(1, 0, 10), &cfg(), 0.0, NOW),
            FilterOutcome::Good
        );
    }

    #[test]
    fn test_filter_is_pure() {
        let r = record(CID_ZERO, Source::ChainEvent);
        let f = fleet(3, 0, 5_000);
        let first = filter_file(&r, Source::ChainEvent, &anchor(), &f, &cfg(), 0.3, NOW);
        for _ in 0..10 {
            assert_eq!(
                filter_file(&r, Source::ChainEvent, &anchor(), &f, &cfg(), 0.3, NOW),
                first
            );
        }
    }

    #[test]
    fn test_outcome_status_mapping() {
        assert_eq!(FilterOutcome::Good.file_status(), None);
        assert_eq!(FilterOutcome::ReplicasNotEnough.file_status(), None);
        assert_eq!(FilterOutcome::InvalidCid.file_status(), Some(FileStatus::Invalid));
        assert_eq!(FilterOutcome::NodeSkipped.file_status(), Some(FileStatus::Skipped));
        assert_eq!(FilterOutcome::Expired.file_status(), Some(FileStatus::Expired));
        assert_eq!(
            FilterOutcome::PendingForReplica.file_status(),
            Some(FileStatus::PendingReplica)
        );
    }
}
