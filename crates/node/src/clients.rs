//! Collaborator client contracts.
//!
//! The engine never talks to the chain, the content store or the sealing
//! worker directly; it goes through these narrow traits. Production wiring
//! injects real RPC clients, tests inject mocks.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use caulk_common::BlockAndTime;

/// Read-only view of the chain needed for admission decisions.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Number of active storage nodes in the whole fleet.
    async fn fleet_node_count(&self) -> Result<u64>;

    /// Node accounts of the replica group owned by `owner`, sorted; this
    /// node's zero-based position in the list is its shard index.
    async fn group_members(&self, owner: &str) -> Result<Vec<String>>;

    /// Latest observed (block, time) anchor for expiry estimation.
    async fn latest_block_time(&self) -> Result<BlockAndTime>;
}

/// Content-store operations (fetching and housekeeping).
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fetch and pin a file. Resolves true once the file is fully local.
    /// The scheduler runs this inside a spawned task whose `JoinHandle`
    /// doubles as the cancellation handle.
    async fn pin(&self, cid: &str, timeout: Duration) -> Result<bool>;

    /// Garbage-collect the content store's local repo.
    async fn repo_gc(&self, timeout: Duration) -> Result<()>;
}

/// Sealing worker telemetry, in bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Workload {
    /// Capacity already committed to non-file filler data.
    pub srd_complete: u64,
    /// Free space the worker can still seal into.
    pub disk_available: u64,
    /// Free space on the system disk.
    pub sys_disk_available: u64,
}

/// One entry of the worker's live pending-job map.
#[derive(Debug, Clone, Copy)]
pub struct PendingJob {
    /// Bytes sealed so far.
    pub sealed_size: u64,
}

/// Terminal knowledge the worker has about a cid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealInfoKind {
    /// Sealed and provable.
    Valid,
    /// Sealed but currently lost; recoverable.
    Lost,
    /// Still being worked on.
    Pending,
}

/// The sealing worker's control surface.
#[async_trait]
pub trait SealWorker: Send + Sync {
    async fn workload(&self) -> Result<Workload>;

    /// Live pending-job map keyed by cid.
    async fn pending_jobs(&self) -> Result<HashMap<String, PendingJob>>;

    /// What the worker knows about `cid`; `None` when it has never seen it.
    async fn seal_info(&self, cid: &str) -> Result<Option<SealInfoKind>>;

    /// Abandon the seal job for `cid`. Returns false when the worker had no
    /// such job.
    async fn seal_end(&self, cid: &str) -> Result<bool>;
}
