//! Shared per-process context handed to every loop invocation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;

use caulk_common::Config;
use caulk_store::Store;

use crate::clients::{ChainClient, ContentStore, SealWorker};

/// This node's view of the fleet topology, refreshed by out-of-scope
/// updater tasks. Scheduling is skipped while it is unknown.
#[derive(Debug, Clone)]
pub struct FleetSnapshot {
    /// Sorted accounts of this node's replica group.
    pub members: Vec<String>,
    /// This node's zero-based index within `members`.
    pub position: usize,
    /// Active node count across the whole fleet.
    pub fleet_nodes: u64,
}

impl FleetSnapshot {
    /// Build a snapshot from an unsorted member list. Returns `None` when
    /// this node is not (yet) part of the group.
    pub fn from_members(
        mut members: Vec<String>,
        own_account: &str,
        fleet_nodes: u64,
    ) -> Option<FleetSnapshot> {
        members.sort();
        let position = members.iter().position(|m| m == own_account)?;
        Some(FleetSnapshot { members, position, fleet_nodes })
    }

    pub fn group_size(&self) -> u64 {
        self.members.len() as u64
    }
}

/// Cancellation handles of in-flight pulls, keyed by cid.
///
/// Exactly one consumer ever invokes a handle (the watchdog's stall path);
/// entries are removed on consumption, or by the pull task itself when it
/// finishes.
#[derive(Default)]
pub struct PullHandles {
    inner: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl PullHandles {
    pub fn insert(&self, cid: String, handle: JoinHandle<()>) {
        // a replaced handle can only belong to an already-finished pull
        self.inner.lock().insert(cid, handle);
    }

    pub fn take(&self, cid: &str) -> Option<JoinHandle<()>> {
        self.inner.lock().remove(cid)
    }

    pub fn remove(&self, cid: &str) {
        self.inner.lock().remove(cid);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Everything a loop invocation needs, owned once per process.
pub struct AppContext {
    pub config: Config,
    pub db: Store,
    pub chain: Arc<dyn ChainClient>,
    pub content: Arc<dyn ContentStore>,
    pub worker: Arc<dyn SealWorker>,
    pub pulls: PullHandles,
    fleet: RwLock<Option<FleetSnapshot>>,
}

impl AppContext {
    pub fn new(
        config: Config,
        db: Store,
        chain: Arc<dyn ChainClient>,
        content: Arc<dyn ContentStore>,
        worker: Arc<dyn SealWorker>,
    ) -> AppContext {
        AppContext {
            config,
            db,
            chain,
            content,
            worker,
            pulls: PullHandles::default(),
            fleet: RwLock::new(None),
        }
    }

    pub fn set_fleet(&self, snapshot: Option<FleetSnapshot>) {
        *self.fleet.write() = snapshot;
    }

    pub fn fleet(&self) -> Option<FleetSnapshot> {
        self.fleet.read().clone()
    }

    /// Re-read the group membership and fleet size from the chain. Hosts
    /// call this from their topology updater; until it succeeds with this
    /// node in the group, scheduling is skipped.
    pub async fn refresh_fleet(&self) -> anyhow::Result<()> {
        let members = self.chain.group_members(&self.config.node.owner).await?;
        let nodes = self.chain.fleet_node_count().await?;
        self.set_fleet(FleetSnapshot::from_members(
            members,
            &self.config.node.account,
            nodes,
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_position_is_sorted_order() {
        let snap = FleetSnapshot::from_members(
            vec!["carol".into(), "alice".into(), "bob".into()],
            "bob",
            100,
        )
        .expect("member of group");
        assert_eq!(snap.members, vec!["alice", "bob", "carol"]);
        assert_eq!(snap.position, 1);
        assert_eq!(snap.group_size(), 3);
    }

    #[test]
    fn test_snapshot_requires_membership() {
        assert!(FleetSnapshot::from_members(vec!["alice".into()], "mallory", 100).is_none());
    }
}
