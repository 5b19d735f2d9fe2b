//! Typed rows and status state machines.

use caulk_common::Source;

/// File lifecycle status.
///
/// ```text
/// new ──▶ pending_replica ──┐
///  │         ▲              │ (retry sweeper: cooldown elapsed ──▶ new,
///  ├──▶ insufficient_space ─┘                 max age exceeded ──▶ failed)
///  │
///  ├──▶ invalid / skipped / expired / handled / failed   (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    New,
    PendingReplica,
    InsufficientSpace,
    Invalid,
    Skipped,
    Expired,
    Handled,
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::New => "new",
            FileStatus::PendingReplica => "pending_replica",
            FileStatus::InsufficientSpace => "insufficient_space",
            FileStatus::Invalid => "invalid",
            FileStatus::Skipped => "skipped",
            FileStatus::Expired => "expired",
            FileStatus::Handled => "handled",
            FileStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<FileStatus> {
        match s {
            "new" => Some(FileStatus::New),
            "pending_replica" => Some(FileStatus::PendingReplica),
            "insufficient_space" => Some(FileStatus::InsufficientSpace),
            "invalid" => Some(FileStatus::Invalid),
            "skipped" => Some(FileStatus::Skipped),
            "expired" => Some(FileStatus::Expired),
            "handled" => Some(FileStatus::Handled),
            "failed" => Some(FileStatus::Failed),
            _ => None,
        }
    }
}

/// Seal attempt status; `sealed` and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinStatus {
    Sealing,
    Sealed,
    Failed,
}

impl PinStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PinStatus::Sealing => "sealing",
            PinStatus::Sealed => "sealed",
            PinStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<PinStatus> {
        match s {
            "sealing" => Some(PinStatus::Sealing),
            "sealed" => Some(PinStatus::Sealed),
            "failed" => Some(PinStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupStatus {
    Pending,
    Done,
    Failed,
}

impl CleanupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CleanupStatus::Pending => "pending",
            CleanupStatus::Done => "done",
            CleanupStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<CleanupStatus> {
        match s {
            "pending" => Some(CleanupStatus::Pending),
            "done" => Some(CleanupStatus::Done),
            "failed" => Some(CleanupStatus::Failed),
            _ => None,
        }
    }
}

/// On-chain file information as delivered by an indexer.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub cid: String,
    /// Expiry block number; 0 = not known yet.
    pub expire_at: u64,
    pub size: u64,
    /// Tip/price amount attached to the order.
    pub amount: u64,
    pub replicas: u32,
}

/// One row of `file_record`; at most one per (cid, indexer).
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub id: i64,
    pub cid: String,
    pub expire_at: u64,
    pub size: u64,
    pub amount: u64,
    pub replicas: u32,
    pub indexer: Source,
    pub status: FileStatus,
    pub last_updated: i64,
    pub create_at: i64,
}

/// One row of `pin_record`; one per seal attempt.
#[derive(Debug, Clone)]
pub struct PinRecord {
    pub id: i64,
    pub cid: String,
    pub size: u64,
    pub status: PinStatus,
    pub pin_at: i64,
    pub last_updated: i64,
    /// Source whose strategy admitted this seal.
    pub pin_by: Source,
    /// Last sealed-byte count reported by the worker.
    pub sealed_size: u64,
    /// Unix time of the last watchdog check; 0 = never checked.
    pub last_check_at: i64,
}

/// One row of `cleanup_record`.
#[derive(Debug, Clone)]
pub struct CleanupRecord {
    pub id: i64,
    pub cid: String,
    pub status: CleanupStatus,
    pub last_updated: i64,
    pub create_at: i64,
}

/// Conversion failure for an enum column.
pub(crate) fn bad_enum(idx: usize, value: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("unknown enum value: {value}").into(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrips() {
        for s in [
            FileStatus::New,
            FileStatus::PendingReplica,
            FileStatus::InsufficientSpace,
            FileStatus::Invalid,
            FileStatus::Skipped,
            FileStatus::Expired,
            FileStatus::Handled,
            FileStatus::Failed,
        ] {
            assert_eq!(FileStatus::parse(s.as_str()), Some(s));
        }
        for s in [PinStatus::Sealing, PinStatus::Sealed, PinStatus::Failed] {
            assert_eq!(PinStatus::parse(s.as_str()), Some(s));
        }
        for s in [CleanupStatus::Pending, CleanupStatus::Done, CleanupStatus::Failed] {
            assert_eq!(CleanupStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(FileStatus::parse("nope"), None);
    }
}
