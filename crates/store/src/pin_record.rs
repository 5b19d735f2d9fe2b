//! Pin record queries: seal attempts and their progress over time.

use rusqlite::{params, OptionalExtension, Row};

use caulk_common::Source;

use crate::types::{bad_enum, PinRecord, PinStatus};
use crate::{Result, Store};

const PIN_COLUMNS: &str =
    "id, cid, size, status, pin_at, last_updated, pin_by, sealed_size, last_check_at";

/// Live sealing load of one capacity bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketStats {
    pub count: u64,
    pub bytes: u64,
}

/// Live sealing load split into the large/small file buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SealingStats {
    pub large: BucketStats,
    pub small: BucketStats,
}

impl SealingStats {
    /// Total bytes currently being sealed, the `pendingBytes` term of the
    /// disk admission check.
    pub fn total_bytes(&self) -> u64 {
        self.large.bytes + self.small.bytes
    }
}

fn row_to_pin_record(row: &Row<'_>) -> rusqlite::Result<PinRecord> {
    let status: String = row.get(3)?;
    let pin_by: String = row.get(6)?;
    Ok(PinRecord {
        id: row.get(0)?,
        cid: row.get(1)?,
        size: row.get::<_, i64>(2)? as u64,
        status: PinStatus::parse(&status).ok_or_else(|| bad_enum(3, status))?,
        pin_at: row.get(4)?,
        last_updated: row.get(5)?,
        pin_by: Source::parse(&pin_by).ok_or_else(|| bad_enum(6, pin_by))?,
        sealed_size: row.get::<_, i64>(7)? as u64,
        last_check_at: row.get(8)?,
    })
}

impl Store {
    /// Record the start of a seal attempt. The scheduler guarantees at most
    /// one live `sealing` row per cid by checking [`Store::has_live_seal`]
    /// before admission.
    pub fn add_pin(&self, cid: &str, size: u64, pin_by: Source, now: i64) -> Result<i64> {
        self.with_conn(|c| {
            c.execute(
                "insert into pin_record (cid, size, status, pin_at, last_updated, pin_by)
                 values (?1, ?2, 'sealing', ?3, ?3, ?4)",
                params![cid, size as i64, now, pin_by.as_str()],
            )?;
            Ok(c.last_insert_rowid())
        })
    }

    pub fn has_live_seal(&self, cid: &str) -> Result<bool> {
        self.with_conn(|c| {
            c.query_row(
                "select exists(select 1 from pin_record where cid = ?1 and status = 'sealing')",
                params![cid],
                |r| r.get(0),
            )
        })
    }

    pub fn sealing_records(&self) -> Result<Vec<PinRecord>> {
        self.with_conn(|c| {
            let mut stmt = c.prepare(&format!(
                "select {PIN_COLUMNS} from pin_record where status = 'sealing' order by id asc"
            ))?;
            let rows = stmt.query_map([], row_to_pin_record)?;
            rows.collect()
        })
    }

    /// Count and byte totals of live seals, split at `large_threshold`.
    pub fn sealing_stats(&self, large_threshold: u64) -> Result<SealingStats> {
        self.with_conn(|c| {
            let bucket = |min: Option<i64>, max: Option<i64>| -> rusqlite::Result<BucketStats> {
                let (sql, arg) = match (min, max) {
                    (Some(min), None) => (
                        "select count(*), coalesce(sum(size), 0) from pin_record
                         where status = 'sealing' and size >= ?1",
                        min,
                    ),
                    (None, Some(max)) => (
                        "select count(*), coalesce(sum(size), 0) from pin_record
                         where status = 'sealing' and size < ?1",
                        max,
                    ),
                    _ => unreachable!("one bound per bucket"),
                };
                c.query_row(sql, params![arg], |r| {
                    Ok(BucketStats {
                        count: r.get::<_, i64>(0)? as u64,
                        bytes: r.get::<_, i64>(1)? as u64,
                    })
                })
            };
            Ok(SealingStats {
                large: bucket(Some(large_threshold as i64), None)?,
                small: bucket(None, Some(large_threshold as i64))?,
            })
        })
    }

    pub fn update_pin_status(&self, id: i64, status: PinStatus, now: i64) -> Result<()> {
        self.with_conn(|c| {
            c.execute(
                "update pin_record set status = ?1, last_updated = ?2 where id = ?3",
                params![status.as_str(), now, id],
            )?;
            Ok(())
        })
    }

    /// Persist observed sealing progress and the check time.
    pub fn update_pin_progress(&self, id: i64, sealed_size: u64, checked_at: i64) -> Result<()> {
        self.with_conn(|c| {
            c.execute(
                "update pin_record set sealed_size = ?1, last_check_at = ?2, last_updated = ?2
                 where id = ?3",
                params![sealed_size as i64, checked_at, id],
            )?;
            Ok(())
        })
    }

    pub fn pins_by_cid(&self, cid: &str) -> Result<Vec<PinRecord>> {
        self.with_conn(|c| {
            let mut stmt = c.prepare(&format!(
                "select {PIN_COLUMNS} from pin_record where cid = ?1 order by id asc"
            ))?;
            let rows = stmt.query_map(params![cid], row_to_pin_record)?;
            rows.collect()
        })
    }

    pub fn get_pin(&self, id: i64) -> Result<Option<PinRecord>> {
        self.with_conn(|c| {
            c.query_row(
                &format!("select {PIN_COLUMNS} from pin_record where id = ?1"),
                params![id],
                row_to_pin_record,
            )
            .optional()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LARGE: u64 = 5 * 1024 * 1024 * 1024;

    #[test]
    fn test_add_and_live_seal() {
        let store = Store::open_in_memory().expect("open");
        let id = store.add_pin("QmA", 100, Source::ChainEvent, 1000).expect("add");
        assert!(store.has_live_seal("QmA").expect("query"));
        assert!(!store.has_live_seal("QmB").expect("query"));

        store.update_pin_status(id, PinStatus::Sealed, 1100).expect("update");
        assert!(!store.has_live_seal("QmA").expect("query"));

        // a retried seal is a fresh row; history stays
        store.add_pin("QmA", 100, Source::ChainEvent, 1200).expect("add");
        assert_eq!(store.pins_by_cid("QmA").expect("query").len(), 2);
    }

    #[test]
    fn test_sealing_stats_buckets() {
        let store = Store::open_in_memory().expect("open");
        store.add_pin("small1", 1024, Source::ChainEvent, 1000).expect("add");
        store.add_pin("small2", 2048, Source::DbScan, 1000).expect("add");
        store.add_pin("large1", LARGE + 1, Source::ChainEvent, 1000).expect("add");
        let done = store.add_pin("done", 4096, Source::Wanted, 1000).expect("add");
        store.update_pin_status(done, PinStatus::Failed, 1001).expect("update");

        let stats = store.sealing_stats(LARGE).expect("stats");
        assert_eq!(stats.small, BucketStats { count: 2, bytes: 3072 });
        assert_eq!(stats.large, BucketStats { count: 1, bytes: LARGE + 1 });
        assert_eq!(stats.total_bytes(), 3072 + LARGE + 1);
    }

    #[test]
    fn test_update_progress() {
        let store = Store::open_in_memory().expect("open");
        let id = store.add_pin("QmA", 100, Source::DbScan, 1000).expect("add");
        store.update_pin_progress(id, 4096, 1600).expect("update");
        let rec = store.get_pin(id).expect("get").expect("some");
        assert_eq!(rec.sealed_size, 4096);
        assert_eq!(rec.last_check_at, 1600);
        assert_eq!(rec.status, PinStatus::Sealing);
    }
}
