//! Cleanup record queries. Rows are produced when the indexer observes a
//! close/illegal event on-chain and consumed by the cleanup collaborator;
//! the engine only maintains the table.

use rusqlite::{params, Row};

use crate::types::{bad_enum, CleanupRecord, CleanupStatus};
use crate::{Result, Store};

fn row_to_cleanup_record(row: &Row<'_>) -> rusqlite::Result<CleanupRecord> {
    let status: String = row.get(2)?;
    Ok(CleanupRecord {
        id: row.get(0)?,
        cid: row.get(1)?,
        status: CleanupStatus::parse(&status).ok_or_else(|| bad_enum(2, status))?,
        last_updated: row.get(3)?,
        create_at: row.get(4)?,
    })
}

impl Store {
    pub fn add_cleanup(&self, cid: &str, now: i64) -> Result<()> {
        self.with_conn(|c| {
            c.execute(
                "insert into cleanup_record (cid, status, last_updated, create_at)
                 values (?1, 'pending', ?2, ?2)",
                params![cid, now],
            )?;
            Ok(())
        })
    }

    /// Drop cleanup rows for files that have been re-ordered on chain.
    pub fn delete_cleanups(&self, cids: &[String]) -> Result<usize> {
        self.with_conn(|c| {
            let mut deleted = 0;
            for cid in cids {
                deleted += c.execute("delete from cleanup_record where cid = ?1", params![cid])?;
            }
            Ok(deleted)
        })
    }

    pub fn pending_cleanups(&self, limit: u32) -> Result<Vec<CleanupRecord>> {
        self.with_conn(|c| {
            let mut stmt = c.prepare(
                "select id, cid, status, last_updated, create_at from cleanup_record
                 where status = 'pending' order by id asc limit ?1",
            )?;
            let rows = stmt.query_map(params![limit], row_to_cleanup_record)?;
            rows.collect()
        })
    }

    pub fn update_cleanup_status(&self, id: i64, status: CleanupStatus, now: i64) -> Result<()> {
        self.with_conn(|c| {
            c.execute(
                "update cleanup_record set status = ?1, last_updated = ?2 where id = ?3",
                params![status.as_str(), now, id],
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_lifecycle() {
        let store = Store::open_in_memory().expect("open");
        store.add_cleanup("QmA", 1000).expect("add");
        store.add_cleanup("QmB", 1001).expect("add");

        let pending = store.pending_cleanups(10).expect("query");
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].cid, "QmA");

        store
            .update_cleanup_status(pending[0].id, CleanupStatus::Done, 1002)
            .expect("update");
        assert_eq!(store.pending_cleanups(10).expect("query").len(), 1);

        assert_eq!(store.delete_cleanups(&["QmB".to_string()]).expect("delete"), 1);
        assert!(store.pending_cleanups(10).expect("query").is_empty());
    }
}
