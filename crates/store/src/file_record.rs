//! File record queries: discovery upserts, candidate selection, status
//! transitions and the retry/cleanup sweeps.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use caulk_common::Source;

use crate::types::{bad_enum, FileInfo, FileRecord, FileStatus};
use crate::{Result, Store};

const FILE_COLUMNS: &str =
    "id, cid, expire_at, size, amount, replicas, indexer, status, last_updated, create_at";

fn row_to_file_record(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    let indexer: String = row.get(6)?;
    let status: String = row.get(7)?;
    Ok(FileRecord {
        id: row.get(0)?,
        cid: row.get(1)?,
        expire_at: row.get::<_, i64>(2)? as u64,
        size: row.get::<_, i64>(3)? as u64,
        amount: row.get::<_, i64>(4)? as u64,
        replicas: row.get::<_, i64>(5)? as u32,
        indexer: Source::parse(&indexer).ok_or_else(|| bad_enum(6, indexer))?,
        status: FileStatus::parse(&status).ok_or_else(|| bad_enum(7, status))?,
        last_updated: row.get(8)?,
        create_at: row.get(9)?,
    })
}

impl Store {
    /// Insert a newly discovered file, or refresh the mutable chain fields
    /// of the existing (cid, indexer) row. Returns true when a new row was
    /// created.
    pub fn add_file(&self, info: &FileInfo, source: Source, now: i64) -> Result<bool> {
        self.with_conn(|c| {
            let existing: Option<i64> = c
                .query_row(
                    "select id from file_record where cid = ?1 and indexer = ?2 limit 1",
                    params![info.cid, source.as_str()],
                    |r| r.get(0),
                )
                .optional()?;
            match existing {
                Some(id) => {
                    c.execute(
                        "update file_record set amount = ?1, expire_at = ?2, replicas = ?3,
                         last_updated = ?4 where id = ?5",
                        params![
                            info.amount as i64,
                            info.expire_at as i64,
                            info.replicas as i64,
                            now,
                            id
                        ],
                    )?;
                    Ok(false)
                }
                None => {
                    c.execute(
                        "insert into file_record
                         (cid, expire_at, size, amount, replicas, indexer, status, last_updated, create_at)
                         values (?1, ?2, ?3, ?4, ?5, ?6, 'new', ?7, ?7)",
                        params![
                            info.cid,
                            info.expire_at as i64,
                            info.size as i64,
                            info.amount as i64,
                            info.replicas as i64,
                            source.as_str(),
                            now
                        ],
                    )?;
                    Ok(true)
                }
            }
        })
    }

    /// Oldest `new` record for a source, optionally bounded to a size
    /// bucket (`min_size` inclusive, `max_size` exclusive).
    pub fn get_pending_file(
        &self,
        source: Source,
        min_size: Option<u64>,
        max_size: Option<u64>,
    ) -> Result<Option<FileRecord>> {
        let mut sql = format!(
            "select {FILE_COLUMNS} from file_record where status = 'new' and indexer = ?"
        );
        let mut args: Vec<Value> = vec![Value::from(source.as_str().to_string())];
        if let Some(min) = min_size {
            sql.push_str(" and size >= ?");
            args.push(Value::from(min as i64));
        }
        if let Some(max) = max_size {
            sql.push_str(" and size < ?");
            args.push(Value::from(max as i64));
        }
        sql.push_str(" order by create_at asc, id asc limit 1");
        self.with_conn(|c| {
            c.query_row(&sql, params_from_iter(args.iter()), row_to_file_record)
                .optional()
        })
    }

    pub fn get_file(&self, cid: &str, source: Source) -> Result<Option<FileRecord>> {
        self.with_conn(|c| {
            c.query_row(
                &format!(
                    "select {FILE_COLUMNS} from file_record
                     where cid = ?1 and indexer = ?2 limit 1"
                ),
                params![cid, source.as_str()],
                row_to_file_record,
            )
            .optional()
        })
    }

    pub fn update_file_status(&self, id: i64, status: FileStatus, now: i64) -> Result<()> {
        self.with_conn(|c| {
            c.execute(
                "update file_record set status = ?1, last_updated = ?2 where id = ?3",
                params![status.as_str(), now, id],
            )?;
            Ok(())
        })
    }

    /// Retry sweep, aging half: records stuck in a retryable status longer
    /// than the max pending age become `failed`. Returns rows changed.
    pub fn fail_aged_files(&self, created_before: i64, now: i64) -> Result<usize> {
        self.with_conn(|c| {
            c.execute(
                "update file_record set status = 'failed', last_updated = ?1
                 where status in ('new', 'pending_replica', 'insufficient_space')
                 and create_at < ?2",
                params![now, created_before],
            )
        })
    }

    /// Retry sweep, recycle half: transiently-stuck records go back to `new`
    /// for re-evaluation by the filter pipeline. Returns rows changed.
    pub fn reset_stuck_files(&self, updated_before: i64, now: i64) -> Result<usize> {
        self.with_conn(|c| {
            c.execute(
                "update file_record set status = 'new', last_updated = ?1
                 where status in ('pending_replica', 'insufficient_space')
                 and last_updated < ?2",
                params![now, updated_before],
            )
        })
    }

    /// Explicit cleanup sweep over terminal states; the only physical delete
    /// path for file records.
    pub fn purge_terminal_files(&self, updated_before: i64) -> Result<usize> {
        self.with_conn(|c| {
            c.execute(
                "delete from file_record
                 where status in ('invalid', 'skipped', 'expired', 'handled', 'failed')
                 and last_updated < ?1",
                params![updated_before],
            )
        })
    }
}
