//! Ordered, named schema migrations, applied once at open and tracked in
//! `schema_migrations`.

use rusqlite::{params, Connection};
use tracing::info;

use caulk_common::util::unix_now;

use crate::Result;

pub(crate) const MIGRATIONS: &[(&str, &str)] = &[
    (
        "0001-initial-schema",
        r#"
        create table if not exists file_record (
            id integer primary key autoincrement,
            cid text not null,
            expire_at integer not null default 0,
            size integer not null default 0,
            amount integer not null default 0,
            replicas integer not null default 0,
            indexer text not null,
            status text not null default 'new',
            last_updated integer not null,
            create_at integer not null
        );
        create unique index if not exists uniq_file_record_cid_indexer
            on file_record (cid, indexer);
        create index if not exists idx_file_record_status on file_record (status);
        create table if not exists pin_record (
            id integer primary key autoincrement,
            cid text not null,
            size integer not null default 0,
            status text not null default 'sealing',
            pin_at integer not null,
            last_updated integer not null,
            pin_by text not null
        );
        create index if not exists idx_pin_record_status on pin_record (status);
        create index if not exists idx_pin_record_cid on pin_record (cid);
        create table if not exists config (
            name text primary key,
            content text not null
        );
        "#,
    ),
    (
        "0002-cleanup-record",
        r#"
        create table if not exists cleanup_record (
            id integer primary key autoincrement,
            cid text not null,
            status text not null default 'pending',
            last_updated integer not null,
            create_at integer not null
        );
        create index if not exists idx_cleanup_record_status on cleanup_record (status);
        "#,
    ),
    (
        "0003-seal-progress",
        r#"
        alter table pin_record add column sealed_size integer not null default 0;
        alter table pin_record add column last_check_at integer not null default 0;
        "#,
    ),
];

pub(crate) fn apply(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "create table if not exists schema_migrations (
            name text primary key,
            applied_at integer not null
        );",
    )?;
    for (name, sql) in MIGRATIONS {
        let applied: bool = conn.query_row(
            "select exists(select 1 from schema_migrations where name = ?1)",
            [name],
            |r| r.get(0),
        )?;
        if applied {
            continue;
        }
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.execute(
            "insert into schema_migrations (name, applied_at) values (?1, ?2)",
            params![name, unix_now()],
        )?;
        tx.commit()?;
        info!(migration = name, "applied schema migration");
    }
    Ok(())
}
