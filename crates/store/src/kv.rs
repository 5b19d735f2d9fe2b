//! Generic key/value config table, used for cooldown timestamps that must
//! survive restarts.

use rusqlite::{params, OptionalExtension};

use crate::{Result, Store};

impl Store {
    pub fn read_string(&self, name: &str) -> Result<Option<String>> {
        self.with_conn(|c| {
            c.query_row(
                "select content from config where name = ?1 limit 1",
                params![name],
                |r| r.get(0),
            )
            .optional()
        })
    }

    pub fn save_string(&self, name: &str, value: &str) -> Result<()> {
        self.with_conn(|c| {
            c.execute(
                "insert or replace into config (name, content) values (?1, ?2)",
                params![name, value],
            )?;
            Ok(())
        })
    }

    pub fn read_i64(&self, name: &str) -> Result<Option<i64>> {
        Ok(self
            .read_string(name)?
            .and_then(|s| s.parse::<i64>().ok()))
    }

    pub fn save_i64(&self, name: &str, value: i64) -> Result<()> {
        self.save_string(name, &value.to_string())
    }

    /// Unix-seconds timestamp; `None` when unset or unparseable.
    pub fn read_time(&self, name: &str) -> Result<Option<i64>> {
        Ok(self.read_i64(name)?.filter(|t| *t >= 0))
    }

    pub fn save_time(&self, name: &str, unix: i64) -> Result<()> {
        self.save_i64(name, unix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kv_roundtrip() {
        let store = Store::open_in_memory().expect("open");
        assert_eq!(store.read_string("k").expect("read"), None);
        store.save_string("k", "v").expect("save");
        assert_eq!(store.read_string("k").expect("read"), Some("v".to_string()));
        store.save_string("k", "v2").expect("save");
        assert_eq!(store.read_string("k").expect("read"), Some("v2".to_string()));
    }

    #[test]
    fn test_kv_time() {
        let store = Store::open_in_memory().expect("open");
        assert_eq!(store.read_time("t").expect("read"), None);
        store.save_time("t", 1_700_000_000).expect("save");
        assert_eq!(store.read_time("t").expect("read"), Some(1_700_000_000));
        store.save_string("t", "garbage").expect("save");
        assert_eq!(store.read_time("t").expect("read"), None);
    }
}
