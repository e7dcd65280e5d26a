use anyhow::Result;
use rusqlite::Connection;

use crate::Database;
use crate::kv::{Key, KvStore};

impl KvStore for Database {
    fn get(&self, key: &Key) -> Result<Option<String>> {
        self.with_conn(|conn| query_value(conn, &key.encode()))
    }

    fn set(&self, key: &Key, value: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
                (key.encode(), value),
            )?;
            Ok(())
        })
    }

    fn delete(&self, key: &Key) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM kv WHERE key = ?1", [key.encode()])?;
            Ok(removed > 0)
        })
    }

    fn list_prefix(&self, prefix: &Key) -> Result<Vec<(Key, String)>> {
        let (start, end) = prefix.prefix_range();
        self.with_conn(|conn| query_range(conn, &start, &end))
    }

    /// Single range delete instead of the list-then-delete default.
    fn delete_prefix(&self, prefix: &Key) -> Result<usize> {
        let (start, end) = prefix.prefix_range();
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM kv WHERE key >= ?1 AND key < ?2",
                (&start, &end),
            )?;
            Ok(removed)
        })
    }
}

fn query_value(conn: &Connection, key: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
    let value = stmt.query_row([key], |row| row.get(0)).optional()?;
    Ok(value)
}

fn query_range(conn: &Connection, start: &str, end: &str) -> Result<Vec<(Key, String)>> {
    let mut stmt = conn.prepare(
        "SELECT key, value FROM kv
         WHERE key >= ?1 AND key < ?2
         ORDER BY key ASC",
    )?;

    let rows = stmt
        .query_map((start, end), |row| {
            let key: String = row.get(0)?;
            let value: String = row.get(1)?;
            Ok((Key::decode(&key), value))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
