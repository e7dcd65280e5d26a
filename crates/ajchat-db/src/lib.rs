pub mod collections;
pub mod kv;
pub mod messages;
pub mod migrations;
pub mod notes;
pub mod queries;

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

use ajchat_types::models::{CalendarEvent, Countdown, WishlistItem};

pub use collections::{Collection, Record};
pub use kv::{Key, KvJson, KvStore, MemoryStore};
pub use messages::MessageStore;
pub use notes::NoteStore;

/// SQLite-backed ordered key-value store.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }
}

/// Every record store, sharing one backend and one write lock.
///
/// Mutations that read before they write (reactions, collection snapshots)
/// hold the write lock for the whole read-modify-write.
#[derive(Clone)]
pub struct Stores {
    pub messages: MessageStore,
    pub notes: NoteStore,
    pub calendar: Collection<CalendarEvent>,
    pub wishlist: Collection<WishlistItem>,
    pub countdowns: Collection<Countdown>,
}

impl Stores {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        let write_lock = Arc::new(Mutex::new(()));
        Self {
            messages: MessageStore::new(kv.clone(), write_lock.clone()),
            notes: NoteStore::new(kv.clone()),
            calendar: Collection::new(kv.clone(), write_lock.clone()),
            wishlist: Collection::new(kv.clone(), write_lock.clone()),
            countdowns: Collection::new(kv, write_lock),
        }
    }

    /// Stores over a fresh in-memory backend.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }
}

pub(crate) fn lock_writes(lock: &Mutex<()>) -> Result<std::sync::MutexGuard<'_, ()>> {
    lock.lock().map_err(|e| anyhow::anyhow!("write lock poisoned: {}", e))
}
