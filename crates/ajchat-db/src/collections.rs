use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use ajchat_types::models::{CalendarEvent, Countdown, WishlistItem};

use crate::kv::{Key, KvJson, KvStore};
use crate::lock_writes;

/// A record kept in a keyed collection under `<NAMESPACE>/<id>`.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const NAMESPACE: &'static str;

    fn id(&self) -> &str;

    /// Display order of the collection.
    fn order(a: &Self, b: &Self) -> Ordering;
}

impl Record for CalendarEvent {
    const NAMESPACE: &'static str = "calendar";

    fn id(&self) -> &str {
        &self.id
    }

    fn order(a: &Self, b: &Self) -> Ordering {
        a.date.cmp(&b.date).then(a.created_at.cmp(&b.created_at))
    }
}

impl Record for WishlistItem {
    const NAMESPACE: &'static str = "wishlist";

    fn id(&self) -> &str {
        &self.id
    }

    fn order(a: &Self, b: &Self) -> Ordering {
        a.created_at.cmp(&b.created_at)
    }
}

impl Record for Countdown {
    const NAMESPACE: &'static str = "countdowns";

    fn id(&self) -> &str {
        &self.id
    }

    fn order(a: &Self, b: &Self) -> Ordering {
        a.target_date.cmp(&b.target_date).then(a.created_at.cmp(&b.created_at))
    }
}

/// Whole-record CRUD for one [`Record`] type.
///
/// Mutations return the refreshed collection, read under the same write lock,
/// so the snapshot always reflects the write that produced it.
pub struct Collection<T: Record> {
    kv: Arc<dyn KvStore>,
    write_lock: Arc<Mutex<()>>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            kv: self.kv.clone(),
            write_lock: self.write_lock.clone(),
            _record: PhantomData,
        }
    }
}

impl<T: Record> Collection<T> {
    pub fn new(kv: Arc<dyn KvStore>, write_lock: Arc<Mutex<()>>) -> Self {
        Self {
            kv,
            write_lock,
            _record: PhantomData,
        }
    }

    fn namespace() -> Key {
        Key::new([T::NAMESPACE])
    }

    pub fn list(&self) -> Result<Vec<T>> {
        let entries = self.kv.list_prefix(&Self::namespace())?;
        let mut records = Vec::with_capacity(entries.len());
        for (key, raw) in entries {
            match serde_json::from_str::<T>(&raw) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Corrupt {} record at {}: {}", T::NAMESPACE, key, e),
            }
        }
        records.sort_by(T::order);
        Ok(records)
    }

    /// Insert or overwrite by id.
    pub fn save(&self, record: &T) -> Result<Vec<T>> {
        let _guard = lock_writes(&self.write_lock)?;
        self.kv
            .set_json(&Self::namespace().child(record.id().to_string()), record)?;
        self.list()
    }

    pub fn delete(&self, id: &str) -> Result<Vec<T>> {
        let _guard = lock_writes(&self.write_lock)?;
        self.kv.delete(&Self::namespace().child(id.to_string()))?;
        self.list()
    }
}
