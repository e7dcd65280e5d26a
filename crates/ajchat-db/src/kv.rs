//! The persistent store contract: an ordered map from segmented keys to
//! JSON-encoded values.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Joins key segments in the encoded form.
pub const SEPARATOR: char = '\u{1f}';

/// First character sorting after [`SEPARATOR`]; upper bound of a prefix range.
const SEPARATOR_END: char = '\u{20}';

/// Hierarchical key, e.g. `["calendar", "evt-1"]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(Vec<String>);

impl Key {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Extend with one more segment.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(SEPARATOR);
            }
            out.push_str(seg);
        }
        out
    }

    pub fn decode(encoded: &str) -> Self {
        Self(encoded.split(SEPARATOR).map(str::to_string).collect())
    }

    /// Half-open encoded range `[start, end)` holding every key strictly below this one.
    pub fn prefix_range(&self) -> (String, String) {
        let base = self.encode();
        let mut start = base.clone();
        start.push(SEPARATOR);
        let mut end = base;
        end.push(SEPARATOR_END);
        (start, end)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// Ordered key-value store.
///
/// `list_prefix` returns every entry strictly under `prefix`, in key order.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &Key) -> Result<Option<String>>;

    fn set(&self, key: &Key, value: &str) -> Result<()>;

    /// Returns whether an entry was removed.
    fn delete(&self, key: &Key) -> Result<bool>;

    fn list_prefix(&self, prefix: &Key) -> Result<Vec<(Key, String)>>;

    /// Remove everything under `prefix`, returning how many entries went.
    fn delete_prefix(&self, prefix: &Key) -> Result<usize> {
        let mut removed = 0;
        for (key, _) in self.list_prefix(prefix)? {
            if self.delete(&key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Typed JSON access on top of any [`KvStore`].
pub trait KvJson {
    fn get_json<T: DeserializeOwned>(&self, key: &Key) -> Result<Option<T>>;
    fn set_json<T: Serialize>(&self, key: &Key, value: &T) -> Result<()>;
}

impl<S: KvStore + ?Sized> KvJson for S {
    fn get_json<T: DeserializeOwned>(&self, key: &Key) -> Result<Option<T>> {
        match self.get(key)? {
            Some(raw) => {
                let value = serde_json::from_str(&raw)
                    .with_context(|| format!("corrupt value at {}", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize>(&self, key: &Key, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw)
    }
}

/// In-process store, used by tests and as a scratch backend.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|e| anyhow::anyhow!("memory store lock poisoned: {}", e))
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &Key) -> Result<Option<String>> {
        Ok(self.entries()?.get(&key.encode()).cloned())
    }

    fn set(&self, key: &Key, value: &str) -> Result<()> {
        self.entries()?.insert(key.encode(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &Key) -> Result<bool> {
        Ok(self.entries()?.remove(&key.encode()).is_some())
    }

    fn list_prefix(&self, prefix: &Key) -> Result<Vec<(Key, String)>> {
        let (start, end) = prefix.prefix_range();
        Ok(self
            .entries()?
            .range(start..end)
            .map(|(k, v)| (Key::decode(k), v.clone()))
            .collect())
    }
}
