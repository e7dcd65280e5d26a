use std::sync::{Arc, Mutex};

use anyhow::Result;
use tracing::warn;

use ajchat_types::identity::Identity;
use ajchat_types::models::Message;

use crate::kv::{Key, KvJson, KvStore};
use crate::lock_writes;

const NAMESPACE: &str = "messages";

/// Chat history under `messages/<time>/<id>`.
///
/// The time segment is zero-padded so key order is time order; the id segment
/// keeps two messages from the same millisecond apart.
#[derive(Clone)]
pub struct MessageStore {
    kv: Arc<dyn KvStore>,
    write_lock: Arc<Mutex<()>>,
}

impl MessageStore {
    pub fn new(kv: Arc<dyn KvStore>, write_lock: Arc<Mutex<()>>) -> Self {
        Self { kv, write_lock }
    }

    fn namespace() -> Key {
        Key::new([NAMESPACE])
    }

    fn key_for(msg: &Message) -> Key {
        Self::namespace()
            .child(format!("{:020}", msg.time))
            .child(msg.id.clone())
    }

    pub fn save(&self, msg: &Message) -> Result<()> {
        self.kv.set_json(&Self::key_for(msg), msg)
    }

    /// The most recent `limit` messages, oldest first.
    pub fn history(&self, limit: usize) -> Result<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .scan()?
            .into_iter()
            .map(|(_, msg)| msg)
            .collect();

        // Key order is already time order; the stable sort only guards
        // against records written under a different key layout.
        messages.sort_by_key(|m| m.time);

        let skip = messages.len().saturating_sub(limit);
        Ok(messages.split_off(skip))
    }

    pub fn get(&self, id: &str) -> Result<Option<Message>> {
        Ok(self.find(id)?.map(|(_, msg)| msg))
    }

    /// Add `who` to the reaction set for `emoji` on message `id`.
    ///
    /// `None` if no such message, `Some(false)` if the reaction already existed.
    pub fn add_reaction(&self, id: &str, who: Identity, emoji: &str) -> Result<Option<bool>> {
        let _guard = lock_writes(&self.write_lock)?;

        let Some((key, mut msg)) = self.find(id)? else {
            return Ok(None);
        };

        let added = msg.add_reaction(emoji, who);
        if added {
            self.kv.set_json(&key, &msg)?;
        }
        Ok(Some(added))
    }

    /// Returns whether a message was removed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let _guard = lock_writes(&self.write_lock)?;

        match self.find(id)? {
            Some((key, _)) => self.kv.delete(&key),
            None => Ok(false),
        }
    }

    /// Remove the whole history, returning how many messages went.
    pub fn clear(&self) -> Result<usize> {
        let _guard = lock_writes(&self.write_lock)?;
        self.kv.delete_prefix(&Self::namespace())
    }

    fn find(&self, id: &str) -> Result<Option<(Key, Message)>> {
        Ok(self.scan()?.into_iter().find(|(_, msg)| msg.id == id))
    }

    fn scan(&self) -> Result<Vec<(Key, Message)>> {
        let entries = self.kv.list_prefix(&Self::namespace())?;
        let mut out = Vec::with_capacity(entries.len());
        for (key, raw) in entries {
            match serde_json::from_str::<Message>(&raw) {
                Ok(msg) => out.push((key, msg)),
                Err(e) => warn!("Corrupt message record at {}: {}", key, e),
            }
        }
        Ok(out)
    }
}
