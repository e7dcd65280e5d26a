use std::sync::Arc;

use anyhow::Result;

use ajchat_types::{MAX_NOTES_CHARS, truncate_chars};

use crate::kv::{Key, KvJson, KvStore};

/// The single shared notes document. Last write wins.
#[derive(Clone)]
pub struct NoteStore {
    kv: Arc<dyn KvStore>,
}

impl NoteStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    fn key() -> Key {
        Key::new(["notes"])
    }

    /// Current notes, empty if never written.
    pub fn get(&self) -> Result<String> {
        Ok(self.kv.get_json::<String>(&Self::key())?.unwrap_or_default())
    }

    /// Store `content` capped to the notes limit and return what was stored.
    pub fn save(&self, content: &str) -> Result<String> {
        let content = truncate_chars(content, MAX_NOTES_CHARS);
        self.kv.set_json(&Self::key(), &content)?;
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use crate::Stores;
    use ajchat_types::MAX_NOTES_CHARS;

    #[test]
    fn empty_until_written() {
        let notes = Stores::in_memory().notes;
        assert_eq!(notes.get().unwrap(), "");
        notes.save("groceries").unwrap();
        notes.save("groceries, flowers").unwrap();
        assert_eq!(notes.get().unwrap(), "groceries, flowers");
    }

    #[test]
    fn long_notes_are_truncated() {
        let notes = Stores::in_memory().notes;
        let stored = notes.save(&"x".repeat(MAX_NOTES_CHARS + 10)).unwrap();
        assert_eq!(stored.chars().count(), MAX_NOTES_CHARS);
        assert_eq!(notes.get().unwrap().chars().count(), MAX_NOTES_CHARS);
    }
}
