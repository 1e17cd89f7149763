use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::CodeEntry;

/// Keyed storage for pending verification codes.
///
/// Callers serialize access (the service holds the store behind a mutex), so
/// implementations only need to be `Send`. A shared cache can replace the
/// in-memory map by implementing this trait.
pub trait CodeStore: Send {
    fn get(&self, subject: &str) -> Option<CodeEntry>;

    /// Inserts or overwrites the entry for `entry.subject`.
    fn set(&mut self, entry: CodeEntry);

    fn delete(&mut self, subject: &str) -> Option<CodeEntry>;

    /// Drops every entry expired at `now`, returning how many were removed.
    fn prune_expired(&mut self, now: DateTime<Utc>) -> usize;
}

/// Process-local store. Lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryCodeStore {
    entries: HashMap<String, CodeEntry>,
}

impl InMemoryCodeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CodeStore for InMemoryCodeStore {
    fn get(&self, subject: &str) -> Option<CodeEntry> {
        self.entries.get(subject).cloned()
    }

    fn set(&mut self, entry: CodeEntry) {
        self.entries.insert(entry.subject.clone(), entry);
    }

    fn delete(&mut self, subject: &str) -> Option<CodeEntry> {
        self.entries.remove(subject)
    }

    fn prune_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }
}
