// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Key-value storage abstraction behind the conversation store.
//!
//! Thread state is small JSON; the interface is deliberately minimal so a
//! remote store can slot in without touching conversation logic.  The
//! in-memory implementation is the production default (threads are
//! process-local) and doubles as the test stub.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Minimal TTL-aware key-value interface.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set_with_ttl(&self, key: &str, value: String, ttl: Duration);
    fn delete(&self, key: &str);
    fn exists(&self, key: &str) -> bool;
}

/// In-memory store with per-key expiry.
///
/// Expired entries are dropped lazily on access and swept opportunistically
/// on writes; there is no background reaper.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry (explicit flush).
    pub fn flush(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some((value, deadline)) if *deadline > Instant::now() => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) {
        if let Ok(mut entries) = self.entries.lock() {
            let now = Instant::now();
            entries.retain(|_, (_, deadline)| *deadline > now);
            entries.insert(key.to_string(), (value, now + ttl));
        }
    }

    fn delete(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }

    fn exists(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let store = MemoryStore::new();
        store.set_with_ttl("k", "v".into(), Duration::from_secs(60));
        assert_eq!(store.get("k").as_deref(), Some("v"));
        assert!(store.exists("k"));
    }

    #[test]
    fn expired_entries_are_gone() {
        let store = MemoryStore::new();
        store.set_with_ttl("k", "v".into(), Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(store.get("k").is_none());
        assert!(!store.exists("k"));
    }

    #[test]
    fn ttl_refresh_on_overwrite() {
        let store = MemoryStore::new();
        store.set_with_ttl("k", "v1".into(), Duration::from_millis(0));
        store.set_with_ttl("k", "v2".into(), Duration::from_secs(60));
        assert_eq!(store.get("k").as_deref(), Some("v2"));
    }

    #[test]
    fn delete_removes_entry() {
        let store = MemoryStore::new();
        store.set_with_ttl("k", "v".into(), Duration::from_secs(60));
        store.delete("k");
        assert!(store.get("k").is_none());
    }

    #[test]
    fn flush_clears_everything() {
        let store = MemoryStore::new();
        store.set_with_ttl("a", "1".into(), Duration::from_secs(60));
        store.set_with_ttl("b", "2".into(), Duration::from_secs(60));
        store.flush();
        assert!(store.is_empty());
    }
}
