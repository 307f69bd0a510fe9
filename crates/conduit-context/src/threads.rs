// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Conversation threads: multi-turn state shared across tool invocations.
//!
//! A thread is created on the first tool call without a `continuation_id`;
//! later calls supplying that id resume it, possibly from a *different*
//! tool.  Turns are append-only and totally ordered within a thread.  File
//! contents are never stored — only the paths embedded per turn, so a
//! resumed call can detect files the model has already seen.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::store::KvStore;

/// Default thread inactivity timeout.
pub const DEFAULT_THREAD_TTL: Duration = Duration::from_secs(3 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One exchange appended to a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    /// Absolute paths embedded into the prompt for this turn.
    #[serde(default)]
    pub files_embedded: Vec<String>,
    pub tool_name: String,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub provider: String,
    pub timestamp: DateTime<Utc>,
}

/// The request context a thread was opened with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitialContext {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    /// The tool that opened the thread; individual turns may come from
    /// other tools (cross-tool continuation).
    pub tool_name: String,
    pub initial_context: InitialContext,
    pub turns: Vec<Turn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ThreadError {
    #[error("thread '{0}' not found or expired")]
    NotFound(String),
    #[error("thread state could not be serialized: {0}")]
    Serialization(String),
}

/// Exclusive owner of thread and turn records; tools hold only thread ids.
pub struct ConversationStore {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl ConversationStore {
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Open a new thread and return its (collision-resistant) id.
    pub fn create_thread(&self, tool_name: &str, initial_context: InitialContext) -> String {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let thread = Thread {
            id: id.clone(),
            created_at: now,
            last_updated_at: now,
            tool_name: tool_name.to_string(),
            initial_context,
            turns: Vec::new(),
            parent_id: None,
        };
        self.persist(&thread);
        debug!(thread_id = %id, tool = tool_name, "thread created");
        id
    }

    /// Fork a thread: new id, same initial context, empty turn list.
    pub fn fork_thread(&self, parent_id: &str, tool_name: &str) -> Result<String, ThreadError> {
        let parent = self
            .get_thread(parent_id)
            .ok_or_else(|| ThreadError::NotFound(parent_id.to_string()))?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let thread = Thread {
            id: id.clone(),
            created_at: now,
            last_updated_at: now,
            tool_name: tool_name.to_string(),
            initial_context: parent.initial_context,
            turns: Vec::new(),
            parent_id: Some(parent_id.to_string()),
        };
        self.persist(&thread);
        Ok(id)
    }

    /// Append a turn and refresh the thread's TTL.
    #[allow(clippy::too_many_arguments)]
    pub fn add_turn(
        &self,
        id: &str,
        role: TurnRole,
        content: &str,
        files: &[String],
        tool_name: &str,
        model_name: &str,
        provider: &str,
    ) -> Result<(), ThreadError> {
        let mut thread = self
            .get_thread(id)
            .ok_or_else(|| ThreadError::NotFound(id.to_string()))?;
        thread.turns.push(Turn {
            role,
            content: content.to_string(),
            files_embedded: files.to_vec(),
            tool_name: tool_name.to_string(),
            model_name: model_name.to_string(),
            provider: provider.to_string(),
            timestamp: Utc::now(),
        });
        thread.last_updated_at = Utc::now();
        self.persist(&thread);
        Ok(())
    }

    pub fn get_thread(&self, id: &str) -> Option<Thread> {
        let raw = self.store.get(&thread_key(id))?;
        serde_json::from_str(&raw).ok()
    }

    /// Union of `files_embedded` across every turn of a thread, plus the
    /// files of the initial context.
    pub fn files_already_embedded(&self, id: &str) -> BTreeSet<String> {
        let mut files = BTreeSet::new();
        if let Some(thread) = self.get_thread(id) {
            for turn in &thread.turns {
                for file in &turn.files_embedded {
                    files.insert(file.clone());
                }
            }
        }
        files
    }

    pub fn delete_thread(&self, id: &str) {
        self.store.delete(&thread_key(id));
    }

    fn persist(&self, thread: &Thread) {
        match serde_json::to_string(thread) {
            Ok(raw) => self.store.set_with_ttl(&thread_key(&thread.id), raw, self.ttl),
            Err(e) => {
                tracing::error!(thread_id = %thread.id, error = %e, "thread persist failed")
            }
        }
    }
}

fn thread_key(id: &str) -> String {
    format!("thread:{id}")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn store() -> ConversationStore {
        ConversationStore::new(Arc::new(MemoryStore::new()), Duration::from_secs(60))
    }

    fn ctx(files: &[&str]) -> InitialContext {
        InitialContext {
            files: files.iter().map(|s| s.to_string()).collect(),
            prompt: "initial".into(),
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn create_and_fetch_thread() {
        let cs = store();
        let id = cs.create_thread("chat", ctx(&["/a.py"]));
        let thread = cs.get_thread(&id).unwrap();
        assert_eq!(thread.tool_name, "chat");
        assert_eq!(thread.initial_context.files, vec!["/a.py"]);
        assert!(thread.turns.is_empty());
    }

    #[test]
    fn two_threads_get_distinct_ids_and_state() {
        let cs = store();
        let a = cs.create_thread("chat", ctx(&["/a.py"]));
        let b = cs.create_thread("chat", ctx(&["/a.py"]));
        assert_ne!(a, b);

        cs.add_turn(&a, TurnRole::Assistant, "secret-for-a", &[], "chat", "m", "google")
            .unwrap();
        let thread_b = cs.get_thread(&b).unwrap();
        assert!(
            thread_b.turns.iter().all(|t| !t.content.contains("secret-for-a")),
            "thread B must never surface thread A's turns"
        );
    }

    #[test]
    fn turns_keep_append_order() {
        let cs = store();
        let id = cs.create_thread("chat", ctx(&[]));
        for i in 0..5 {
            cs.add_turn(
                &id,
                if i % 2 == 0 { TurnRole::User } else { TurnRole::Assistant },
                &format!("turn-{i}"),
                &[],
                "chat",
                "m",
                "google",
            )
            .unwrap();
        }
        let thread = cs.get_thread(&id).unwrap();
        let contents: Vec<&str> = thread.turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["turn-0", "turn-1", "turn-2", "turn-3", "turn-4"]);
    }

    #[test]
    fn cross_tool_continuation_is_recorded_per_turn() {
        let cs = store();
        let id = cs.create_thread("chat", ctx(&[]));
        cs.add_turn(&id, TurnRole::Assistant, "x", &[], "codereview", "m", "openai")
            .unwrap();
        let thread = cs.get_thread(&id).unwrap();
        assert_eq!(thread.tool_name, "chat");
        assert_eq!(thread.turns[0].tool_name, "codereview");
    }

    #[test]
    fn files_already_embedded_unions_all_turns() {
        let cs = store();
        let id = cs.create_thread("chat", ctx(&[]));
        cs.add_turn(&id, TurnRole::User, "a", &["/a.py".into()], "chat", "m", "g")
            .unwrap();
        cs.add_turn(
            &id,
            TurnRole::Assistant,
            "b",
            &["/a.py".into(), "/b.py".into()],
            "chat",
            "m",
            "g",
        )
        .unwrap();
        let files = cs.files_already_embedded(&id);
        assert_eq!(
            files.into_iter().collect::<Vec<_>>(),
            vec!["/a.py".to_string(), "/b.py".to_string()]
        );
    }

    #[test]
    fn add_turn_to_unknown_thread_errors() {
        let cs = store();
        let err = cs
            .add_turn("no-such-id", TurnRole::User, "x", &[], "chat", "m", "g")
            .unwrap_err();
        assert!(matches!(err, ThreadError::NotFound(_)));
    }

    #[test]
    fn delete_thread_removes_it() {
        let cs = store();
        let id = cs.create_thread("chat", ctx(&[]));
        cs.delete_thread(&id);
        assert!(cs.get_thread(&id).is_none());
    }

    #[test]
    fn expired_threads_are_not_found() {
        let cs = ConversationStore::new(Arc::new(MemoryStore::new()), Duration::from_millis(0));
        let id = cs.create_thread("chat", ctx(&[]));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cs.get_thread(&id).is_none());
    }

    #[test]
    fn fork_copies_initial_context_but_not_turns() {
        let cs = store();
        let parent = cs.create_thread("chat", ctx(&["/a.py"]));
        cs.add_turn(&parent, TurnRole::User, "x", &[], "chat", "m", "g")
            .unwrap();
        let child = cs.fork_thread(&parent, "debug").unwrap();
        let thread = cs.get_thread(&child).unwrap();
        assert_eq!(thread.parent_id.as_deref(), Some(parent.as_str()));
        assert_eq!(thread.initial_context.files, vec!["/a.py"]);
        assert!(thread.turns.is_empty());
        assert_eq!(thread.tool_name, "debug");
    }
}
