//! Conversation thread storage.
//!
//! Threads are held in memory for the process lifetime (or until expired
//! by TTL). The outer map lock is a plain mutex held only for lookups;
//! each thread carries its own async mutex so turns on the same thread
//! serialize while distinct threads never block each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use flowlens_common::ThreadId;
use tracing::debug;

use crate::Message;

/// One conversation: an append-only message log with activity timestamps.
pub struct Thread {
    pub id: ThreadId,
    messages: Vec<Message>,
    created_at: Instant,
    last_active: Instant,
}

impl Thread {
    fn new(id: ThreadId) -> Self {
        let now = Instant::now();
        Self {
            id,
            messages: Vec::new(),
            created_at: now,
            last_active: now,
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.last_active = Instant::now();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn idle(&self) -> Duration {
        self.last_active.elapsed()
    }
}

/// Registry of live threads.
#[derive(Default)]
pub struct ThreadStore {
    inner: Mutex<HashMap<ThreadId, Arc<tokio::sync::Mutex<Thread>>>>,
}

impl ThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a thread, creating it when the id is unknown or absent.
    /// Caller-supplied ids are honored as-is.
    pub fn get_or_create(&self, id: Option<ThreadId>) -> (ThreadId, Arc<tokio::sync::Mutex<Thread>>) {
        let id = id.unwrap_or_default();
        let mut map = self.inner.lock().expect("thread map poisoned");
        let thread = map
            .entry(id.clone())
            .or_insert_with(|| {
                debug!(thread = %id, "created thread");
                Arc::new(tokio::sync::Mutex::new(Thread::new(id.clone())))
            })
            .clone();
        (id, thread)
    }

    /// Append a message, creating the thread if needed.
    pub async fn append(&self, id: &ThreadId, message: Message) {
        let (_, thread) = self.get_or_create(Some(id.clone()));
        thread.lock().await.push(message);
    }

    /// Snapshot of a thread's history; empty for unknown ids.
    pub async fn history(&self, id: &ThreadId) -> Vec<Message> {
        let existing = {
            let map = self.inner.lock().expect("thread map poisoned");
            map.get(id).cloned()
        };
        match existing {
            Some(thread) => thread.lock().await.messages().to_vec(),
            None => Vec::new(),
        }
    }

    /// Drop a thread and hand back a fresh id for the caller to continue
    /// with. Unknown ids are dropped silently.
    pub fn clear(&self, id: &ThreadId) -> ThreadId {
        let mut map = self.inner.lock().expect("thread map poisoned");
        if map.remove(id).is_some() {
            debug!(thread = %id, "cleared thread");
        }
        ThreadId::new()
    }

    /// Remove threads idle longer than `ttl`. A zero TTL disables expiry.
    pub fn expire(&self, ttl: Duration) -> usize {
        if ttl.is_zero() {
            return 0;
        }
        let mut map = self.inner.lock().expect("thread map poisoned");
        let before = map.len();
        map.retain(|_, thread| match thread.try_lock() {
            // A locked thread is mid-turn and by definition not idle.
            Err(_) => true,
            Ok(guard) => guard.idle() < ttl,
        });
        let removed = before - map.len();
        if removed > 0 {
            debug!(removed, "expired idle threads");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("thread map poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    #[tokio::test]
    async fn messages_accumulate_per_thread() {
        let store = ThreadStore::new();
        let (id, _) = store.get_or_create(None);

        store.append(&id, Message::new(Role::User, "first")).await;
        store.append(&id, Message::new(Role::Assistant, "reply")).await;

        let history = store.history(&id).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "first");
        assert_eq!(history[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn unknown_id_is_a_fresh_thread() {
        let store = ThreadStore::new();
        let id = ThreadId::from("caller-supplied");
        store.append(&id, Message::new(Role::User, "hello")).await;

        assert_eq!(store.history(&id).await.len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn clear_yields_a_disjoint_id_and_empty_history() {
        let store = ThreadStore::new();
        let (id, _) = store.get_or_create(None);
        store.append(&id, Message::new(Role::User, "hello")).await;

        let new_id = store.clear(&id);
        assert_ne!(new_id, id);
        assert!(store.history(&id).await.is_empty());
        assert!(store.history(&new_id).await.is_empty());
    }

    #[tokio::test]
    async fn clearing_unknown_id_is_forgiving() {
        let store = ThreadStore::new();
        let new_id = store.clear(&ThreadId::from("never-seen"));
        assert_ne!(new_id.as_str(), "never-seen");
    }

    #[tokio::test]
    async fn distinct_threads_are_isolated() {
        let store = ThreadStore::new();
        let (a, _) = store.get_or_create(None);
        let (b, _) = store.get_or_create(None);

        store.append(&a, Message::new(Role::User, "for a")).await;
        assert_eq!(store.history(&a).await.len(), 1);
        assert!(store.history(&b).await.is_empty());
    }

    #[tokio::test]
    async fn zero_ttl_never_expires() {
        let store = ThreadStore::new();
        store.get_or_create(None);
        assert_eq!(store.expire(Duration::ZERO), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn idle_threads_expire() {
        let store = ThreadStore::new();
        store.get_or_create(None);
        // Any positive idle time exceeds a 1ns TTL.
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(store.expire(Duration::from_nanos(1)), 1);
        assert!(store.is_empty());
    }
}
