//! Session manager for handling multiple sessions
//!
//! Every session sits behind its own async mutex. A caller holds the
//! [`SessionHandle`] for the whole of a turn, so turns on the same key run
//! one after another while different keys never wait on each other.

use super::backend::{JsonlBackend, MemoryBackend, SessionBackend, SessionInfo};
use super::store::{ChatMessage, Role, Session};
use crate::config::schema::{SessionBackendKind, SessionsConfig};
use crate::utils::expand_home;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info};

type SessionSlot = Arc<AsyncMutex<Session>>;

/// Manages conversation sessions
pub struct SessionManager {
    sessions: Mutex<HashMap<String, SessionSlot>>,
    backend: Arc<dyn SessionBackend>,
}

impl SessionManager {
    /// Create a manager over the given backend
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            backend,
        }
    }

    /// Histories live only for the life of the process
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend))
    }

    /// Build the manager described by the `sessions` config section
    pub fn from_config(config: &SessionsConfig) -> crate::Result<Self> {
        let backend: Arc<dyn SessionBackend> = match config.backend {
            SessionBackendKind::Memory => Arc::new(MemoryBackend),
            SessionBackendKind::Jsonl => Arc::new(JsonlBackend::new(expand_home(&config.dir))?),
        };
        info!(backend = backend.name(), "Session storage ready");
        Ok(Self::new(backend))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Get or lazily create the slot for `key`
    fn slot(&self, key: &str) -> crate::Result<SessionSlot> {
        if let Some(slot) = self.sessions.lock().get(key) {
            return Ok(slot.clone());
        }

        // Load outside the map lock; if another caller raced us, theirs wins.
        let session = match self.backend.load(key)? {
            Some(messages) => {
                debug!(key, count = messages.len(), "Restored session from backend");
                Session::from_messages(key, messages)
            }
            None => Session::new(key),
        };

        let mut sessions = self.sessions.lock();
        let slot = sessions
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(session)));
        Ok(slot.clone())
    }

    /// Acquire exclusive access to a session, creating it on first use
    pub async fn lock(&self, key: &str) -> crate::Result<SessionHandle> {
        if key.trim().is_empty() {
            return Err(crate::Error::Session("session key must not be empty".into()));
        }
        let slot = self.slot(key)?;
        let guard = slot.lock_owned().await;
        Ok(SessionHandle {
            guard,
            backend: self.backend.clone(),
        })
    }

    /// Copy of a session's history; unknown keys yield an empty list
    pub async fn history(&self, key: &str) -> crate::Result<Vec<ChatMessage>> {
        let cached = self.sessions.lock().get(key).cloned();
        match cached {
            Some(slot) => Ok(slot.lock().await.messages.clone()),
            None => Ok(self.backend.load(key)?.unwrap_or_default()),
        }
    }

    /// Clear a session's history in memory and in the backend.
    ///
    /// Waits for an in-flight turn on the same key. Unknown keys are not an
    /// error, and calling it repeatedly is harmless. Memory is only cleared
    /// once the backend has dropped its copy.
    pub async fn reset(&self, key: &str) -> crate::Result<()> {
        let cached = self.sessions.lock().get(key).cloned();
        match cached {
            Some(slot) => {
                let mut session = slot.lock().await;
                self.backend.clear(key)?;
                session.clear();
            }
            None => {
                self.backend.clear(key)?;
            }
        }
        debug!(key, "Session reset");
        Ok(())
    }

    /// Drop cached sessions that are idle and not currently locked.
    ///
    /// Stored history is untouched, so an evicted session reloads from the
    /// backend on its next turn. Returns the number of sessions evicted.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let max_idle = chrono::Duration::from_std(max_idle)
            .unwrap_or_else(|_| chrono::Duration::days(36_500));
        let cutoff = Utc::now() - max_idle;
        let mut sessions = self.sessions.lock();
        let before = sessions.len();

        sessions.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(session) => session.updated_at > cutoff,
                Err(_) => true,
            }
        });

        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, remaining = sessions.len(), "Evicted idle sessions");
        }
        evicted
    }

    /// Sessions held in memory plus those only present in the backend
    pub fn list(&self) -> crate::Result<Vec<SessionInfo>> {
        let mut infos: HashMap<String, SessionInfo> = self
            .backend
            .list()?
            .into_iter()
            .map(|info| (info.key.clone(), info))
            .collect();

        for (key, slot) in self.sessions.lock().iter() {
            if let Ok(session) = slot.try_lock() {
                infos.insert(
                    key.clone(),
                    SessionInfo {
                        key: key.clone(),
                        message_count: session.len(),
                        updated_at: Some(session.updated_at),
                    },
                );
            }
        }

        let mut infos: Vec<_> = infos.into_values().collect();
        infos.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(infos)
    }

    /// Number of sessions currently cached in memory
    pub fn cached_len(&self) -> usize {
        self.sessions.lock().len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Exclusive access to one session for the duration of a turn
pub struct SessionHandle {
    guard: OwnedMutexGuard<Session>,
    backend: Arc<dyn SessionBackend>,
}

impl SessionHandle {
    pub fn key(&self) -> &str {
        &self.guard.key
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.guard.messages
    }

    /// The most recent `size` messages, oldest first
    pub fn window(&self, size: usize) -> &[ChatMessage] {
        self.guard.get_history(size)
    }

    pub fn len(&self) -> usize {
        self.guard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard.is_empty()
    }

    /// Append a message, writing it through to the backend.
    ///
    /// If the backend rejects the write the in-memory history is left as it
    /// was, so memory and storage never disagree.
    pub fn append(&mut self, role: Role, content: impl Into<String>) -> crate::Result<()> {
        let key = self.guard.key.clone();
        let message = self.guard.add_message(role, content).clone();
        if let Err(e) = self.backend.append(&key, &message) {
            self.guard.messages.pop();
            return Err(e);
        }
        Ok(())
    }

    pub fn clear(&mut self) -> crate::Result<()> {
        self.backend.clear(&self.guard.key)?;
        self.guard.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Accepts writes but refuses to delete anything
    struct StickyBackend;

    impl SessionBackend for StickyBackend {
        fn load(&self, _key: &str) -> crate::Result<Option<Vec<ChatMessage>>> {
            Ok(None)
        }

        fn append(&self, _key: &str, _message: &ChatMessage) -> crate::Result<()> {
            Ok(())
        }

        fn clear(&self, _key: &str) -> crate::Result<bool> {
            Err(crate::Error::Session("disk is read-only".into()))
        }

        fn list(&self) -> crate::Result<Vec<SessionInfo>> {
            Ok(Vec::new())
        }

        fn name(&self) -> &'static str {
            "sticky"
        }
    }

    #[tokio::test]
    async fn test_get_or_create_session() {
        let manager = SessionManager::in_memory();

        let mut handle = manager.lock("web:123").await.unwrap();
        handle.append(Role::User, "Hello").unwrap();

        assert_eq!(handle.len(), 1);
        assert_eq!(handle.key(), "web:123");
        drop(handle);

        assert_eq!(manager.history("web:123").await.unwrap().len(), 1);
        assert_eq!(manager.cached_len(), 1);
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let manager = SessionManager::in_memory();
        assert!(manager.lock("  ").await.is_err());
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let manager = SessionManager::in_memory();
        manager
            .lock("a")
            .await
            .unwrap()
            .append(Role::User, "for a")
            .unwrap();
        manager
            .lock("b")
            .await
            .unwrap()
            .append(Role::User, "for b")
            .unwrap();

        let a = manager.history("a").await.unwrap();
        let b = manager.history("b").await.unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
        assert_eq!(a[0].content, "for a");
        assert_eq!(b[0].content, "for b");
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let manager = SessionManager::in_memory();
        manager.reset("never-seen").await.unwrap();

        manager
            .lock("k")
            .await
            .unwrap()
            .append(Role::User, "x")
            .unwrap();
        manager.reset("k").await.unwrap();
        manager.reset("k").await.unwrap();
        assert!(manager.history("k").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_jsonl_backed_session_survives_restart() {
        let temp_dir = TempDir::new().unwrap();
        let config = SessionsConfig {
            backend: SessionBackendKind::Jsonl,
            dir: temp_dir.path().to_string_lossy().to_string(),
            idle_ttl_secs: None,
        };

        {
            let manager = SessionManager::from_config(&config).unwrap();
            assert_eq!(manager.backend_name(), "jsonl");
            let mut handle = manager.lock("test:456").await.unwrap();
            handle.append(Role::User, "Test message").unwrap();
            handle.append(Role::Assistant, "Reply").unwrap();
        }

        let manager = SessionManager::from_config(&config).unwrap();
        let handle = manager.lock("test:456").await.unwrap();
        assert_eq!(handle.len(), 2);
        assert_eq!(handle.messages()[0].content, "Test message");
        drop(handle);

        manager.reset("test:456").await.unwrap();
        let manager = SessionManager::from_config(&config).unwrap();
        assert!(manager.history("test:456").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lookalike_keys_independent_after_restart() {
        let temp_dir = TempDir::new().unwrap();
        let config = SessionsConfig {
            backend: SessionBackendKind::Jsonl,
            dir: temp_dir.path().to_string_lossy().to_string(),
            idle_ttl_secs: None,
        };

        {
            let manager = SessionManager::from_config(&config).unwrap();
            manager
                .lock("alice:1")
                .await
                .unwrap()
                .append(Role::User, "alice secret")
                .unwrap();
            manager
                .lock("alice_1")
                .await
                .unwrap()
                .append(Role::User, "mallory")
                .unwrap();
        }

        let manager = SessionManager::from_config(&config).unwrap();
        let history = manager.history("alice_1").await.unwrap();
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["mallory"]);

        manager.reset("alice_1").await.unwrap();
        let kept = manager.history("alice:1").await.unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].content, "alice secret");

        let keys: Vec<_> = manager.list().unwrap().into_iter().map(|i| i.key).collect();
        assert_eq!(keys, vec!["alice:1".to_string()]);
    }

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let manager = Arc::new(SessionManager::in_memory());
        let first = manager.lock("k").await.unwrap();

        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move {
                let mut handle = manager.lock("k").await.unwrap();
                handle.append(Role::User, "second").unwrap();
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        let mut first = first;
        first.append(Role::User, "first").unwrap();
        drop(first);
        waiter.await.unwrap();

        let history = manager.history("k").await.unwrap();
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_evict_idle_skips_locked_sessions() {
        let manager = SessionManager::in_memory();
        manager
            .lock("idle")
            .await
            .unwrap()
            .append(Role::User, "x")
            .unwrap();
        let busy = manager.lock("busy").await.unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        let evicted = manager.evict_idle(Duration::from_millis(1));
        assert_eq!(evicted, 1);
        assert_eq!(manager.cached_len(), 1);
        drop(busy);

        assert_eq!(manager.evict_idle(Duration::from_secs(3600)), 0);
    }

    #[tokio::test]
    async fn test_list_reports_cached_sessions() {
        let manager = SessionManager::in_memory();
        let mut handle = manager.lock("listed").await.unwrap();
        handle.append(Role::User, "a").unwrap();
        handle.append(Role::Assistant, "b").unwrap();
        drop(handle);

        let listed = manager.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key, "listed");
        assert_eq!(listed[0].message_count, 2);
    }

    #[tokio::test]
    async fn test_failed_backend_clear_keeps_history() {
        let manager = SessionManager::new(Arc::new(StickyBackend));
        let mut handle = manager.lock("k").await.unwrap();
        handle.append(Role::User, "keep me").unwrap();
        assert!(handle.clear().is_err());
        assert_eq!(handle.len(), 1);
        drop(handle);

        assert!(manager.reset("k").await.is_err());
        let history = manager.history("k").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "keep me");
    }
}
