//! Process-wide document registry.
//!
//! The registry tracks every live document weakly, so it never extends a
//! document's lifetime: a session dropped by its host simply stops
//! upgrading. Host lifecycle fan-out (resume, teardown, memory pressure)
//! walks the registry; native calls are made only after collecting the
//! live sessions, never while holding the registry lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use docframe_engine::DocumentKey;

use crate::session::DocumentSession;

/// Identity of the host container a document lives in.
///
/// On a mobile host this is an activity or window; every document created
/// under the same scope reacts together to that container's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostScope(pub u64);

/// Weak map of all live documents, by key.
pub struct DocumentRegistry {
    sessions: Mutex<HashMap<DocumentKey, Weak<DocumentSession>>>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Register a session under its key.
    pub fn insert(&self, session: &Arc<DocumentSession>) {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.key(), Arc::downgrade(session));
    }

    /// Remove a session's entry. No-op if the key is unknown.
    pub fn remove(&self, key: DocumentKey) {
        self.sessions.lock().unwrap().remove(&key);
    }

    /// Look up one live session.
    pub fn get(&self, key: DocumentKey) -> Option<Arc<DocumentSession>> {
        self.sessions.lock().unwrap().get(&key)?.upgrade()
    }

    /// All live sessions. Dead entries are pruned on the way.
    pub fn live_sessions(&self) -> Vec<Arc<DocumentSession>> {
        let mut sessions = self.sessions.lock().unwrap();
        let mut live = Vec::with_capacity(sessions.len());
        sessions.retain(|_, weak| match weak.upgrade() {
            Some(session) => {
                live.push(session);
                true
            }
            None => false,
        });
        live
    }

    /// Live sessions belonging to one host scope.
    pub fn live_sessions_in(&self, scope: HostScope) -> Vec<Arc<DocumentSession>> {
        self.live_sessions()
            .into_iter()
            .filter(|s| s.scope() == scope)
            .collect()
    }

    /// Number of registered entries, live or not.
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Whether the registry has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DocumentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
