use crate::model::Id;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Identity cache for copy sessions.
///
/// Maps (session id, original node id) to the clone already produced for
/// that original, so every original is cloned at most once per session and
/// all aliasing references within the session resolve to the same clone.
/// Entries live for the duration of one top-level copy; no eviction. The
/// backing map is shared by all sessions and therefore lock-protected, but a
/// single session is only ever driven from one call tree at a time.
#[derive(Debug, Default)]
pub struct CopySessionCache {
    sessions: RwLock<HashMap<String, HashMap<Id, Id>>>,
}

impl CopySessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a clone. First entry for an original wins; later puts for the
    /// same original are ignored so first-encounter ordering holds.
    pub fn put(&self, session: &str, original: &Id, clone: &Id) {
        let mut sessions = self.sessions.write();
        sessions
            .entry(session.to_string())
            .or_default()
            .entry(original.clone())
            .or_insert_with(|| clone.clone());
    }

    pub fn get(&self, session: &str, original: &Id) -> Option<Id> {
        let sessions = self.sessions.read();
        sessions
            .get(session)
            .and_then(|entries| entries.get(original))
            .cloned()
    }

    /// All (original, clone) pairs recorded in a session.
    pub fn session_entries(&self, session: &str) -> Vec<(Id, Id)> {
        let sessions = self.sessions.read();
        sessions
            .get(session)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(original, clone)| (original.clone(), clone.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn clear_session(&self, session: &str) {
        let mut sessions = self.sessions.write();
        sessions.remove(session);
    }
}
