use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::bag::Bag;
use crate::errors::ServiceError;

/// Per-visitor state carried between requests.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub bag: Bag,
    /// Whether the customer asked for their delivery info to be saved back
    /// to their profile after checkout.
    pub save_info: bool,
}

/// Storage backend for visitor sessions.
///
/// Sessions are keyed by an opaque identifier the client presents on each
/// request. A load of an unknown session yields empty state rather than an
/// error, so first-time visitors need no setup call.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<SessionData, ServiceError>;
    async fn save(&self, session_id: &str, data: SessionData) -> Result<(), ServiceError>;
    async fn clear_bag(&self, session_id: &str) -> Result<(), ServiceError>;
}

/// In-memory session store backed by a concurrent map.
pub struct InMemorySessionStore {
    sessions: DashMap<String, SessionData>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<SessionData, ServiceError> {
        Ok(self
            .sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn save(&self, session_id: &str, data: SessionData) -> Result<(), ServiceError> {
        self.sessions.insert(session_id.to_string(), data);
        Ok(())
    }

    async fn clear_bag(&self, session_id: &str) -> Result<(), ServiceError> {
        if let Some(mut entry) = self.sessions.get_mut(session_id) {
            entry.value_mut().bag = Bag::new();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_session_loads_empty_state() {
        let store = InMemorySessionStore::new();
        let data = store.load("nobody").await.unwrap();
        assert!(data.bag.is_empty());
        assert!(!data.save_info);
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = InMemorySessionStore::new();
        let mut data = SessionData::default();
        data.bag.add("12", 2, None);
        data.save_info = true;

        store.save("alice", data.clone()).await.unwrap();
        let loaded = store.load("alice").await.unwrap();
        assert_eq!(loaded, data);
    }

    #[tokio::test]
    async fn clear_bag_keeps_other_session_state() {
        let store = InMemorySessionStore::new();
        let mut data = SessionData::default();
        data.bag.add("12", 2, None);
        data.save_info = true;
        store.save("alice", data).await.unwrap();

        store.clear_bag("alice").await.unwrap();

        let loaded = store.load("alice").await.unwrap();
        assert!(loaded.bag.is_empty());
        assert!(loaded.save_info);
    }
}
