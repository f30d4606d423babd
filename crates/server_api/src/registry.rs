//! Per-user point sessions shared by HTTP handlers and websocket connections.

use std::{collections::HashMap, sync::Arc};

use shared::{domain::UserId, error::ApiError};
use storage::LocationStore;
use tokio::sync::{broadcast, Mutex};
use tracing::info;

use crate::session::PointSession;

pub type SharedSession = Arc<Mutex<PointSession>>;

struct SessionEntry {
    session: SharedSession,
    connections: usize,
}

#[derive(Clone)]
pub struct SessionRegistry {
    store: Arc<dyn LocationStore>,
    event_buffer: usize,
    sessions: Arc<Mutex<HashMap<UserId, SessionEntry>>>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn LocationStore>, event_buffer: usize) -> Self {
        Self {
            store,
            event_buffer: event_buffer.max(1),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the user's session, initializing it from storage on first use.
    pub async fn open(&self, user_id: UserId) -> Result<SharedSession, ApiError> {
        let mut guard = self.sessions.lock().await;
        if let Some(entry) = guard.get(&user_id) {
            return Ok(Arc::clone(&entry.session));
        }
        let (events, _) = broadcast::channel(self.event_buffer);
        let session = PointSession::initialize(user_id, Arc::clone(&self.store), events).await?;
        let session = Arc::new(Mutex::new(session));
        guard.insert(
            user_id,
            SessionEntry {
                session: Arc::clone(&session),
                connections: 0,
            },
        );
        info!(user_id = user_id.0, "points: session opened");
        Ok(session)
    }

    /// Opens the session and counts a live connection against it.
    pub async fn attach(&self, user_id: UserId) -> Result<SharedSession, ApiError> {
        let session = self.open(user_id).await?;
        if let Some(entry) = self.sessions.lock().await.get_mut(&user_id) {
            entry.connections += 1;
        }
        Ok(session)
    }

    /// Drops the session once its last connection is gone.
    pub async fn detach(&self, user_id: UserId) {
        let mut guard = self.sessions.lock().await;
        let Some(entry) = guard.get_mut(&user_id) else {
            return;
        };
        entry.connections = entry.connections.saturating_sub(1);
        if entry.connections == 0 {
            guard.remove(&user_id);
            info!(user_id = user_id.0, "points: session closed");
        }
    }

    pub async fn get(&self, user_id: UserId) -> Option<SharedSession> {
        self.sessions
            .lock()
            .await
            .get(&user_id)
            .map(|entry| Arc::clone(&entry.session))
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
