//! In-memory session store.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::ports::{SessionRepository, SessionRepositoryError};
use crate::domain::{Session, SessionId};

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

fn poisoned() -> SessionRepositoryError {
    SessionRepositoryError::query("session store lock poisoned")
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for MemorySessionStore {
    async fn insert(&self, session: &Session) -> Result<(), SessionRepositoryError> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        sessions.insert(session.id().clone(), session.clone());
        Ok(())
    }

    async fn find(&self, id: &SessionId) -> Result<Option<Session>, SessionRepositoryError> {
        let sessions = self.sessions.read().map_err(|_| poisoned())?;
        Ok(sessions.get(id).cloned())
    }

    async fn delete(&self, id: &SessionId) -> Result<(), SessionRepositoryError> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        sessions.remove(id);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, SessionRepositoryError> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        Ok(u64::try_from(before - sessions.len()).unwrap_or(u64::MAX))
    }
}
