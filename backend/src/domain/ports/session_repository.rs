//! Port abstraction for server-side session storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Session, SessionId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by session store adapters.
    pub enum SessionRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "session repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "session repository query failed: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist a newly issued session.
    async fn insert(&self, session: &Session) -> Result<(), SessionRepositoryError>;

    /// Fetch a session by id, expired or not.
    async fn find(&self, id: &SessionId) -> Result<Option<Session>, SessionRepositoryError>;

    /// Remove a session. Removing an unknown id is not an error.
    async fn delete(&self, id: &SessionId) -> Result<(), SessionRepositoryError>;

    /// Remove every session expired at `now`, returning how many were removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, SessionRepositoryError>;
}
