//! PostgreSQL-backed `SessionRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{SessionRepository, SessionRepositoryError};
use crate::domain::{Session, SessionId};

use super::diesel_error_mapping::{map_basic_diesel_error, map_pool_error};
use super::models::{NewSessionRow, SessionRow};
use super::pool::{DbPool, PoolError};
use super::schema::sessions;

#[derive(Clone)]
pub struct DieselSessionRepository {
    pool: DbPool,
}

impl DieselSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn pool_error(error: PoolError) -> SessionRepositoryError {
    map_pool_error(error, SessionRepositoryError::connection)
}

fn diesel_error(error: diesel::result::Error) -> SessionRepositoryError {
    map_basic_diesel_error(
        error,
        SessionRepositoryError::query,
        SessionRepositoryError::connection,
    )
}

#[async_trait]
impl SessionRepository for DieselSessionRepository {
    async fn insert(&self, session: &Session) -> Result<(), SessionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        diesel::insert_into(sessions::table)
            .values(&NewSessionRow {
                id: session.id().as_str(),
                identity: session.identity().as_ref(),
                expires_at: session.expires_at(),
            })
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(diesel_error)
    }

    async fn find(&self, id: &SessionId) -> Result<Option<Session>, SessionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let row: Option<SessionRow> = sessions::table
            .find(id.as_str())
            .select(SessionRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(diesel_error)?;
        row.map(|row| Session::try_from(row).map_err(SessionRepositoryError::query))
            .transpose()
    }

    async fn delete(&self, id: &SessionId) -> Result<(), SessionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        diesel::delete(sessions::table.find(id.as_str()))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(diesel_error)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, SessionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let removed = diesel::delete(sessions::table.filter(sessions::expires_at.le(now)))
            .execute(&mut conn)
            .await
            .map_err(diesel_error)?;
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }
}
