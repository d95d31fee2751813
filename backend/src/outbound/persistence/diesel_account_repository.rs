//! PostgreSQL-backed `AccountRepository`.
//!
//! Balance changes are a single conditional `UPDATE ... RETURNING`; the row
//! lock PostgreSQL takes for the update serialises concurrent deltas on one
//! account while leaving other accounts untouched.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::domain::ports::{AccountRepository, AccountRepositoryError};
use crate::domain::{Account, AccountIdentity, ExternalProfile, TokenDelta};

use super::diesel_error_mapping::{
    DieselFailure, classify_diesel_error, map_basic_diesel_error, map_pool_error,
};
use super::models::{AccountRow, NewAccountRow};
use super::pool::{DbPool, PoolError};
use super::schema::accounts;

#[derive(Clone)]
pub struct DieselAccountRepository {
    pool: DbPool,
}

impl DieselAccountRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn pool_error(error: PoolError) -> AccountRepositoryError {
    map_pool_error(error, AccountRepositoryError::connection)
}

fn diesel_error(error: diesel::result::Error) -> AccountRepositoryError {
    map_basic_diesel_error(
        error,
        AccountRepositoryError::query,
        AccountRepositoryError::connection,
    )
}

fn to_account(row: AccountRow) -> Result<Account, AccountRepositoryError> {
    Account::try_from(row).map_err(AccountRepositoryError::query)
}

pub(crate) async fn find_account(
    conn: &mut AsyncPgConnection,
    identity: &str,
) -> Result<Option<AccountRow>, diesel::result::Error> {
    accounts::table
        .find(identity)
        .select(AccountRow::as_select())
        .first(conn)
        .await
        .optional()
}

/// Conditionally add `delta` to the balance, returning `None` when the row
/// is missing or the result would be negative.
pub(crate) async fn apply_delta_row(
    conn: &mut AsyncPgConnection,
    identity: &str,
    delta: i64,
) -> Result<Option<AccountRow>, diesel::result::Error> {
    diesel::update(accounts::table)
        .filter(accounts::identity.eq(identity))
        .filter((accounts::token_balance + delta).ge(0_i64))
        .set((
            accounts::token_balance.eq(accounts::token_balance + delta),
            accounts::updated_at.eq(diesel::dsl::now),
        ))
        .returning(AccountRow::as_returning())
        .get_result(conn)
        .await
        .optional()
}

#[async_trait]
impl AccountRepository for DieselAccountRepository {
    async fn get_or_create(
        &self,
        profile: &ExternalProfile,
    ) -> Result<Account, AccountRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let identity = profile.subject().as_ref();

        diesel::insert_into(accounts::table)
            .values(&NewAccountRow {
                identity,
                display_name: profile.display_name(),
                email: profile.email(),
            })
            .on_conflict(accounts::identity)
            .do_nothing()
            .execute(&mut conn)
            .await
            .map_err(diesel_error)?;

        let row = find_account(&mut conn, identity)
            .await
            .map_err(diesel_error)?
            .ok_or_else(|| AccountRepositoryError::not_found(identity))?;
        to_account(row)
    }

    async fn find(
        &self,
        identity: &AccountIdentity,
    ) -> Result<Option<Account>, AccountRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        find_account(&mut conn, identity.as_ref())
            .await
            .map_err(diesel_error)?
            .map(to_account)
            .transpose()
    }

    async fn apply_delta(
        &self,
        identity: &AccountIdentity,
        delta: TokenDelta,
    ) -> Result<Account, AccountRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let updated = apply_delta_row(&mut conn, identity.as_ref(), delta.as_i64())
            .await
            .map_err(|err| match classify_diesel_error(&err) {
                DieselFailure::CheckViolation => {
                    AccountRepositoryError::insufficient_balance(identity.as_ref())
                }
                _ => diesel_error(err),
            })?;

        match updated {
            Some(row) => to_account(row),
            None => {
                let exists = find_account(&mut conn, identity.as_ref())
                    .await
                    .map_err(diesel_error)?
                    .is_some();
                if exists {
                    Err(AccountRepositoryError::insufficient_balance(identity.as_ref()))
                } else {
                    Err(AccountRepositoryError::not_found(identity.as_ref()))
                }
            }
        }
    }
}
