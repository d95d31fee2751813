//! PostgreSQL-backed `PurchaseIntentRepository`.
//!
//! `redeem` runs in one transaction: the intent is claimed with
//! `UPDATE ... WHERE consumed_at IS NULL RETURNING` and its tokens are
//! credited before commit. A crash or error between the two steps rolls both
//! back, and a concurrent redeemer blocks on the intent row until the first
//! commits, then sees it consumed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::AsyncConnection as _;
use diesel_async::RunQueryDsl;
use diesel_async::scoped_futures::ScopedFutureExt as _;

use crate::domain::ports::{
    PurchaseIntentRepository, PurchaseIntentRepositoryError, RedeemOutcome,
};
use crate::domain::{Account, PurchaseIntent, PurchaseIntentId};

use super::diesel_account_repository::apply_delta_row;
use super::diesel_error_mapping::{
    DieselFailure, classify_diesel_error, map_basic_diesel_error, map_pool_error,
};
use super::models::{NewPurchaseIntentRow, PurchaseIntentRow};
use super::pool::{DbPool, PoolError};
use super::schema::purchase_intents;

#[derive(Clone)]
pub struct DieselPurchaseIntentRepository {
    pool: DbPool,
}

impl DieselPurchaseIntentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn pool_error(error: PoolError) -> PurchaseIntentRepositoryError {
    map_pool_error(error, PurchaseIntentRepositoryError::connection)
}

fn diesel_error(error: diesel::result::Error) -> PurchaseIntentRepositoryError {
    map_basic_diesel_error(
        error,
        PurchaseIntentRepositoryError::query,
        PurchaseIntentRepositoryError::connection,
    )
}

/// Failures inside the redeem transaction. Diesel needs the transaction's
/// error type to absorb `diesel::result::Error`.
enum RedeemError {
    Diesel(diesel::result::Error),
    Unknown,
    AccountMissing(String),
    Invalid(String),
}

impl From<diesel::result::Error> for RedeemError {
    fn from(error: diesel::result::Error) -> Self {
        Self::Diesel(error)
    }
}

#[async_trait]
impl PurchaseIntentRepository for DieselPurchaseIntentRepository {
    async fn insert(&self, intent: &PurchaseIntent) -> Result<(), PurchaseIntentRepositoryError> {
        let row = NewPurchaseIntentRow::try_from(intent).map_err(PurchaseIntentRepositoryError::query)?;
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        diesel::insert_into(purchase_intents::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| match classify_diesel_error(&err) {
                DieselFailure::UniqueViolation => {
                    PurchaseIntentRepositoryError::duplicate_intent(intent.id().as_ref())
                }
                _ => diesel_error(err),
            })
    }

    async fn find(
        &self,
        id: &PurchaseIntentId,
    ) -> Result<Option<PurchaseIntent>, PurchaseIntentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let row: Option<PurchaseIntentRow> = purchase_intents::table
            .find(id.as_ref())
            .select(PurchaseIntentRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(diesel_error)?;
        row.map(|row| PurchaseIntent::try_from(row).map_err(PurchaseIntentRepositoryError::query))
            .transpose()
    }

    async fn redeem(
        &self,
        id: &PurchaseIntentId,
        consumed_at: DateTime<Utc>,
    ) -> Result<RedeemOutcome, PurchaseIntentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let intent_id = id.as_ref();

        let result = conn
            .transaction::<_, RedeemError, _>(|conn| {
                async move {
                    let claimed: Option<PurchaseIntentRow> = diesel::update(
                        purchase_intents::table
                            .find(intent_id)
                            .filter(purchase_intents::consumed_at.is_null()),
                    )
                    .set(purchase_intents::consumed_at.eq(Some(consumed_at)))
                    .returning(PurchaseIntentRow::as_returning())
                    .get_result(conn)
                    .await
                    .optional()?;

                    let Some(claimed) = claimed else {
                        let exists = purchase_intents::table
                            .find(intent_id)
                            .select(purchase_intents::id)
                            .first::<String>(conn)
                            .await
                            .optional()?
                            .is_some();
                        return if exists {
                            Ok(RedeemOutcome::AlreadyRedeemed)
                        } else {
                            Err(RedeemError::Unknown)
                        };
                    };

                    let credited = apply_delta_row(
                        conn,
                        &claimed.identity,
                        i64::from(claimed.tokens_requested),
                    )
                    .await?
                    .ok_or_else(|| RedeemError::AccountMissing(claimed.identity.clone()))?;
                    let account = Account::try_from(credited).map_err(RedeemError::Invalid)?;
                    Ok(RedeemOutcome::Credited(account))
                }
                .scope_boxed()
            })
            .await;

        result.map_err(|err| match err {
            RedeemError::Diesel(err) => diesel_error(err),
            RedeemError::Unknown => PurchaseIntentRepositoryError::unknown_intent(intent_id),
            RedeemError::AccountMissing(identity) => {
                PurchaseIntentRepositoryError::account_not_found(identity)
            }
            RedeemError::Invalid(message) => PurchaseIntentRepositoryError::query(message),
        })
    }
}
