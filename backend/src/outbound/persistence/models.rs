//! Internal Diesel row structs for database operations.
//!
//! These types never leave the persistence layer. Conversions into domain
//! types validate stored values and report violations as strings for the
//! calling adapter to wrap in its own error type.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::domain::{
    Account, AccountIdentity, PurchaseIntent, PurchaseIntentId, Session, SessionId, TokenAmount,
    TokenBalance,
};

use super::schema::{accounts, purchase_intents, sessions};

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = accounts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct AccountRow {
    pub identity: String,
    pub display_name: String,
    pub email: String,
    pub token_balance: i64,
}

impl TryFrom<AccountRow> for Account {
    type Error = String;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let identity = AccountIdentity::new(row.identity).map_err(|err| err.to_string())?;
        let balance = TokenBalance::from_stored(row.token_balance).map_err(|err| err.to_string())?;
        Ok(Account::new(identity, row.display_name, row.email, balance))
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = accounts)]
pub(crate) struct NewAccountRow<'a> {
    pub identity: &'a str,
    pub display_name: &'a str,
    pub email: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct SessionRow {
    pub id: String,
    pub identity: String,
    pub expires_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for Session {
    type Error = String;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let id = SessionId::parse(&row.id).map_err(|err| err.to_string())?;
        let identity = AccountIdentity::new(row.identity).map_err(|err| err.to_string())?;
        Ok(Session::restore(id, identity, row.expires_at))
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = sessions)]
pub(crate) struct NewSessionRow<'a> {
    pub id: &'a str,
    pub identity: &'a str,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = purchase_intents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct PurchaseIntentRow {
    pub id: String,
    pub identity: String,
    pub tokens_requested: i32,
    pub price_minor_units: i64,
    pub created_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
}

impl TryFrom<PurchaseIntentRow> for PurchaseIntent {
    type Error = String;

    fn try_from(row: PurchaseIntentRow) -> Result<Self, Self::Error> {
        let id = PurchaseIntentId::new(row.id).map_err(|err| err.to_string())?;
        let identity = AccountIdentity::new(row.identity).map_err(|err| err.to_string())?;
        let tokens = u32::try_from(row.tokens_requested)
            .map_err(|err| err.to_string())
            .and_then(|tokens| TokenAmount::new(tokens).map_err(|err| err.to_string()))?;
        let price = u64::try_from(row.price_minor_units).map_err(|err| err.to_string())?;
        Ok(PurchaseIntent::restore(
            id,
            identity,
            tokens,
            price,
            row.created_at,
            row.consumed_at,
        ))
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = purchase_intents)]
pub(crate) struct NewPurchaseIntentRow<'a> {
    pub id: &'a str,
    pub identity: &'a str,
    pub tokens_requested: i32,
    pub price_minor_units: i64,
    pub created_at: DateTime<Utc>,
}

impl<'a> TryFrom<&'a PurchaseIntent> for NewPurchaseIntentRow<'a> {
    type Error = String;

    fn try_from(intent: &'a PurchaseIntent) -> Result<Self, Self::Error> {
        Ok(Self {
            id: intent.id().as_ref(),
            identity: intent.identity().as_ref(),
            tokens_requested: i32::try_from(intent.tokens_requested().get())
                .map_err(|err| err.to_string())?,
            price_minor_units: i64::try_from(intent.price_minor_units())
                .map_err(|err| err.to_string())?,
            created_at: intent.created_at(),
        })
    }
}
