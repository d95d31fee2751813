//! Mapping from store port errors to domain errors, shared by services.

use crate::domain::Error;
use crate::domain::ports::{
    AccountRepositoryError, PurchaseIntentRepositoryError, SessionRepositoryError,
};

pub(crate) fn map_account_error(error: AccountRepositoryError) -> Error {
    match error {
        AccountRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("account repository unavailable: {message}"))
        }
        AccountRepositoryError::Query { message } => {
            Error::internal(format!("account repository error: {message}"))
        }
        AccountRepositoryError::NotFound { identity } => {
            Error::account_not_found(format!("no account for identity {identity}"))
        }
        AccountRepositoryError::InsufficientBalance { .. } => {
            Error::insufficient_balance("token balance too low")
        }
    }
}

pub(crate) fn map_session_error(error: SessionRepositoryError) -> Error {
    match error {
        SessionRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("session repository unavailable: {message}"))
        }
        SessionRepositoryError::Query { message } => {
            Error::internal(format!("session repository error: {message}"))
        }
    }
}

pub(crate) fn map_intent_error(error: PurchaseIntentRepositoryError) -> Error {
    match error {
        PurchaseIntentRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("purchase intent repository unavailable: {message}"))
        }
        PurchaseIntentRepositoryError::Query { message } => {
            Error::internal(format!("purchase intent repository error: {message}"))
        }
        PurchaseIntentRepositoryError::DuplicateIntent { intent_id } => {
            Error::internal(format!("payment provider reused intent id {intent_id}"))
        }
        PurchaseIntentRepositoryError::UnknownIntent { intent_id } => {
            Error::unknown_intent(format!("no purchase intent {intent_id}"))
        }
        PurchaseIntentRepositoryError::AccountNotFound { identity } => {
            Error::account_not_found(format!("no account for identity {identity}"))
        }
    }
}
