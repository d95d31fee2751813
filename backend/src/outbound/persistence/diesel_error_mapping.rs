//! Shared Diesel error mapping for the token-account repositories.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use super::pool::PoolError;

/// Failure categories the repositories distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DieselFailure {
    Connection,
    UniqueViolation,
    CheckViolation,
    Query,
}

/// Map pool errors into a repository-specific connection error constructor.
pub(crate) fn map_pool_error<E, C>(error: PoolError, connection: C) -> E
where
    C: FnOnce(String) -> E,
{
    let message = match error {
        PoolError::Checkout { message } | PoolError::Build { message } => message,
    };
    connection(message)
}

/// Classify a Diesel error, logging the driver detail at debug level.
///
/// Driver messages can echo row values, so only the category leaves this
/// module.
pub(crate) fn classify_diesel_error(error: &DieselError) -> DieselFailure {
    match error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            DieselFailure::Connection
        }
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            DieselFailure::UniqueViolation
        }
        DieselError::DatabaseError(DatabaseErrorKind::CheckViolation, _) => {
            DieselFailure::CheckViolation
        }
        _ => DieselFailure::Query,
    }
}

/// Map a Diesel error through the repository's query/connection
/// constructors when no finer category matters.
pub(crate) fn map_basic_diesel_error<E, Q, C>(error: DieselError, query: Q, connection: C) -> E
where
    Q: FnOnce(&'static str) -> E,
    C: FnOnce(&'static str) -> E,
{
    match classify_diesel_error(&error) {
        DieselFailure::Connection => connection("database connection error"),
        DieselFailure::UniqueViolation | DieselFailure::CheckViolation | DieselFailure::Query => {
            query("database error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[derive(Debug, PartialEq, Eq)]
    enum Probe {
        Query(&'static str),
        Connection(String),
    }

    #[rstest]
    fn pool_errors_become_connection_errors() {
        let mapped = map_pool_error(PoolError::checkout("timed out"), Probe::Connection);
        assert_eq!(mapped, Probe::Connection("timed out".into()));
    }

    #[rstest]
    fn not_found_is_a_query_error() {
        let mapped = map_basic_diesel_error(DieselError::NotFound, Probe::Query, |m: &'static str| {
            Probe::Connection(m.into())
        });
        assert_eq!(mapped, Probe::Query("database error"));
    }

    #[rstest]
    fn rollback_is_classified_as_query() {
        assert_eq!(
            classify_diesel_error(&DieselError::RollbackTransaction),
            DieselFailure::Query
        );
    }
}
