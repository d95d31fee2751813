//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `backend/migrations` exactly. Regenerate with
//! `diesel print-schema` when a migration changes a table.

diesel::table! {
    /// Prepaid token accounts keyed by external identity.
    accounts (identity) {
        /// OAuth subject identifier.
        identity -> Varchar,
        display_name -> Text,
        email -> Text,
        /// Never negative; enforced by a CHECK constraint.
        token_balance -> Int8,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Server-side login sessions.
    sessions (id) {
        /// 64 hex characters.
        id -> Varchar,
        identity -> Varchar,
        expires_at -> Timestamptz,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Checkout intents awaiting or past redemption.
    purchase_intents (id) {
        /// Provider-issued checkout id.
        id -> Varchar,
        identity -> Varchar,
        tokens_requested -> Int4,
        price_minor_units -> Int8,
        created_at -> Timestamptz,
        /// Set exactly once, when the intent is redeemed.
        consumed_at -> Nullable<Timestamptz>,
    }
}

diesel::joinable!(sessions -> accounts (identity));
diesel::joinable!(purchase_intents -> accounts (identity));

diesel::allow_tables_to_appear_in_same_query!(accounts, sessions, purchase_intents);
