//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the migrations exactly; Diesel uses them
//! for compile-time query validation and type-safe SQL generation. When a
//! migration changes the schema, regenerate with `diesel print-schema` or
//! update by hand.

diesel::table! {
    /// Registered accounts.
    accounts (id) {
        /// Primary key, assigned by a bigserial sequence.
        id -> Int8,
        /// Registration timestamp.
        created_at -> Timestamptz,
        /// Display name.
        name -> Varchar,
        /// Unique, lower-cased email address.
        email -> Varchar,
        /// Argon2id digest in PHC string format; never plaintext.
        password_hash -> Text,
        /// Whether an activation token has been redeemed.
        activated -> Bool,
        /// Optimistic-lock counter, starts at 1.
        version -> Int4,
    }
}

diesel::table! {
    /// Issued token digests. The plaintext is never stored.
    tokens (hash) {
        /// SHA-256 digest of the plaintext, the only lookup key.
        hash -> Bytea,
        /// Owning account.
        account_id -> Int8,
        /// Instant after which the token stops resolving.
        expiry -> Timestamptz,
        /// Scope discriminator: authentication, activation, password-reset.
        scope -> Varchar,
    }
}

diesel::table! {
    /// The closed permission catalogue.
    permissions (id) {
        /// Primary key.
        id -> Int8,
        /// Stable permission code, e.g. `catalog:read`.
        code -> Varchar,
    }
}

diesel::table! {
    /// Join table granting permissions to accounts.
    accounts_permissions (account_id, permission_id) {
        /// Granted account.
        account_id -> Int8,
        /// Granted permission.
        permission_id -> Int8,
    }
}

diesel::table! {
    /// Catalogued items.
    catalog_items (id) {
        /// Primary key, assigned by a bigserial sequence.
        id -> Int8,
        /// Creation timestamp; not exposed over the API.
        created_at -> Timestamptz,
        /// Title.
        title -> Varchar,
        /// Release year.
        year -> Int4,
        /// Running time in whole minutes.
        duration_minutes -> Int4,
        /// Tag set.
        tags -> Array<Text>,
        /// Optimistic-lock counter, starts at 1.
        version -> Int4,
    }
}

diesel::joinable!(tokens -> accounts (account_id));
diesel::joinable!(accounts_permissions -> accounts (account_id));
diesel::joinable!(accounts_permissions -> permissions (permission_id));

diesel::allow_tables_to_appear_in_same_query!(
    accounts,
    accounts_permissions,
    catalog_items,
    permissions,
    tokens,
);
