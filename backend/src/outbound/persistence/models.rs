//! Row structs bridging the Diesel schema and the domain types.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::schema::{accounts, accounts_permissions, catalog_items, tokens};

/// A row read from `accounts`.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = accounts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AccountRow {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub activated: bool,
    pub version: i32,
}

/// Insert payload for `accounts`; the database supplies id, timestamp,
/// activation flag, and initial version.
#[derive(Debug, Insertable)]
#[diesel(table_name = accounts)]
pub struct NewAccountRow<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

/// Changeset for the conditioned account update.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = accounts)]
pub struct AccountChangeset<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub activated: bool,
    pub version: i32,
}

/// Insert payload for `tokens`.
#[derive(Debug, Insertable)]
#[diesel(table_name = tokens)]
pub struct NewTokenRow<'a> {
    pub hash: &'a [u8],
    pub account_id: i64,
    pub expiry: DateTime<Utc>,
    pub scope: &'a str,
}

/// Insert payload for the `accounts_permissions` join table.
#[derive(Debug, Insertable)]
#[diesel(table_name = accounts_permissions)]
pub struct NewAccountPermissionRow {
    pub account_id: i64,
    pub permission_id: i64,
}

/// A row read from `catalog_items`.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = catalog_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CatalogItemRow {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub year: i32,
    pub duration_minutes: i32,
    pub tags: Vec<String>,
    pub version: i32,
}

/// Insert payload for `catalog_items`; the database supplies id,
/// timestamp, and initial version.
#[derive(Debug, Insertable)]
#[diesel(table_name = catalog_items)]
pub struct NewCatalogItemRow<'a> {
    pub title: &'a str,
    pub year: i32,
    pub duration_minutes: i32,
    pub tags: &'a [String],
}

/// Changeset for the conditioned catalog item update.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = catalog_items)]
pub struct CatalogItemChangeset<'a> {
    pub title: &'a str,
    pub year: i32,
    pub duration_minutes: i32,
    pub tags: &'a [String],
    pub version: i32,
}
