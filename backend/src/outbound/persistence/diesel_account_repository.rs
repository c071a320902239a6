//! PostgreSQL-backed `AccountRepository` using Diesel.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;

use crate::domain::account::{Account, AccountId, AccountName, Email, PasswordDigest};
use crate::domain::ports::{AccountRepository, AccountRepositoryError, NewAccount};
use crate::domain::token::{TokenDigest, TokenScope};

use super::models::{AccountChangeset, AccountRow, NewAccountRow};
use super::pool::{DbPool, PoolError};
use super::schema::{accounts, tokens};

/// Diesel implementation of the account port.
#[derive(Clone)]
pub struct DieselAccountRepository {
    pool: DbPool,
}

impl DieselAccountRepository {
    /// Create a repository over the shared pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> AccountRepositoryError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            AccountRepositoryError::connection(message)
        }
    }
}

fn map_diesel_error(error: diesel::result::Error) -> AccountRepositoryError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            AccountRepositoryError::DuplicateEmail
        }
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
            debug!(message = info.message(), "account query lost its connection");
            AccountRepositoryError::connection("database connection error")
        }
        err => {
            debug!(error = %err, "account query failed");
            AccountRepositoryError::query("database error")
        }
    }
}

fn row_to_account(row: AccountRow) -> Result<Account, AccountRepositoryError> {
    let name = AccountName::new(row.name).map_err(|err| {
        AccountRepositoryError::query(format!("stored name fails validation: {err}"))
    })?;
    let email = Email::new(row.email).map_err(|err| {
        AccountRepositoryError::query(format!("stored email fails validation: {err}"))
    })?;
    let version = u32::try_from(row.version).map_err(|_| {
        AccountRepositoryError::query("stored account version is negative")
    })?;
    Ok(Account::from_parts(
        AccountId::new(row.id),
        name,
        email,
        PasswordDigest::from_phc_string(row.password_hash),
        row.activated,
        row.created_at,
        version,
    ))
}

fn version_to_db(version: u32) -> Result<i32, AccountRepositoryError> {
    i32::try_from(version)
        .map_err(|_| AccountRepositoryError::query("account version exceeds the storage range"))
}

#[async_trait]
impl AccountRepository for DieselAccountRepository {
    async fn insert(&self, account: NewAccount) -> Result<Account, AccountRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let new_row = NewAccountRow {
            name: account.name.as_ref(),
            email: account.email.as_ref(),
            password_hash: account.password.as_phc_string(),
        };
        let row: AccountRow = diesel::insert_into(accounts::table)
            .values(&new_row)
            .returning(AccountRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        row_to_account(row)
    }

    async fn find_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<Account>, AccountRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<AccountRow> = accounts::table
            .filter(accounts::email.eq(email.as_ref()))
            .select(AccountRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(row_to_account).transpose()
    }

    async fn find_by_token(
        &self,
        digest: &TokenDigest,
        scope: TokenScope,
    ) -> Result<Option<Account>, AccountRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        // Expired tokens are excluded here so they behave exactly like
        // unknown ones.
        let row: Option<AccountRow> = tokens::table
            .inner_join(accounts::table)
            .filter(tokens::hash.eq(digest.as_bytes().as_slice()))
            .filter(tokens::scope.eq(scope.as_code()))
            .filter(tokens::expiry.gt(Utc::now()))
            .select(AccountRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(row_to_account).transpose()
    }

    async fn update(&self, account: &Account) -> Result<u32, AccountRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let expected = version_to_db(account.version())?;
        let changes = AccountChangeset {
            name: account.name().as_ref(),
            email: account.email().as_ref(),
            password_hash: account.password().as_phc_string(),
            activated: account.is_activated(),
            version: expected + 1,
        };

        // One conditional statement: the version check and the write are
        // atomic at the storage layer.
        let updated_rows = diesel::update(
            accounts::table.filter(
                accounts::id
                    .eq(account.id().as_i64())
                    .and(accounts::version.eq(expected)),
            ),
        )
        .set(&changes)
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;

        if updated_rows == 0 {
            return Err(AccountRepositoryError::Conflict);
        }
        Ok(account.version() + 1)
    }
}
