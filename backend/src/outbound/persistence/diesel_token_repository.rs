//! PostgreSQL-backed `TokenRepository` using Diesel.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;

use crate::domain::account::AccountId;
use crate::domain::ports::{TokenRepository, TokenRepositoryError};
use crate::domain::token::{TokenRecord, TokenScope};

use super::models::NewTokenRow;
use super::pool::{DbPool, PoolError};
use super::schema::tokens;

/// Diesel implementation of the token port.
#[derive(Clone)]
pub struct DieselTokenRepository {
    pool: DbPool,
}

impl DieselTokenRepository {
    /// Create a repository over the shared pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> TokenRepositoryError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            TokenRepositoryError::connection(message)
        }
    }
}

fn map_diesel_error(error: diesel::result::Error) -> TokenRepositoryError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
            debug!(message = info.message(), "token query lost its connection");
            TokenRepositoryError::connection("database connection error")
        }
        err => {
            debug!(error = %err, "token query failed");
            TokenRepositoryError::query("database error")
        }
    }
}

#[async_trait]
impl TokenRepository for DieselTokenRepository {
    async fn insert(&self, record: &TokenRecord) -> Result<(), TokenRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let new_row = NewTokenRow {
            hash: record.digest().as_bytes(),
            account_id: record.account_id().as_i64(),
            expiry: record.expiry(),
            scope: record.scope().as_code(),
        };
        diesel::insert_into(tokens::table)
            .values(&new_row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn delete_all_for_account(
        &self,
        account_id: AccountId,
        scope: TokenScope,
    ) -> Result<(), TokenRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        diesel::delete(
            tokens::table.filter(
                tokens::account_id
                    .eq(account_id.as_i64())
                    .and(tokens::scope.eq(scope.as_code())),
            ),
        )
        .execute(&mut conn)
        .await
        .map(|_| ())
        .map_err(map_diesel_error)
    }
}
