//! PostgreSQL-backed `PermissionRepository` using Diesel.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;

use crate::domain::account::AccountId;
use crate::domain::permission::{Permission, PermissionSet};
use crate::domain::ports::{PermissionRepository, PermissionRepositoryError};

use super::models::NewAccountPermissionRow;
use super::pool::{DbPool, PoolError};
use super::schema::{accounts_permissions, permissions};

/// Diesel implementation of the permission port.
#[derive(Clone)]
pub struct DieselPermissionRepository {
    pool: DbPool,
}

impl DieselPermissionRepository {
    /// Create a repository over the shared pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> PermissionRepositoryError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            PermissionRepositoryError::connection(message)
        }
    }
}

fn map_diesel_error(error: diesel::result::Error) -> PermissionRepositoryError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
            debug!(message = info.message(), "permission query lost its connection");
            PermissionRepositoryError::connection("database connection error")
        }
        err => {
            debug!(error = %err, "permission query failed");
            PermissionRepositoryError::query("database error")
        }
    }
}

#[async_trait]
impl PermissionRepository for DieselPermissionRepository {
    async fn for_account(
        &self,
        account_id: AccountId,
    ) -> Result<PermissionSet, PermissionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let codes: Vec<String> = permissions::table
            .inner_join(accounts_permissions::table)
            .filter(accounts_permissions::account_id.eq(account_id.as_i64()))
            .select(permissions::code)
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(PermissionSet::from_codes(codes))
    }

    async fn grant(
        &self,
        account_id: AccountId,
        granted: &[Permission],
    ) -> Result<(), PermissionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let codes: Vec<&str> = granted.iter().map(|p| p.as_code()).collect();
        let permission_ids: Vec<i64> = permissions::table
            .filter(permissions::code.eq_any(codes))
            .select(permissions::id)
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        let rows: Vec<NewAccountPermissionRow> = permission_ids
            .into_iter()
            .map(|permission_id| NewAccountPermissionRow {
                account_id: account_id.as_i64(),
                permission_id,
            })
            .collect();

        diesel::insert_into(accounts_permissions::table)
            .values(&rows)
            .on_conflict_do_nothing()
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_errors_map_to_connection_errors() {
        let err = map_pool_error(PoolError::checkout("connection refused"));
        assert!(matches!(err, PermissionRepositoryError::Connection { .. }));
    }

    #[test]
    fn query_failures_stay_opaque() {
        let err = map_diesel_error(diesel::result::Error::NotFound);
        assert!(matches!(err, PermissionRepositoryError::Query { .. }));
    }
}
