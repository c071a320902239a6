//! PostgreSQL-backed `CatalogRepository` using Diesel.
//!
//! The update path implements the optimistic-concurrency protocol as a
//! single conditional UPDATE: new field values and the version increment
//! are applied only where the stored version still equals the observed
//! one, and zero affected rows surfaces as a conflict.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;

use crate::domain::catalog::{
    CatalogItem, Duration, Filters, ItemId, Metadata, NewCatalogItem, SortOrder, TagSet, Title,
    Year,
};
use crate::domain::ports::{CatalogRepository, CatalogRepositoryError};

use super::models::{CatalogItemChangeset, CatalogItemRow, NewCatalogItemRow};
use super::pool::{DbPool, PoolError};
use super::schema::catalog_items;

/// Diesel implementation of the catalog port.
#[derive(Clone)]
pub struct DieselCatalogRepository {
    pool: DbPool,
}

impl DieselCatalogRepository {
    /// Create a repository over the shared pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> CatalogRepositoryError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            CatalogRepositoryError::connection(message)
        }
    }
}

fn map_diesel_error(error: diesel::result::Error) -> CatalogRepositoryError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
            debug!(message = info.message(), "catalog query lost its connection");
            CatalogRepositoryError::connection("database connection error")
        }
        err => {
            debug!(error = %err, "catalog query failed");
            CatalogRepositoryError::query("database error")
        }
    }
}

fn row_to_item(row: CatalogItemRow) -> Result<CatalogItem, CatalogRepositoryError> {
    let title = Title::new(row.title).map_err(|err| {
        CatalogRepositoryError::query(format!("stored title fails validation: {err}"))
    })?;
    let year = Year::new(row.year).map_err(|err| {
        CatalogRepositoryError::query(format!("stored year fails validation: {err}"))
    })?;
    let duration = Duration::new(row.duration_minutes).map_err(|err| {
        CatalogRepositoryError::query(format!("stored duration fails validation: {err}"))
    })?;
    let tags = TagSet::new(row.tags).map_err(|err| {
        CatalogRepositoryError::query(format!("stored tags fail validation: {err}"))
    })?;
    let version = u32::try_from(row.version)
        .map_err(|_| CatalogRepositoryError::query("stored item version is negative"))?;
    Ok(CatalogItem::from_parts(
        ItemId::new(row.id),
        title,
        year,
        duration,
        tags,
        row.created_at,
        version,
    ))
}

fn version_to_db(version: u32) -> Result<i32, CatalogRepositoryError> {
    i32::try_from(version)
        .map_err(|_| CatalogRepositoryError::query("item version exceeds the storage range"))
}

#[async_trait]
impl CatalogRepository for DieselCatalogRepository {
    async fn insert(&self, item: NewCatalogItem) -> Result<CatalogItem, CatalogRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let new_row = NewCatalogItemRow {
            title: item.title.as_ref(),
            year: item.year.as_i32(),
            duration_minutes: item.duration.minutes(),
            tags: item.tags.as_slice(),
        };
        let row: CatalogItemRow = diesel::insert_into(catalog_items::table)
            .values(&new_row)
            .returning(CatalogItemRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        row_to_item(row)
    }

    async fn find(&self, id: ItemId) -> Result<Option<CatalogItem>, CatalogRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<CatalogItemRow> = catalog_items::table
            .find(id.as_i64())
            .select(CatalogItemRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(row_to_item).transpose()
    }

    async fn list(
        &self,
        filters: &Filters,
    ) -> Result<(Vec<CatalogItem>, Metadata), CatalogRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let mut query = catalog_items::table
            .select(CatalogItemRow::as_select())
            .into_boxed();
        let mut count_query = catalog_items::table.into_boxed();

        if let Some(title) = filters.title() {
            let pattern = format!("%{title}%");
            query = query.filter(catalog_items::title.ilike(pattern.clone()));
            count_query = count_query.filter(catalog_items::title.ilike(pattern));
        }
        if !filters.tags().is_empty() {
            query = query.filter(catalog_items::tags.contains(filters.tags().to_vec()));
            count_query = count_query.filter(catalog_items::tags.contains(filters.tags().to_vec()));
        }

        let total: i64 = count_query
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        // Secondary id ordering keeps pagination stable between requests.
        query = match filters.sort() {
            SortOrder::Id => query.order(catalog_items::id.asc()),
            SortOrder::IdDesc => query.order(catalog_items::id.desc()),
            SortOrder::Title => {
                query.order((catalog_items::title.asc(), catalog_items::id.asc()))
            }
            SortOrder::TitleDesc => {
                query.order((catalog_items::title.desc(), catalog_items::id.asc()))
            }
            SortOrder::Year => query.order((catalog_items::year.asc(), catalog_items::id.asc())),
            SortOrder::YearDesc => {
                query.order((catalog_items::year.desc(), catalog_items::id.asc()))
            }
            SortOrder::Duration => {
                query.order((catalog_items::duration_minutes.asc(), catalog_items::id.asc()))
            }
            SortOrder::DurationDesc => {
                query.order((catalog_items::duration_minutes.desc(), catalog_items::id.asc()))
            }
        };

        let rows: Vec<CatalogItemRow> = query
            .limit(filters.limit())
            .offset(filters.offset())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        let items = rows
            .into_iter()
            .map(row_to_item)
            .collect::<Result<Vec<_>, _>>()?;
        let total = u64::try_from(total).unwrap_or(0);
        let metadata = Metadata::compute(total, filters.page(), filters.page_size());
        Ok((items, metadata))
    }

    async fn update(&self, item: &CatalogItem) -> Result<u32, CatalogRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let expected = version_to_db(item.version())?;
        let changes = CatalogItemChangeset {
            title: item.title().as_ref(),
            year: item.year().as_i32(),
            duration_minutes: item.duration().minutes(),
            tags: item.tags().as_slice(),
            version: expected + 1,
        };

        // One conditional statement: the version check and the write are
        // atomic at the storage layer, never a read-then-write pair.
        let updated_rows = diesel::update(
            catalog_items::table.filter(
                catalog_items::id
                    .eq(item.id().as_i64())
                    .and(catalog_items::version.eq(expected)),
            ),
        )
        .set(&changes)
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;

        if updated_rows == 0 {
            return Err(CatalogRepositoryError::Conflict);
        }
        Ok(item.version() + 1)
    }

    async fn delete(&self, id: ItemId) -> Result<(), CatalogRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let deleted_rows = diesel::delete(catalog_items::table.find(id.as_i64()))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        if deleted_rows == 0 {
            return Err(CatalogRepositoryError::NotFound);
        }
        Ok(())
    }
}
