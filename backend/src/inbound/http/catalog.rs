//! Catalog API handlers.
//!
//! ```text
//! POST   /v1/items       create an item       (catalog:write)
//! GET    /v1/items       list items           (catalog:read)
//! GET    /v1/items/{id}  fetch one item       (catalog:read)
//! PATCH  /v1/items/{id}  partial update       (catalog:write)
//! DELETE /v1/items/{id}  delete an item       (catalog:write)
//! ```
//!
//! Updates run under the optimistic-concurrency protocol: an optional
//! `X-Expected-Version` header is checked against the stored version
//! before storage is touched, and the update statement itself is
//! conditioned on the observed version.

use actix_web::http::header::HeaderMap;
use actix_web::{delete, get, patch, post, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::catalog::{
    CatalogItem, Duration, Filters, ItemId, Metadata, NewCatalogItem, TagSet, Title, Year,
};
use crate::domain::{Error, Permission};

use super::bearer::RequestIdentity;
use super::error::{ApiError, ApiResult};
use super::schemas::MessageResponse;
use super::state::HttpState;
use super::validation::field_error;

/// HTTP header carrying the caller's last-known item version.
pub const EXPECTED_VERSION_HEADER: &str = "X-Expected-Version";

/// Public representation of a catalog item.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemResponse {
    /// Stable item identifier.
    pub id: i64,
    /// Title.
    pub title: String,
    /// Release year.
    pub year: i32,
    /// Running time in minutes.
    pub duration: i32,
    /// Tags.
    pub tags: Vec<String>,
    /// Version counter for optimistic concurrency.
    pub version: u32,
}

impl From<&CatalogItem> for ItemResponse {
    fn from(item: &CatalogItem) -> Self {
        Self {
            id: item.id().as_i64(),
            title: item.title().as_ref().to_owned(),
            year: item.year().as_i32(),
            duration: item.duration().minutes(),
            tags: item.tags().as_slice().to_vec(),
            version: item.version(),
        }
    }
}

/// Envelope around one item.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ItemEnvelope {
    /// The item.
    pub item: ItemResponse,
}

/// Envelope around a listing page.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ItemListEnvelope {
    /// The matching items, in sort order.
    pub items: Vec<ItemResponse>,
    /// Pagination metadata.
    pub metadata: Metadata,
}

/// Item creation body.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct CreateItemRequest {
    pub title: String,
    pub year: i32,
    pub duration: i32,
    pub tags: Vec<String>,
}

fn parse_new_item(request: CreateItemRequest) -> Result<NewCatalogItem, ApiError> {
    Ok(NewCatalogItem {
        title: Title::new(request.title).map_err(|err| field_error("title", err.to_string()))?,
        year: Year::new(request.year).map_err(|err| field_error("year", err.to_string()))?,
        duration: Duration::new(request.duration)
            .map_err(|err| field_error("duration", err.to_string()))?,
        tags: TagSet::new(request.tags).map_err(|err| field_error("tags", err.to_string()))?,
    })
}

/// Create a catalog item at version 1.
#[utoipa::path(
    post,
    path = "/v1/items",
    request_body = CreateItemRequest,
    responses(
        (status = 201, description = "Item created", body = ItemEnvelope,
            headers(("Location" = String, description = "URL of the new item"))),
        (status = 401, description = "Authentication required", body = Error),
        (status = 403, description = "Not activated or not permitted", body = Error),
        (status = 422, description = "Validation failed", body = Error),
        (status = 429, description = "Rate limit exceeded", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["catalog"],
    operation_id = "createItem"
)]
#[post("/items")]
pub async fn create_item(
    state: web::Data<HttpState>,
    identity: RequestIdentity,
    payload: web::Json<CreateItemRequest>,
) -> ApiResult<HttpResponse> {
    state
        .authorizer
        .require_permission(&identity.0, Permission::CatalogWrite)
        .await?;

    let new_item = parse_new_item(payload.into_inner())?;
    let item = state.catalog.insert(new_item).await.map_err(Error::from)?;

    Ok(HttpResponse::Created()
        .insert_header(("Location", format!("/v1/items/{}", item.id())))
        .json(ItemEnvelope {
            item: ItemResponse::from(&item),
        }))
}

/// Listing query parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ListQuery {
    /// Case-insensitive title substring.
    pub title: Option<String>,
    /// Comma-separated tags an item must all carry.
    pub tags: Option<String>,
    /// One-based page number.
    pub page: Option<u32>,
    /// Page size.
    pub page_size: Option<u32>,
    /// Safelisted sort key, `-`-prefixed for descending.
    pub sort: Option<String>,
}

fn parse_filters(query: ListQuery) -> Result<Filters, ApiError> {
    let tags = query
        .tags
        .map(|csv| {
            csv.split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();

    Filters::new(
        query.title,
        tags,
        query.page.unwrap_or(1),
        query.page_size.unwrap_or(20),
        query.sort.as_deref(),
    )
    .map_err(|err| {
        use crate::domain::catalog::FilterValidationError;
        let field = match err {
            FilterValidationError::PageOutOfRange { .. } => "page",
            FilterValidationError::PageSizeOutOfRange { .. } => "page_size",
            FilterValidationError::UnknownSortKey { .. } => "sort",
        };
        field_error(field, err.to_string())
    })
}

/// List catalog items with filters, safelisted sorting, and pagination.
#[utoipa::path(
    get,
    path = "/v1/items",
    params(
        ("title" = Option<String>, Query, description = "Case-insensitive title substring"),
        ("tags" = Option<String>, Query, description = "Comma-separated tags an item must all carry"),
        ("page" = Option<u32>, Query, description = "One-based page number"),
        ("page_size" = Option<u32>, Query, description = "Page size, at most 100"),
        ("sort" = Option<String>, Query, description = "One of id, title, year, duration, optionally -prefixed")
    ),
    responses(
        (status = 200, description = "Matching items", body = ItemListEnvelope),
        (status = 401, description = "Authentication required", body = Error),
        (status = 403, description = "Not activated or not permitted", body = Error),
        (status = 422, description = "Validation failed", body = Error),
        (status = 429, description = "Rate limit exceeded", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["catalog"],
    operation_id = "listItems"
)]
#[get("/items")]
pub async fn list_items(
    state: web::Data<HttpState>,
    identity: RequestIdentity,
    query: web::Query<ListQuery>,
) -> ApiResult<web::Json<ItemListEnvelope>> {
    state
        .authorizer
        .require_permission(&identity.0, Permission::CatalogRead)
        .await?;

    let filters = parse_filters(query.into_inner())?;
    let (items, metadata) = state.catalog.list(&filters).await.map_err(Error::from)?;

    Ok(web::Json(ItemListEnvelope {
        items: items.iter().map(ItemResponse::from).collect(),
        metadata,
    }))
}

fn item_id_from_path(id: i64) -> Result<ItemId, ApiError> {
    if id < 1 {
        return Err(ApiError::from(Error::resource_not_found()));
    }
    Ok(ItemId::new(id))
}

/// Fetch one catalog item.
#[utoipa::path(
    get,
    path = "/v1/items/{id}",
    params(("id" = i64, Path, description = "Item identifier")),
    responses(
        (status = 200, description = "The item", body = ItemEnvelope),
        (status = 401, description = "Authentication required", body = Error),
        (status = 403, description = "Not activated or not permitted", body = Error),
        (status = 404, description = "No such item", body = Error),
        (status = 429, description = "Rate limit exceeded", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["catalog"],
    operation_id = "showItem"
)]
#[get("/items/{id}")]
pub async fn show_item(
    state: web::Data<HttpState>,
    identity: RequestIdentity,
    path: web::Path<i64>,
) -> ApiResult<web::Json<ItemEnvelope>> {
    state
        .authorizer
        .require_permission(&identity.0, Permission::CatalogRead)
        .await?;

    let id = item_id_from_path(path.into_inner())?;
    let item = state
        .catalog
        .find(id)
        .await
        .map_err(Error::from)?
        .ok_or_else(|| ApiError::from(Error::resource_not_found()))?;

    Ok(web::Json(ItemEnvelope {
        item: ItemResponse::from(&item),
    }))
}

/// Partial update body; absent fields keep their stored values.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct UpdateItemRequest {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub duration: Option<i32>,
    pub tags: Option<Vec<String>>,
}

fn apply_changes(item: &mut CatalogItem, request: UpdateItemRequest) -> Result<(), ApiError> {
    if let Some(title) = request.title {
        item.set_title(Title::new(title).map_err(|err| field_error("title", err.to_string()))?);
    }
    if let Some(year) = request.year {
        item.set_year(Year::new(year).map_err(|err| field_error("year", err.to_string()))?);
    }
    if let Some(duration) = request.duration {
        item.set_duration(
            Duration::new(duration).map_err(|err| field_error("duration", err.to_string()))?,
        );
    }
    if let Some(tags) = request.tags {
        item.set_tags(TagSet::new(tags).map_err(|err| field_error("tags", err.to_string()))?);
    }
    Ok(())
}

fn check_expected_version(headers: &HeaderMap, item: &CatalogItem) -> Result<(), ApiError> {
    let Some(expected) = headers.get(EXPECTED_VERSION_HEADER) else {
        return Ok(());
    };
    // Compared as strings: an unparsable precondition can never match the
    // stored version, which is a conflict, not a validation error.
    let matches = expected
        .to_str()
        .is_ok_and(|value| value == item.version().to_string());
    if !matches {
        return Err(ApiError::from(Error::edit_conflict()));
    }
    Ok(())
}

/// Partially update a catalog item under the concurrency guard.
///
/// If an `X-Expected-Version` header is supplied and does not equal the
/// current stored version, the request fails with a conflict before
/// storage is touched. The update itself is conditioned on the observed
/// version at the storage layer, so a racing writer also surfaces as a
/// conflict rather than a lost update.
#[utoipa::path(
    patch,
    path = "/v1/items/{id}",
    params(
        ("id" = i64, Path, description = "Item identifier"),
        ("X-Expected-Version" = Option<String>, Header, description = "Caller's last-known version")
    ),
    request_body = UpdateItemRequest,
    responses(
        (status = 200, description = "The updated item", body = ItemEnvelope),
        (status = 401, description = "Authentication required", body = Error),
        (status = 403, description = "Not activated or not permitted", body = Error),
        (status = 404, description = "No such item", body = Error),
        (status = 409, description = "Concurrent modification", body = Error),
        (status = 422, description = "Validation failed", body = Error),
        (status = 429, description = "Rate limit exceeded", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["catalog"],
    operation_id = "updateItem"
)]
#[patch("/items/{id}")]
pub async fn update_item(
    state: web::Data<HttpState>,
    identity: RequestIdentity,
    request: HttpRequest,
    path: web::Path<i64>,
    payload: web::Json<UpdateItemRequest>,
) -> ApiResult<web::Json<ItemEnvelope>> {
    state
        .authorizer
        .require_permission(&identity.0, Permission::CatalogWrite)
        .await?;

    let id = item_id_from_path(path.into_inner())?;
    let mut item = state
        .catalog
        .find(id)
        .await
        .map_err(Error::from)?
        .ok_or_else(|| ApiError::from(Error::resource_not_found()))?;

    check_expected_version(request.headers(), &item)?;
    apply_changes(&mut item, payload.into_inner())?;

    state.catalog.update(&item).await.map_err(Error::from)?;
    item.advance_version();

    Ok(web::Json(ItemEnvelope {
        item: ItemResponse::from(&item),
    }))
}

/// Delete a catalog item.
#[utoipa::path(
    delete,
    path = "/v1/items/{id}",
    params(("id" = i64, Path, description = "Item identifier")),
    responses(
        (status = 200, description = "Item deleted", body = MessageResponse),
        (status = 401, description = "Authentication required", body = Error),
        (status = 403, description = "Not activated or not permitted", body = Error),
        (status = 404, description = "No such item", body = Error),
        (status = 429, description = "Rate limit exceeded", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["catalog"],
    operation_id = "deleteItem"
)]
#[delete("/items/{id}")]
pub async fn delete_item(
    state: web::Data<HttpState>,
    identity: RequestIdentity,
    path: web::Path<i64>,
) -> ApiResult<web::Json<MessageResponse>> {
    state
        .authorizer
        .require_permission(&identity.0, Permission::CatalogWrite)
        .await?;

    let id = item_id_from_path(path.into_inner())?;
    state.catalog.delete(id).await.map_err(Error::from)?;

    Ok(web::Json(MessageResponse::new("item successfully deleted")))
}
