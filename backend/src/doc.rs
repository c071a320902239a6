//! OpenAPI surface used by Swagger UI and tooling.

use utoipa::OpenApi;

use crate::domain::catalog::Metadata;
use crate::domain::{Error, ErrorCode};
use crate::inbound::http::{accounts, catalog, health, schemas, tokens};

/// Aggregated OpenAPI document for the `/v1` surface.
#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck,
        accounts::register,
        accounts::activate,
        accounts::reset_password,
        tokens::login,
        tokens::request_password_reset,
        tokens::request_activation,
        catalog::create_item,
        catalog::list_items,
        catalog::show_item,
        catalog::update_item,
        catalog::delete_item,
    ),
    components(schemas(
        Error,
        ErrorCode,
        Metadata,
        schemas::MessageResponse,
        health::HealthResponse,
        health::SystemInfo,
        accounts::AccountResponse,
        accounts::AccountEnvelope,
        accounts::RegisterRequest,
        accounts::ActivateRequest,
        accounts::ResetPasswordRequest,
        tokens::TokenResponse,
        tokens::TokenEnvelope,
        tokens::LoginRequest,
        tokens::TokenRequest,
        catalog::ItemResponse,
        catalog::ItemEnvelope,
        catalog::ItemListEnvelope,
        catalog::CreateItemRequest,
        catalog::UpdateItemRequest,
    )),
    tags(
        (name = "health", description = "Service status"),
        (name = "accounts", description = "Registration, activation, and password reset"),
        (name = "tokens", description = "Token issuance"),
        (name = "catalog", description = "Catalog items")
    )
)]
pub struct ApiDoc;
