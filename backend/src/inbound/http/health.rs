//! Healthcheck endpoint.

use actix_web::{get, web};
use serde::Serialize;
use utoipa::ToSchema;

use super::state::HttpState;

/// Crate version exposed for runtime queries.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Deployment details nested in the healthcheck payload.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    /// Deployment environment name.
    pub environment: String,
    /// Running crate version.
    pub version: String,
}

/// Healthcheck payload.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `available` while the process serves requests.
    pub status: String,
    /// Deployment details.
    pub system_info: SystemInfo,
}

/// Report service availability.
#[utoipa::path(
    get,
    path = "/v1/healthcheck",
    responses(
        (status = 200, description = "Service status", body = HealthResponse)
    ),
    tags = ["health"],
    operation_id = "healthcheck"
)]
#[get("/healthcheck")]
pub async fn healthcheck(state: web::Data<HttpState>) -> web::Json<HealthResponse> {
    web::Json(HealthResponse {
        status: "available".to_owned(),
        system_info: SystemInfo {
            environment: state.environment.clone(),
            version: VERSION.to_owned(),
        },
    })
}
