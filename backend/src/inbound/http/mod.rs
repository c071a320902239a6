//! HTTP inbound adapter exposing REST endpoints.

pub mod accounts;
pub mod bearer;
pub mod catalog;
pub mod error;
pub mod health;
pub mod schemas;
pub mod state;
#[cfg(test)]
pub(crate) mod test_utils;
pub mod tokens;
mod validation;

use actix_web::web;

use crate::domain::Error;

pub use error::{ApiError, ApiResult};

/// Upper bound on request body size (1 MiB).
const JSON_PAYLOAD_LIMIT: usize = 1_048_576;

/// Register extractor configuration and the `/v1` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(path_config())
        .app_data(query_config())
        .service(
            web::scope("/v1")
                .service(health::healthcheck)
                .service(accounts::register)
                .service(accounts::activate)
                .service(accounts::reset_password)
                .service(tokens::login)
                .service(tokens::request_password_reset)
                .service(tokens::request_activation)
                .service(catalog::create_item)
                .service(catalog::list_items)
                .service(catalog::show_item)
                .service(catalog::update_item)
                .service(catalog::delete_item),
        );
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_PAYLOAD_LIMIT)
        .error_handler(|err, _req| ApiError::from(Error::invalid_request(err.to_string())).into())
}

fn path_config() -> web::PathConfig {
    // An unparsable path segment addresses nothing: respond 404, not 400.
    web::PathConfig::default()
        .error_handler(|_err, _req| ApiError::from(Error::resource_not_found()).into())
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| ApiError::from(Error::invalid_request(err.to_string())).into())
}
