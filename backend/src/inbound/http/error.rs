//! HTTP error payloads and mapping from domain errors.
//!
//! Keep the domain free of transport concerns by translating [`Error`]
//! into Actix responses here. Expected outcomes map to stable, distinct
//! status codes; internal failures are logged with full context and
//! redacted toward the caller.

use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use tracing::error;

use crate::domain::{Error, ErrorCode};

/// Adapter wrapping [`Error`] for Actix's `ResponseError` machinery.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError(Error);

impl ApiError {
    /// The wrapped domain error.
    pub fn inner(&self) -> &Error {
        &self.0
    }

    fn status_for(code: ErrorCode) -> StatusCode {
        match code {
            ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorCode::ValidationFailed => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::AuthenticationRequired
            | ErrorCode::InvalidCredentialFormat
            | ErrorCode::InvalidOrExpiredCredential
            | ErrorCode::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ErrorCode::AccountNotActivated | ErrorCode::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorCode::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::EditConflict => StatusCode::CONFLICT,
            ErrorCode::ResourceNotFound => StatusCode::NOT_FOUND,
            ErrorCode::InternalFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(value: Error) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        Self::status_for(self.0.code())
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());

        if matches!(
            self.0.code(),
            ErrorCode::InvalidCredentialFormat | ErrorCode::InvalidOrExpiredCredential
        ) {
            builder.insert_header((header::WWW_AUTHENTICATE, "Bearer"));
        }

        if matches!(self.0.code(), ErrorCode::InternalFailure) {
            error!(detail = %self.0.message(), "internal failure");
            let redacted = Error::internal(
                "the server encountered a problem and could not process your request",
            );
            return builder.json(redacted);
        }

        builder.json(&self.0)
    }
}

/// Convenience alias for HTTP handlers.
pub type ApiResult<T> = Result<T, ApiError>;
