//! Domain-level error types.
//!
//! These errors are transport agnostic. The HTTP adapter maps them onto
//! status codes and response envelopes in `inbound::http::error`.

use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The request is malformed (bad JSON, bad header syntax).
    InvalidRequest,
    /// The request parsed but one or more fields fail validation.
    ValidationFailed,
    /// The operation requires an authenticated identity.
    AuthenticationRequired,
    /// A bearer credential was presented but is not well formed.
    InvalidCredentialFormat,
    /// A well-formed credential that does not resolve to an account.
    ///
    /// Unknown, expired, and wrong-scope tokens all map here so the
    /// response never reveals which tokens ever existed.
    InvalidOrExpiredCredential,
    /// Email/password login failed.
    InvalidCredentials,
    /// The account exists but has not been activated.
    AccountNotActivated,
    /// The account lacks the permission the operation requires.
    PermissionDenied,
    /// The client has exhausted its request budget.
    RateLimitExceeded,
    /// A versioned update lost the race against a concurrent writer.
    EditConflict,
    /// The requested resource does not exist.
    ResourceNotFound,
    /// An unexpected collaborator failure; context is logged, never returned.
    InternalFailure,
}

/// Domain error payload carried from services to adapters.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Error {
    #[schema(example = "validation_failed")]
    code: ErrorCode,
    #[schema(example = "title must not be empty")]
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl Error {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message returned to adapters.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Supplementary error details for adapters.
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Attach structured details to the error.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Convenience constructor for [`ErrorCode::InvalidRequest`].
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Convenience constructor for [`ErrorCode::ValidationFailed`].
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    /// Convenience constructor for [`ErrorCode::AuthenticationRequired`].
    pub fn authentication_required() -> Self {
        Self::new(
            ErrorCode::AuthenticationRequired,
            "you must be authenticated to access this resource",
        )
    }

    /// Convenience constructor for [`ErrorCode::InvalidCredentialFormat`].
    pub fn invalid_credential_format() -> Self {
        Self::new(
            ErrorCode::InvalidCredentialFormat,
            "invalid or missing authentication token",
        )
    }

    /// Convenience constructor for [`ErrorCode::InvalidOrExpiredCredential`].
    pub fn invalid_or_expired_credential() -> Self {
        Self::new(
            ErrorCode::InvalidOrExpiredCredential,
            "invalid or missing authentication token",
        )
    }

    /// Convenience constructor for [`ErrorCode::InvalidCredentials`].
    pub fn invalid_credentials() -> Self {
        Self::new(
            ErrorCode::InvalidCredentials,
            "invalid authentication credentials",
        )
    }

    /// Convenience constructor for [`ErrorCode::AccountNotActivated`].
    pub fn account_not_activated() -> Self {
        Self::new(
            ErrorCode::AccountNotActivated,
            "your account must be activated to access this resource",
        )
    }

    /// Convenience constructor for [`ErrorCode::PermissionDenied`].
    pub fn permission_denied() -> Self {
        Self::new(
            ErrorCode::PermissionDenied,
            "your account doesn't have the necessary permissions to access this resource",
        )
    }

    /// Convenience constructor for [`ErrorCode::RateLimitExceeded`].
    pub fn rate_limit_exceeded() -> Self {
        Self::new(ErrorCode::RateLimitExceeded, "rate limit exceeded")
    }

    /// Convenience constructor for [`ErrorCode::EditConflict`].
    pub fn edit_conflict() -> Self {
        Self::new(
            ErrorCode::EditConflict,
            "unable to update the record due to an edit conflict, please try again",
        )
    }

    /// Convenience constructor for [`ErrorCode::ResourceNotFound`].
    pub fn resource_not_found() -> Self {
        Self::new(
            ErrorCode::ResourceNotFound,
            "the requested resource could not be found",
        )
    }

    /// Convenience constructor for [`ErrorCode::InternalFailure`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalFailure, message)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}
