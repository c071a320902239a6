//! Token API handlers.
//!
//! ```text
//! POST /v1/tokens/authentication  email+password login
//! POST /v1/tokens/password-reset  request a password-reset token by mail
//! POST /v1/tokens/activation      re-send an activation token by mail
//! ```
//!
//! The password-reset and activation flows answer with one uniform `202`
//! whether or not the email is registered, so responses cannot be used to
//! enumerate accounts.

use std::sync::Arc;

use actix_web::{post, web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;
use utoipa::ToSchema;

use crate::domain::account::{Account, Email, Password};
use crate::domain::ports::MailTemplate;
use crate::domain::token::{self, TokenScope};
use crate::domain::Error;

use super::bearer::RequestIdentity;
use super::error::{ApiError, ApiResult};
use super::schemas::MessageResponse;
use super::state::HttpState;
use super::validation::field_error;

/// An issued authentication token.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    /// The one-time plaintext; it is never persisted and never shown
    /// again.
    pub token: String,
    /// Instant after which the token stops resolving.
    pub expiry: DateTime<Utc>,
}

/// Envelope around an authentication token.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenEnvelope {
    /// The issued token.
    pub authentication_token: TokenResponse,
}

/// Login request body.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Exchange email and password for a bearer authentication token.
///
/// An unknown email and a wrong password yield the same rejection.
#[utoipa::path(
    post,
    path = "/v1/tokens/authentication",
    request_body = LoginRequest,
    responses(
        (status = 201, description = "Token issued", body = TokenEnvelope),
        (status = 401, description = "Invalid credentials", body = Error),
        (status = 422, description = "Validation failed", body = Error),
        (status = 429, description = "Rate limit exceeded", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["tokens"],
    operation_id = "createAuthenticationToken"
)]
#[post("/tokens/authentication")]
pub async fn login(
    state: web::Data<HttpState>,
    _identity: RequestIdentity,
    payload: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    let request = payload.into_inner();
    let email = Email::new(request.email).map_err(|err| field_error("email", err.to_string()))?;
    let password =
        Password::new(request.password).map_err(|err| field_error("password", err.to_string()))?;

    let account = state
        .accounts
        .find_by_email(&email)
        .await
        .map_err(Error::from)?
        .ok_or_else(|| ApiError::from(Error::invalid_credentials()))?;

    let matches = account
        .password()
        .matches(&password)
        .map_err(|err| Error::internal(format!("failed to verify password: {err}")))?;
    if !matches {
        return Err(ApiError::from(Error::invalid_credentials()));
    }

    let issued = token::issue(
        account.id(),
        state.ttls.authentication,
        TokenScope::Authentication,
    );
    state
        .tokens
        .insert(issued.record())
        .await
        .map_err(Error::from)?;

    Ok(HttpResponse::Created().json(TokenEnvelope {
        authentication_token: TokenResponse {
            token: issued.plaintext().to_owned(),
            expiry: issued.record().expiry(),
        },
    }))
}

/// Body for the password-reset and activation token request flows.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct TokenRequest {
    pub email: String,
}

async fn send_scoped_token(
    state: &HttpState,
    account: &Account,
    scope: TokenScope,
    template: MailTemplate,
    payload_key: &'static str,
) -> Result<(), ApiError> {
    let ttl = match scope {
        TokenScope::Activation => state.ttls.activation,
        TokenScope::PasswordReset => state.ttls.password_reset,
        TokenScope::Authentication => state.ttls.authentication,
    };
    let issued = token::issue(account.id(), ttl, scope);
    state
        .tokens
        .insert(issued.record())
        .await
        .map_err(Error::from)?;

    let mailer = Arc::clone(&state.mailer);
    let recipient = account.email().clone();
    let mail_payload = json!({ payload_key: issued.plaintext() });
    state
        .tasks
        .spawn("scoped-token-mail", async move {
            if let Err(err) = mailer.send(&recipient, template, mail_payload).await {
                error!(error = %err, template = template.name(), "failed to send token mail");
            }
        })
        .await;
    Ok(())
}

/// Request a password-reset token.
///
/// The response is uniform whether or not the email is registered; the
/// token is only actually issued and mailed to an existing, activated
/// account.
#[utoipa::path(
    post,
    path = "/v1/tokens/password-reset",
    request_body = TokenRequest,
    responses(
        (status = 202, description = "Request accepted", body = MessageResponse),
        (status = 422, description = "Validation failed", body = Error),
        (status = 429, description = "Rate limit exceeded", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["tokens"],
    operation_id = "createPasswordResetToken"
)]
#[post("/tokens/password-reset")]
pub async fn request_password_reset(
    state: web::Data<HttpState>,
    _identity: RequestIdentity,
    payload: web::Json<TokenRequest>,
) -> ApiResult<HttpResponse> {
    let email = Email::new(payload.into_inner().email)
        .map_err(|err| field_error("email", err.to_string()))?;

    let account = state
        .accounts
        .find_by_email(&email)
        .await
        .map_err(Error::from)?;
    if let Some(account) = account {
        if account.is_activated() {
            send_scoped_token(
                &state,
                &account,
                TokenScope::PasswordReset,
                MailTemplate::PasswordResetToken,
                "passwordResetToken",
            )
            .await?;
        }
    }

    Ok(HttpResponse::Accepted().json(MessageResponse::new(
        "if we have an account associated with this email address, you'll receive password reset instructions shortly",
    )))
}

/// Re-send an activation token.
///
/// The response is uniform whether or not the email is registered; the
/// token is only actually issued and mailed to an existing, not yet
/// activated account.
#[utoipa::path(
    post,
    path = "/v1/tokens/activation",
    request_body = TokenRequest,
    responses(
        (status = 202, description = "Request accepted", body = MessageResponse),
        (status = 422, description = "Validation failed", body = Error),
        (status = 429, description = "Rate limit exceeded", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["tokens"],
    operation_id = "createActivationToken"
)]
#[post("/tokens/activation")]
pub async fn request_activation(
    state: web::Data<HttpState>,
    _identity: RequestIdentity,
    payload: web::Json<TokenRequest>,
) -> ApiResult<HttpResponse> {
    let email = Email::new(payload.into_inner().email)
        .map_err(|err| field_error("email", err.to_string()))?;

    let account = state
        .accounts
        .find_by_email(&email)
        .await
        .map_err(Error::from)?;
    if let Some(account) = account {
        if !account.is_activated() {
            send_scoped_token(
                &state,
                &account,
                TokenScope::Activation,
                MailTemplate::ActivationToken,
                "activationToken",
            )
            .await?;
        }
    }

    Ok(HttpResponse::Accepted().json(MessageResponse::new(
        "if we have an account associated with this email address, you'll receive activation instructions shortly",
    )))
}
