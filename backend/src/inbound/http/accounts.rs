//! Account API handlers.
//!
//! ```text
//! POST /v1/accounts            register a new account
//! PUT  /v1/accounts/activated  redeem an activation token
//! PUT  /v1/accounts/password   redeem a password-reset token
//! ```

use std::sync::Arc;

use actix_web::{post, put, web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;
use utoipa::ToSchema;

use crate::domain::account::{Account, AccountName, Email, Password, PasswordDigest};
use crate::domain::ports::{MailTemplate, NewAccount};
use crate::domain::token::{self, TokenScope};
use crate::domain::{Error, Permission};

use super::bearer::RequestIdentity;
use super::error::ApiResult;
use super::schemas::MessageResponse;
use super::state::HttpState;
use super::validation::field_error;

/// Public representation of an account. The credential and the version
/// counter stay internal.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    /// Stable account identifier.
    pub id: i64,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Whether the account has been activated.
    pub activated: bool,
}

impl From<&Account> for AccountResponse {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id().as_i64(),
            created_at: account.created_at(),
            name: account.name().as_ref().to_owned(),
            email: account.email().as_ref().to_owned(),
            activated: account.is_activated(),
        }
    }
}

/// Envelope around one account.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AccountEnvelope {
    /// The account.
    pub account: AccountResponse,
}

/// Registration request body.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Register a new, unactivated account.
///
/// Grants the read permission, issues an activation token, and sends the
/// welcome mail in the background. Responds `202 Accepted`: activation is
/// still outstanding.
#[utoipa::path(
    post,
    path = "/v1/accounts",
    request_body = RegisterRequest,
    responses(
        (status = 202, description = "Account registered", body = AccountEnvelope),
        (status = 422, description = "Validation failed", body = Error),
        (status = 429, description = "Rate limit exceeded", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["accounts"],
    operation_id = "registerAccount"
)]
#[post("/accounts")]
pub async fn register(
    state: web::Data<HttpState>,
    _identity: RequestIdentity,
    payload: web::Json<RegisterRequest>,
) -> ApiResult<HttpResponse> {
    let request = payload.into_inner();
    let name = AccountName::new(request.name).map_err(|err| field_error("name", err.to_string()))?;
    let email = Email::new(request.email).map_err(|err| field_error("email", err.to_string()))?;
    let password =
        Password::new(request.password).map_err(|err| field_error("password", err.to_string()))?;

    let digest = PasswordDigest::generate(&password)
        .map_err(|err| Error::internal(format!("failed to hash password: {err}")))?;

    let account = state
        .accounts
        .insert(NewAccount {
            name,
            email,
            password: digest,
        })
        .await
        .map_err(Error::from)?;

    // New accounts can browse the catalog once activated; writes need an
    // explicit grant.
    state
        .permissions
        .grant(account.id(), &[Permission::CatalogRead])
        .await
        .map_err(Error::from)?;

    let issued = token::issue(account.id(), state.ttls.activation, TokenScope::Activation);
    state
        .tokens
        .insert(issued.record())
        .await
        .map_err(Error::from)?;

    let mailer = Arc::clone(&state.mailer);
    let recipient = account.email().clone();
    let mail_payload = json!({
        "accountId": account.id().as_i64(),
        "activationToken": issued.plaintext(),
    });
    state
        .tasks
        .spawn("welcome-mail", async move {
            if let Err(err) = mailer
                .send(&recipient, MailTemplate::Welcome, mail_payload)
                .await
            {
                error!(error = %err, "failed to send welcome mail");
            }
        })
        .await;

    Ok(HttpResponse::Accepted().json(AccountEnvelope {
        account: AccountResponse::from(&account),
    }))
}

/// Activation request body.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ActivateRequest {
    pub token: String,
}

/// Redeem an activation token.
///
/// Flips the activation flag exactly once via a conditioned update, then
/// invalidates every outstanding activation token for the account.
#[utoipa::path(
    put,
    path = "/v1/accounts/activated",
    request_body = ActivateRequest,
    responses(
        (status = 200, description = "Account activated", body = AccountEnvelope),
        (status = 409, description = "Concurrent modification", body = Error),
        (status = 422, description = "Invalid or expired token", body = Error),
        (status = 429, description = "Rate limit exceeded", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["accounts"],
    operation_id = "activateAccount"
)]
#[put("/accounts/activated")]
pub async fn activate(
    state: web::Data<HttpState>,
    _identity: RequestIdentity,
    payload: web::Json<ActivateRequest>,
) -> ApiResult<web::Json<AccountEnvelope>> {
    let plaintext = payload.into_inner().token;
    if !token::has_valid_shape(&plaintext) {
        return Err(field_error("token", "must be 26 bytes long"));
    }

    let digest = token::digest(&plaintext);
    let mut account = state
        .accounts
        .find_by_token(&digest, TokenScope::Activation)
        .await
        .map_err(Error::from)?
        .ok_or_else(|| field_error("token", "invalid or expired activation token"))?;

    account.mark_activated();
    state.accounts.update(&account).await.map_err(Error::from)?;
    account.advance_version();

    state
        .tokens
        .delete_all_for_account(account.id(), TokenScope::Activation)
        .await
        .map_err(Error::from)?;

    Ok(web::Json(AccountEnvelope {
        account: AccountResponse::from(&account),
    }))
}

/// Password-reset redemption body.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

/// Redeem a password-reset token and replace the stored credential.
///
/// Every outstanding reset token for the account is invalidated on
/// success.
#[utoipa::path(
    put,
    path = "/v1/accounts/password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password replaced", body = MessageResponse),
        (status = 409, description = "Concurrent modification", body = Error),
        (status = 422, description = "Invalid token or password", body = Error),
        (status = 429, description = "Rate limit exceeded", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["accounts"],
    operation_id = "resetPassword"
)]
#[put("/accounts/password")]
pub async fn reset_password(
    state: web::Data<HttpState>,
    _identity: RequestIdentity,
    payload: web::Json<ResetPasswordRequest>,
) -> ApiResult<web::Json<MessageResponse>> {
    let request = payload.into_inner();
    let password =
        Password::new(request.password).map_err(|err| field_error("password", err.to_string()))?;
    if !token::has_valid_shape(&request.token) {
        return Err(field_error("token", "must be 26 bytes long"));
    }

    let digest = token::digest(&request.token);
    let mut account = state
        .accounts
        .find_by_token(&digest, TokenScope::PasswordReset)
        .await
        .map_err(Error::from)?
        .ok_or_else(|| field_error("token", "invalid or expired password-reset token"))?;

    let new_digest = PasswordDigest::generate(&password)
        .map_err(|err| Error::internal(format!("failed to hash password: {err}")))?;
    account.replace_password(new_digest);
    state.accounts.update(&account).await.map_err(Error::from)?;

    state
        .tokens
        .delete_all_for_account(account.id(), TokenScope::PasswordReset)
        .await
        .map_err(Error::from)?;

    Ok(web::Json(MessageResponse::new(
        "your password was successfully reset",
    )))
}
