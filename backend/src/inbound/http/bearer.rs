//! Bearer-credential extraction.
//!
//! Every handler takes a [`RequestIdentity`] parameter, so identity
//! resolution runs for each request and the resolved value travels as an
//! explicit, typed argument down the call chain. An invalid credential is
//! rejected uniformly, even on operations open to anonymous callers.

use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;

use crate::domain::{Error, Identity};

use super::error::ApiError;
use super::state::HttpState;

/// The request's resolved identity, extracted from the `Authorization`
/// header. Absence of the header yields [`Identity::Anonymous`].
pub struct RequestIdentity(pub Identity);

impl FromRequest for RequestIdentity {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let header = req.headers().get(header::AUTHORIZATION).cloned();
        let state = req.app_data::<web::Data<HttpState>>().cloned();

        Box::pin(async move {
            let state = state.ok_or_else(|| {
                ApiError::from(Error::internal("HttpState missing from application data"))
            })?;

            let header = match header {
                None => None,
                // Non-ASCII header bytes cannot be a well-formed credential.
                Some(value) => match value.to_str() {
                    Ok(value) => Some(value.to_owned()),
                    Err(_) => return Err(ApiError::from(Error::invalid_credential_format())),
                },
            };

            let identity = state.identity.resolve(header.as_deref()).await?;
            Ok(Self(identity))
        })
    }
}
