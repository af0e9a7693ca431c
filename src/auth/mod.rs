//! Request-scoped identity extraction from the `Authorization: Bearer`
//! access token, grounded in the teacher's `jwt_service`-backed extractor
//! pattern but built against `security::decode_access_token`.

use std::future::{ready, Ready};

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use uuid::Uuid;

use crate::api_error::ApiError;
use crate::config::Config;
use crate::security::decode_access_token;

#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(extract(req))
    }
}

fn extract(req: &HttpRequest) -> Result<AuthUser, ApiError> {
    let config = req
        .app_data::<web::Data<Config>>()
        .ok_or_else(|| ApiError::internal("config not registered"))?;

    let header = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthenticated("missing_authorization_header"))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthenticated("malformed_authorization_header"))?;

    let claims = decode_access_token(config, token).map_err(|_| ApiError::unauthenticated("invalid_access_token"))?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| ApiError::unauthenticated("invalid_access_token"))?;

    Ok(AuthUser(user_id))
}
