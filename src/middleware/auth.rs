use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::auth::{self, Claims, Role, TokenKind};
use crate::error::ApiError;

/// Authenticated caller context decoded from the access token. Trusted as-is
/// for the request's lifetime; no per-request user fetch (see `auth`).
#[derive(Clone, Debug)]
pub struct AuthIdentity {
    pub id: Uuid,
    pub username: String,
    pub name: String,
    pub nickname: String,
    pub phone: String,
    pub avatar: Option<String>,
    pub role: Role,
}

impl From<Claims> for AuthIdentity {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            username: claims.username,
            name: claims.name,
            nickname: claims.nickname,
            phone: claims.phone,
            avatar: claims.avatar,
            role: claims.role,
        }
    }
}

/// Authentication gate for `/api/v1` routes.
///
/// No credential at all is a 401; a credential that fails signature or
/// expiry checks is a 403. On success the decoded identity is attached to
/// the request extensions for the authorization gate and handlers.
pub async fn require_auth(
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&headers)?;

    let claims = auth::verify(&token, TokenKind::Access)
        .map_err(|e| match e {
            auth::TokenError::Invalid(msg) => ApiError::authentication_failed(msg),
            other => other.into(),
        })?;

    request.extensions_mut().insert(AuthIdentity::from(claims));

    Ok(next.run(request).await)
}

/// Extract the token from an `Authorization: Bearer <token>` header.
/// Anything short of a well-formed bearer credential counts as "absent".
fn extract_bearer_token(headers: &HeaderMap) -> Result<String, ApiError> {
    let auth_header = headers
        .get("authorization")
        .ok_or_else(|| ApiError::unauthenticated("Missing Authorization header"))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| ApiError::unauthenticated("Invalid Authorization header format"))?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        Some(_) => Err(ApiError::unauthenticated("Empty bearer token")),
        None => Err(ApiError::unauthenticated(
            "Authorization header must use Bearer token format",
        )),
    }
}
