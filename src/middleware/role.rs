use axum::{extract::Request, middleware::Next, response::Response};

use crate::auth::Role;
use crate::error::ApiError;
use crate::middleware::auth::AuthIdentity;

/// Route allow-lists. Routes reference these named constants through the
/// middleware fns below, so the route-to-roles mapping is checked at
/// compile time.
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];
pub const ANY_STAFF: &[Role] = &[Role::Admin, Role::Member];

/// Authorization gate for routes only administrators may call.
pub async fn admin_only(request: Request, next: Next) -> Result<Response, ApiError> {
    authorize(ADMIN_ONLY, request, next).await
}

/// Authorization gate for routes any signed-in staff member may call.
pub async fn any_staff(request: Request, next: Next) -> Result<Response, ApiError> {
    authorize(ANY_STAFF, request, next).await
}

/// Check the authenticated identity's role against the route's allow-list.
/// A role outside the list is a plain 403; the handler is never reached.
async fn authorize(
    allowed: &'static [Role],
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = request.extensions().get::<AuthIdentity>().ok_or_else(|| {
        // Wiring error: the authorization gate ran without the
        // authentication gate in front of it
        tracing::error!("authorization gate reached without an authenticated identity");
        ApiError::internal("Authorization cannot be evaluated for this route")
    })?;

    if !allowed.contains(&identity.role) {
        return Err(ApiError::forbidden("Insufficient privileges"));
    }

    Ok(next.run(request).await)
}
