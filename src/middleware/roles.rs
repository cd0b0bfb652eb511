use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::middleware::auth::AuthUser;

/// Role whitelists used as middleware state
pub const ADMIN_ONLY: &[&str] = &["admin"];
pub const STAFF: &[&str] = &["admin", "manager"];

/// Role whitelist middleware. Runs after JWT auth; forbids callers whose
/// role is not in the whitelist.
pub async fn require_role(
    State(allowed): State<&'static [&'static str]>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !allowed.contains(&auth_user.role.as_str()) {
        tracing::warn!(
            "Role check failed: user {} has role '{}', needs one of {:?}",
            auth_user.user_id,
            auth_user.role,
            allowed
        );
        return Err(ApiError::forbidden("Insufficient role for this operation"));
    }

    Ok(next.run(request).await)
}
