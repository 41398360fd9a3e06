use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::app::AppState;
use crate::error::ApiError;
use crate::identity::IdentityUser;

/// Authenticated caller resolved from the bearer token
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub sub: String,
    pub username: String,
    pub email: String,
    pub groups: Vec<String>,
}

impl From<IdentityUser> for AuthUser {
    fn from(user: IdentityUser) -> Self {
        Self {
            sub: user.sub,
            username: user.username,
            email: user.email,
            groups: user.groups,
        }
    }
}

/// Bearer token authentication for `/api/*`; injects `AuthUser` into the request
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_jwt_from_headers(&headers).map_err(ApiError::unauthorized)?;

    let user = state
        .identity
        .get_user(&token)
        .await
        .map_err(|e| ApiError::unauthorized(e.to_string()))?;
    debug!("Authenticated {} for {}", user.username, request.uri().path());

    request.extensions_mut().insert(AuthUser::from(user));
    Ok(next.run(request).await)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty JWT token".to_string());
        }
        Ok(token.trim().to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}
