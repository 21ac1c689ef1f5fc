//! Middleware de autenticación JWT
//!
//! Resuelve el `Principal` desde el header Authorization y lo inyecta en
//! las extensions; los handlers lo reciben con `Extension<Principal>`.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::state::AppState;
use crate::utils::errors::{AppError, AppResult};
use crate::utils::jwt::{bearer_token, decode_token};

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> AppResult<Response> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Authorization token required".to_string()))?;

    let principal = decode_token(bearer_token(header_value)?, &state.config.jwt_secret)?;
    debug!(
        "Request authenticated for user {} in organization {}",
        principal.user_id, principal.organization_id
    );

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
