use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
    RequestExt,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

pub const CUSTOMER_ROLE: &str = "CUSTOMER";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CustomerClaims {
    /// Opaque user reference; bookings are owned by this value.
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

/// Validates the bearer token and injects `CustomerClaims` into request extensions.
pub async fn customer_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(Authorization(bearer)) = req
        .extract_parts::<TypedHeader<Authorization<Bearer>>>()
        .await
        .map_err(|_| AppError::AuthenticationError("Missing bearer token".to_string()))?;

    let token_data = decode::<CustomerClaims>(
        bearer.token(),
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::AuthenticationError(format!("Invalid token: {}", e)))?;

    if token_data.claims.role != CUSTOMER_ROLE {
        return Err(AppError::AuthorizationError("Customer role required".to_string()));
    }

    req.extensions_mut().insert(token_data.claims);
    Ok(next.run(req).await)
}

/// Signs a customer token. Used by local tooling and tests; production tokens
/// come from the identity service with the same secret.
pub fn issue_customer_token(secret: &str, user_ref: &str, ttl: Duration) -> Result<String, AppError> {
    let claims = CustomerClaims {
        sub: user_ref.to_string(),
        role: CUSTOMER_ROLE.to_string(),
        exp: (Utc::now() + ttl).timestamp() as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))
}
