use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::state::AppState;

/// Claims of tokens minted by the identity provider. Only the subject and
/// expiry are inspected here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// Validate a bearer JWT when a secret is configured; pass through otherwise.
///
/// WebSocket clients that cannot set headers may send `?token=` instead.
pub async fn require_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(secret) = state.jwt_secret.as_deref() else {
        return Ok(next.run(req).await);
    };

    let token = bearer_token(req.headers())
        .or_else(|| query_token(req.uri().query()))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = decode_claims(&token, secret).map_err(|e| {
        debug!("Rejected token: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    debug!("Authenticated request for {}", claims.sub);
    Ok(next.run(req).await)
}

pub fn decode_claims(token: &str, secret: &str) -> jsonwebtoken::errors::Result<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn query_token(query: Option<&str>) -> Option<String> {
    query?
        .split('&')
        .find_map(|pair| pair.strip_prefix("token="))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
