//! Bearer token validation and service-side issuance.
//!
//! The auth service issues user tokens; the core only validates them. The
//! recurring service additionally mints short-lived tokens with the shared
//! secret so its invocation calls carry the task owner as `sub` instead of
//! smuggling a user id through the request body.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Mint an HS256 token for `user_id`, valid for `lifetime_seconds`.
pub fn issue(user_id: &str, secret: &str, lifetime_seconds: u64) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id.to_owned(),
        exp: now_unix() + lifetime_seconds,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// Validate a bearer token and return its subject claim.
pub fn verify(token: &str, secret: &str) -> anyhow::Result<String> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims.sub)
}
