use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

use crate::models::{Claims, TokenType};

fn now() -> usize {
    Utc::now().timestamp().max(0) as usize
}

fn issue(user_id: u64, username: &str, token_type: TokenType, secret: &str, ttl: usize) -> Result<(String, Claims), Error> {
    let iat = now();
    let claims = Claims {
        sub: user_id,
        usr: username.to_string(),
        iat,
        exp: iat + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, claims))
}

pub fn generate_access_token(user_id: u64, username: &str, secret: &str, ttl: usize) -> Result<String, Error> {
    issue(user_id, username, TokenType::Access, secret, ttl).map(|(token, _)| token)
}

/// The claims are returned too; the caller persists the `jti`.
pub fn generate_refresh_token(user_id: u64, username: &str, secret: &str, ttl: usize) -> Result<(String, Claims), Error> {
    issue(user_id, username, TokenType::Refresh, secret, ttl)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}
