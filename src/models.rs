use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct RegisterReq {
    #[schema(example = "budi")]
    pub username: String,
    #[schema(example = "secret123")]
    pub password: String,
    /// Job title
    #[schema(example = "Staff IT")]
    pub position: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "budi")]
    pub username: String,
    #[schema(example = "secret123")]
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[schema(example = "Bearer")]
    pub token_type: &'static str,
    /// Access token lifetime in seconds
    #[schema(example = 900)]
    pub expires_in: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Token claims. `sub` carries the user id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "RawClaims")]
pub struct Claims {
    pub sub: u64,
    pub usr: String,
    pub iat: usize,
    pub exp: usize,
    pub jti: String,
    pub token_type: TokenType,
}

/// Wire shape accepted on decode. Older tokens put the username in `sub`
/// and the id in `uid` or `user_id`.
#[derive(Deserialize)]
struct RawClaims {
    sub: Option<Value>,
    uid: Option<u64>,
    user_id: Option<u64>,
    usr: Option<String>,
    #[serde(default)]
    iat: usize,
    exp: usize,
    jti: String,
    token_type: TokenType,
}

impl TryFrom<RawClaims> for Claims {
    type Error = String;

    fn try_from(raw: RawClaims) -> Result<Self, Self::Error> {
        let (sub_id, sub_name) = match raw.sub {
            Some(Value::Number(n)) => (n.as_u64(), None),
            Some(Value::String(s)) => match s.parse::<u64>() {
                Ok(id) => (Some(id), None),
                Err(_) => (None, Some(s)),
            },
            _ => (None, None),
        };

        let sub = sub_id
            .or(raw.uid)
            .or(raw.user_id)
            .ok_or_else(|| "token carries no user id".to_string())?;

        Ok(Claims {
            sub,
            usr: raw.usr.or(sub_name).unwrap_or_default(),
            iat: raw.iat,
            exp: raw.exp,
            jti: raw.jti,
            token_type: raw.token_type,
        })
    }
}
