use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, error::ErrorUnauthorized, web::Data};
use futures::future::{Ready, ready};

use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::models::TokenType;

/// The verified caller. Placed in request extensions by `auth_middleware`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
}

/// Bearer token from the `Authorization` header, if well formed.
pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        // route mounted outside the protected scope; verify here instead
        let Some(token) = bearer_token(req) else {
            return ready(Err(ErrorUnauthorized("Missing token")));
        };

        let Some(config) = req.app_data::<Data<Config>>() else {
            return ready(Err(actix_web::error::ErrorInternalServerError("Config missing")));
        };

        match verify_token(token, &config.jwt_secret) {
            Ok(claims) if claims.token_type == TokenType::Access => ready(Ok(AuthUser {
                user_id: claims.sub,
                username: claims.usr,
            })),
            _ => ready(Err(ErrorUnauthorized("Invalid token"))),
        }
    }
}
