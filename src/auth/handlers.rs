use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

use crate::{
    auth::{
        auth::{AuthUser, bearer_token},
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::envelope,
    models::{LoginReqDto, RegisterReq, TokenPair, TokenType},
    repo::{is_duplicate, user_repo::UserRepo},
};

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Deserialize, Default)]
pub struct RefreshReq {
    pub refresh_token: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct MeResponse {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "budi")]
    pub username: String,
    #[schema(example = "Staff IT")]
    pub position: String,
    #[schema(example = "2025-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

fn unauthorized(message: &str) -> HttpResponse {
    HttpResponse::Unauthorized().json(envelope("unauthorized", message))
}

fn internal_error() -> HttpResponse {
    HttpResponse::InternalServerError().json(envelope("internal_error", "Internal Server Error"))
}

/// Mints an access/refresh pair and records the refresh `jti`.
async fn issue_pair(repo: &UserRepo, config: &Config, user_id: u64, username: &str) -> Result<TokenPair, HttpResponse> {
    let access_token = generate_access_token(user_id, username, &config.jwt_secret, config.access_token_ttl)
        .map_err(|e| {
            error!(error = %e, "Failed to sign access token");
            internal_error()
        })?;

    let (refresh_token, refresh_claims) =
        generate_refresh_token(user_id, username, &config.jwt_secret, config.refresh_token_ttl).map_err(|e| {
            error!(error = %e, "Failed to sign refresh token");
            internal_error()
        })?;

    debug!(user_id, jti = %refresh_claims.jti, "Storing refresh token");
    repo.store_refresh_token(user_id, &refresh_claims.jti, refresh_claims.exp as i64)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to store refresh token");
            internal_error()
        })?;

    Ok(TokenPair {
        access_token,
        refresh_token,
        token_type: "Bearer",
        expires_in: config.access_token_ttl,
    })
}

/// User registration handler
#[instrument(name = "auth_register", skip(user, repo), fields(username = %user.username.trim()))]
pub async fn register(user: web::Json<RegisterReq>, repo: web::Data<UserRepo>) -> impl Responder {
    let username = user.username.trim();
    let position = user.position.trim();

    if username.chars().count() < MIN_USERNAME_LEN
        || user.password.chars().count() < MIN_PASSWORD_LEN
        || position.is_empty()
    {
        return HttpResponse::BadRequest().json(envelope(
            "invalid_payload",
            "username needs 3+ characters, password 6+, position must not be empty",
        ));
    }

    let hashed = match hash_password(&user.password) {
        Ok(h) => h,
        Err(e) => {
            error!(error = %e, "Failed to hash password");
            return internal_error();
        }
    };

    match repo.create(username, &hashed, position).await {
        Ok(id) => {
            info!(user_id = id, "User registered");
            HttpResponse::Created().json(json!({
                "id": id,
                "username": username,
                "position": position,
            }))
        }
        Err(e) if is_duplicate(&e) => {
            info!("Username already taken");
            HttpResponse::Conflict().json(envelope("username_taken", "Username already exists"))
        }
        Err(e) => {
            error!(error = %e, "Failed to register user");
            internal_error()
        }
    }
}

#[instrument(name = "auth_login", skip(repo, config, user), fields(username = %user.username))]
pub async fn login(
    user: web::Json<LoginReqDto>,
    repo: web::Data<UserRepo>,
    config: web::Data<Config>,
) -> impl Responder {
    if user.username.trim().is_empty() || user.password.is_empty() {
        return HttpResponse::BadRequest().json(envelope("invalid_payload", "Username or password required"));
    }

    let db_user = match repo.find_by_username(user.username.trim()).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            info!("Invalid credentials: user not found");
            return unauthorized("Invalid credentials");
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return internal_error();
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password_hash) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return unauthorized("Invalid credentials");
    }

    let pair = match issue_pair(&repo, &config, db_user.id, &db_user.username).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    if let Err(e) = repo.touch_last_login(db_user.id).await {
        // login still succeeds
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, "Login successful");
    HttpResponse::Ok().json(pair)
}

/// Refresh token from the JSON body, or the bearer header when the body has none.
fn presented_refresh_token(req: &HttpRequest, body: Option<web::Json<RefreshReq>>) -> Option<String> {
    body.and_then(|b| b.into_inner().refresh_token)
        .filter(|t| !t.trim().is_empty())
        .or_else(|| bearer_token(req).map(str::to_string))
}

/// Rotates the refresh token: the presented one is revoked and a new pair issued.
pub async fn refresh_token(
    req: HttpRequest,
    body: Option<web::Json<RefreshReq>>,
    repo: web::Data<UserRepo>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(token) = presented_refresh_token(&req, body) else {
        return unauthorized("No refresh token");
    };

    let claims = match verify_token(&token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return unauthorized("Invalid refresh token"),
    };

    match repo.revoke_refresh_token(&claims.jti).await {
        Ok(true) => {}
        Ok(false) => {
            info!(user_id = claims.sub, "Refresh token reused or revoked");
            return unauthorized("Invalid refresh token");
        }
        Err(e) => {
            error!(error = %e, "Failed to revoke refresh token");
            return internal_error();
        }
    }

    match issue_pair(&repo, &config, claims.sub, &claims.usr).await {
        Ok(pair) => HttpResponse::Ok().json(pair),
        Err(resp) => resp,
    }
}

/// Always 204, whether or not the token was known.
pub async fn logout(
    req: HttpRequest,
    body: Option<web::Json<RefreshReq>>,
    repo: web::Data<UserRepo>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(token) = presented_refresh_token(&req, body) else {
        return HttpResponse::NoContent().finish();
    };

    if let Ok(claims) = verify_token(&token, &config.jwt_secret)
        && claims.token_type == TokenType::Refresh
        && let Err(e) = repo.revoke_refresh_token(&claims.jti).await
    {
        error!(error = %e, "Failed to revoke refresh token on logout");
    }

    HttpResponse::NoContent().finish()
}

#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Current user", body = MeResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser, repo: web::Data<UserRepo>) -> impl Responder {
    match repo.find_by_id(auth.user_id).await {
        Ok(Some(u)) => HttpResponse::Ok().json(MeResponse {
            id: u.id,
            username: u.username,
            position: u.position,
            created_at: u.created_at,
        }),
        Ok(None) => unauthorized("User not found"),
        Err(e) => {
            error!(error = %e, user_id = auth.user_id, "Failed to load user");
            internal_error()
        }
    }
}
