use actix_web::{HttpRequest, HttpResponse, Responder, web};
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::auth::jwt::{generate_access_token, generate_refresh_token, verify_token};
use crate::auth::password::{
    generate_reset_token, hash_password, hash_reset_token, verify_password,
};
use crate::config::Config;
use crate::model::role::Role;
use crate::model::user::{PublicUser, User};
use crate::models::TokenType;
use crate::utils::email::send_password_reset_email;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

const USER_COLUMNS: &str = "id, name, email, password_hash, role_id, reset_token_hash, reset_token_expires_at, created_at";

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[schema(example = "Jane Doe")]
    pub name: String,
    #[schema(example = "jane@company.com", format = "email")]
    pub email: String,
    pub password: String,
    #[schema(example = "user")]
    pub role: String,
    pub invite_code: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "jane@company.com", format = "email")]
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}

#[derive(Debug, sqlx::FromRow)]
struct RefreshTokenRow {
    id: u64,
    user_id: u64,
    revoked: bool,
}

async fn fetch_user_by_email(pool: &MySqlPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await
}

async fn fetch_user_by_id(pool: &MySqlPool, id: u64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Issue an access/refresh pair and persist the refresh jti for rotation.
async fn issue_tokens(
    pool: &MySqlPool,
    config: &Config,
    user: &User,
) -> Result<(String, String), sqlx::Error> {
    let access_token = generate_access_token(
        user.id,
        user.email.clone(),
        user.name.clone(),
        user.role_id,
        &config.jwt_secret,
        config.access_token_ttl,
    );

    let (refresh_token, refresh_claims) = generate_refresh_token(
        user.id,
        user.email.clone(),
        user.name.clone(),
        user.role_id,
        &config.jwt_secret,
        config.refresh_token_ttl,
    );

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user.id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await?;

    Ok((access_token, refresh_token))
}

fn validate_password(password: &str) -> Option<&'static str> {
    if password.len() < 8 {
        return Some("Password must be at least 8 characters");
    }
    if password.len() > 64 {
        return Some("Password must be at most 64 characters");
    }
    None
}

/// Sign-up endpoint
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = TokenResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Invalid admin invite code"),
        (status = 409, description = "Email already in use")
    ),
    tag = "Auth"
)]
pub async fn signup(
    payload: web::Json<SignupRequest>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let name = payload.name.trim();
    let email = payload.email.trim().to_lowercase();

    if name.len() < 2 {
        return HttpResponse::BadRequest()
            .json(json!({"error": "Name must be at least 2 characters"}));
    }
    if !EMAIL_RE.is_match(&email) {
        return HttpResponse::BadRequest().json(json!({"error": "Enter a valid email"}));
    }
    if let Some(message) = validate_password(&payload.password) {
        return HttpResponse::BadRequest().json(json!({"error": message}));
    }
    let role = match Role::from_name(&payload.role) {
        Some(role) => role,
        None => return HttpResponse::BadRequest().json(json!({"error": "Invalid role"})),
    };

    if role == Role::Admin {
        let Some(required) = config
            .admin_invite_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
        else {
            return HttpResponse::InternalServerError()
                .json(json!({"error": "Admin invite not configured"}));
        };
        if payload.invite_code.as_deref().map(str::trim) != Some(required) {
            return HttpResponse::Forbidden().json(json!({"error": "Invalid admin invite code"}));
        }
    }

    let hashed = hash_password(&payload.password);
    let result = sqlx::query(
        r#"
        INSERT INTO users (name, email, password_hash, role_id)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(name)
    .bind(&email)
    .bind(&hashed)
    .bind(role as u8)
    .execute(pool.get_ref())
    .await;

    let user_id = match result {
        Ok(done) => done.last_insert_id(),
        Err(e) => {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code().as_deref() == Some("23000") {
                    return HttpResponse::Conflict().json(json!({"error": "Email already in use"}));
                }
            }
            error!(error = %e, "Failed to create user");
            return HttpResponse::InternalServerError().json(json!({"error": "Server error"}));
        }
    };

    let user = match fetch_user_by_id(pool.get_ref(), user_id).await {
        Ok(Some(user)) => user,
        _ => {
            error!(user_id, "Created user could not be read back");
            return HttpResponse::InternalServerError().json(json!({"error": "Server error"}));
        }
    };

    match issue_tokens(pool.get_ref(), &config, &user).await {
        Ok((access_token, refresh_token)) => HttpResponse::Created().json(TokenResponse {
            access_token,
            refresh_token,
            user: PublicUser::from_user(&user),
        }),
        Err(e) => {
            error!(error = %e, "Failed to store refresh token");
            HttpResponse::InternalServerError().json(json!({"error": "Server error"}))
        }
    }
}

/// Login endpoint
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = TokenResponse),
        (status = 401, description = "Invalid email or password")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_login", skip(pool, config, payload), fields(email = %payload.email))]
pub async fn login(
    payload: web::Json<LoginRequest>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    info!("Login request received");

    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || payload.password.is_empty() {
        return HttpResponse::BadRequest().json(json!({"error": "Email and password required"}));
    }

    debug!("Fetching user from database");
    let user = match fetch_user_by_email(pool.get_ref(), &email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            info!("Invalid credentials: user not found");
            return HttpResponse::Unauthorized()
                .json(json!({"error": "Invalid email or password"}));
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if verify_password(&payload.password, &user.password_hash).is_err() {
        info!("Invalid credentials: password mismatch");
        return HttpResponse::Unauthorized().json(json!({"error": "Invalid email or password"}));
    }

    match issue_tokens(pool.get_ref(), &config, &user).await {
        Ok((access_token, refresh_token)) => {
            info!("Login successful");
            HttpResponse::Ok().json(TokenResponse {
                access_token,
                refresh_token,
                user: PublicUser::from_user(&user),
            })
        }
        Err(e) => {
            error!(error = %e, "Failed to store refresh token");
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Refresh-token rotation endpoint
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair issued"),
        (status = 401, description = "Invalid or revoked refresh token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let header = match req.headers().get("Authorization") {
        Some(h) => h.to_str().unwrap_or(""),
        None => return HttpResponse::Unauthorized().body("No token"),
    };

    let token = match header.strip_prefix("Bearer ") {
        Some(t) => t,
        None => return HttpResponse::Unauthorized().body("Invalid token"),
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(_) => return HttpResponse::Unauthorized().finish(),
    };

    if claims.token_type != TokenType::Refresh {
        return HttpResponse::Unauthorized().finish();
    }

    let record = match sqlx::query_as::<_, RefreshTokenRow>(
        r#"
        SELECT id, user_id, revoked
        FROM refresh_tokens
        WHERE jti = ?
        "#,
    )
    .bind(&claims.jti)
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(record)) if !record.revoked => record,
        Ok(_) => return HttpResponse::Unauthorized().finish(),
        Err(e) => {
            error!(error = %e, "Failed to look up refresh token");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE id = ?")
        .bind(record.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token");
        return HttpResponse::InternalServerError().finish();
    }

    let user = match fetch_user_by_id(pool.get_ref(), record.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return HttpResponse::Unauthorized().finish(),
        Err(e) => {
            error!(error = %e, "Failed to fetch user for refresh");
            return HttpResponse::InternalServerError().finish();
        }
    };

    match issue_tokens(pool.get_ref(), &config, &user).await {
        Ok((access_token, refresh_token)) => HttpResponse::Ok().json(json!({
            "accessToken": access_token,
            "refreshToken": refresh_token
        })),
        Err(e) => {
            error!(error = %e, "Failed to store rotated refresh token");
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Logout endpoint; revoking an unknown token still succeeds.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Logged out")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let header = match req.headers().get("Authorization") {
        Some(h) => h.to_str().unwrap_or(""),
        None => return HttpResponse::NoContent().finish(),
    };

    let token = match header.strip_prefix("Bearer ") {
        Some(t) => t,
        None => return HttpResponse::NoContent().finish(),
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(_) => return HttpResponse::NoContent().finish(),
    };

    if claims.token_type != TokenType::Refresh {
        return HttpResponse::NoContent().finish();
    }

    let _ = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await;

    HttpResponse::NoContent().finish()
}

/// Password-reset request endpoint
#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset link sent"),
        (status = 404, description = "Email not registered")
    ),
    tag = "Auth"
)]
pub async fn forgot_password(
    payload: web::Json<ForgotPasswordRequest>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let email = payload.email.trim().to_lowercase();
    if !EMAIL_RE.is_match(&email) {
        return HttpResponse::BadRequest().json(json!({"error": "Enter a valid email"}));
    }

    let user = match fetch_user_by_email(pool.get_ref(), &email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return HttpResponse::NotFound().json(json!({"error": "Email not registered"}));
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return HttpResponse::InternalServerError().json(json!({"error": "Server error"}));
        }
    };

    let token = generate_reset_token();
    let expires_at = Utc::now() + Duration::hours(1);
    if let Err(e) = sqlx::query(
        "UPDATE users SET reset_token_hash = ?, reset_token_expires_at = ? WHERE id = ?",
    )
    .bind(hash_reset_token(&token))
    .bind(expires_at)
    .bind(user.id)
    .execute(pool.get_ref())
    .await
    {
        error!(error = %e, "Failed to store reset token");
        return HttpResponse::InternalServerError().json(json!({"error": "Server error"}));
    }

    let reset_url = format!(
        "{}/?resetToken={}",
        config.app_base_url.trim_end_matches('/'),
        token
    );
    // mail is advisory; a failed send never fails the request
    if let Err(e) = send_password_reset_email(&config, &user.email, &reset_url).await {
        error!(error = %e, "Failed to send reset email");
    }

    HttpResponse::Ok().json(json!({"message": "Reset link sent."}))
}

/// Password-reset completion endpoint
#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated"),
        (status = 400, description = "Invalid or expired reset token")
    ),
    tag = "Auth"
)]
pub async fn reset_password(
    payload: web::Json<ResetPasswordRequest>,
    pool: web::Data<MySqlPool>,
) -> impl Responder {
    if payload.token.len() < 20 {
        return HttpResponse::BadRequest().json(json!({"error": "Invalid reset token"}));
    }
    if let Some(message) = validate_password(&payload.password) {
        return HttpResponse::BadRequest().json(json!({"error": message}));
    }

    let token_hash = hash_reset_token(&payload.token);
    let user = match sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE reset_token_hash = ? AND reset_token_expires_at > ?"
    ))
    .bind(&token_hash)
    .bind(Utc::now())
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            return HttpResponse::BadRequest()
                .json(json!({"error": "Invalid or expired reset token"}));
        }
        Err(e) => {
            error!(error = %e, "Database error while resolving reset token");
            return HttpResponse::InternalServerError().json(json!({"error": "Server error"}));
        }
    };

    if let Err(e) = sqlx::query(
        r#"
        UPDATE users
        SET password_hash = ?, reset_token_hash = NULL, reset_token_expires_at = NULL
        WHERE id = ?
        "#,
    )
    .bind(hash_password(&payload.password))
    .bind(user.id)
    .execute(pool.get_ref())
    .await
    {
        error!(error = %e, "Failed to update password");
        return HttpResponse::InternalServerError().json(json!({"error": "Server error"}));
    }

    // every outstanding session dies with the old password
    let _ = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE user_id = ?")
        .bind(user.id)
        .execute(pool.get_ref())
        .await;

    HttpResponse::Ok().json(json!({"message": "Password updated. Please log in."}))
}

/// Current-user endpoint
#[utoipa::path(
    get,
    path = "/api/me",
    responses((status = 200, description = "Current user", body = PublicUser)),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser, pool: web::Data<MySqlPool>) -> impl Responder {
    match fetch_user_by_id(pool.get_ref(), auth.user_id).await {
        Ok(Some(user)) => HttpResponse::Ok().json(json!({"user": PublicUser::from_user(&user)})),
        Ok(None) => HttpResponse::Unauthorized().json(json!({"error": "User not found"})),
        Err(e) => {
            error!(error = %e, "Failed to fetch current user");
            HttpResponse::InternalServerError().json(json!({"error": "Server error"}))
        }
    }
}
