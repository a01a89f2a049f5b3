use crate::{
    auth::{
        auth::AuthUser,
        jwt::generate_access_token,
        password::{hash_password, verify_password},
    },
    config::Config,
    error::ApiError,
    model::role::Role,
    models::{LoginReqDto, UserSql},
    response,
};
use actix_web::{Responder, web};
use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: usize,
    pub email: String,
    pub role: String,
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 400, description = "Email or password missing"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(email = %user.email)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<impl Responder, ApiError> {
    info!("Login request received");

    if user.email.trim().is_empty() || user.password.is_empty() {
        return Err(ApiError::validation("Email and password are required"));
    }

    let db_user = sqlx::query_as::<_, UserSql>(
        r#"
        SELECT id, email, password, role, is_active
        FROM users
        WHERE email = ?
        "#,
    )
    .bind(user.email.trim().to_lowercase())
    .fetch_optional(pool.get_ref())
    .await?;

    let Some(db_user) = db_user.filter(|u| u.is_active) else {
        info!("Invalid credentials: user not found or inactive");
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    debug!(user_id = db_user.id, "Password verified, issuing token");

    let access_token = generate_access_token(
        db_user.id,
        db_user.email.clone(),
        &db_user.role,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(|e| ApiError::Internal(format!("Failed to issue token: {e}")))?;

    // last_login_at is informational, never fail the login over it
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    info!("Login successful");

    Ok(response::ok(LoginResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: config.access_token_ttl,
        email: db_user.email,
        role: db_user.role,
    }))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "The authenticated caller"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser) -> impl Responder {
    response::ok(auth)
}

/// Creates the configured default admin if no user owns that email yet.
pub async fn seed_default_admin(pool: &MySqlPool, config: &Config) -> Result<()> {
    let (Some(email), Some(password)) = (
        config.default_admin_email.as_deref(),
        config.default_admin_password.as_deref(),
    ) else {
        debug!("No default admin configured");
        return Ok(());
    };
    let email = email.trim().to_lowercase();

    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(&email)
        .fetch_one(pool)
        .await
        .context("checking for default admin")?;

    if existing > 0 {
        return Ok(());
    }

    let hashed = hash_password(password).map_err(|e| anyhow::anyhow!("hashing admin password: {e}"))?;

    sqlx::query("INSERT INTO users (email, password, role, is_active) VALUES (?, ?, ?, TRUE)")
        .bind(&email)
        .bind(hashed)
        .bind(Role::SuperAdmin.as_ref())
        .execute(pool)
        .await
        .context("inserting default admin")?;

    info!(email = %email, "Default admin created");
    Ok(())
}
