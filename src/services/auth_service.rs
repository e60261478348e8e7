use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use password_hash::rand_core::OsRng;
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    dto::auth::{
        AuthResponse, Claims, ForgotPasswordRequest, LoginRequest, RegisterRequest,
        ResetCodeIssued, ResetPasswordRequest, VerifyResetRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Role, User},
    response::{ApiResponse, Meta},
    services::password_reset::CodeCheck,
    state::AppState,
};

pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn issue_token(user: &User, secret: &str, ttl_hours: i64) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(ttl_hours))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role.clone(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn decode_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::unauthorized("Invalid or expired token"))
}

fn auth_response(state: &AppState, user: User) -> AppResult<AuthResponse> {
    let token = issue_token(&user, &state.config.jwt_secret, state.config.jwt_ttl_hours)?;
    Ok(AuthResponse { token, user })
}

async fn find_user_by_email(state: &AppState, email: &str) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(&state.pool)
        .await?;
    Ok(user)
}

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    payload.validate()?;
    let email = normalize_email(&payload.email);

    if find_user_by_email(state, &email).await?.is_some() {
        return Err(AppError::Conflict("Email is already registered".to_string()));
    }

    let name = payload
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
    let password_hash = hash_password(&payload.password)?;

    let user: User = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&name)
    .bind(&email)
    .bind(password_hash)
    .bind(Role::User.as_str())
    .fetch_one(&state.pool)
    .await
    .map_err(|err| match err.as_database_error() {
        Some(db) if db.is_unique_violation() => {
            AppError::Conflict("Email is already registered".to_string())
        }
        _ => AppError::DbError(err),
    })?;

    audit::record(
        &state.orm,
        Some(user.id),
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "User created",
        auth_response(state, user)?,
        Some(Meta::empty()),
    ))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    payload.validate()?;
    let email = normalize_email(&payload.email);

    let user = match find_user_by_email(state, &email).await? {
        Some(u) => u,
        None => return Err(AppError::unauthorized("Invalid email or password")),
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        return Err(AppError::unauthorized("Invalid email or password"));
    }

    audit::record(
        &state.orm,
        Some(user.id),
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged in",
        auth_response(state, user)?,
        Some(Meta::empty()),
    ))
}

pub async fn current_user(state: &AppState, auth: &AuthUser) -> AppResult<ApiResponse<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(auth.user_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Current user", user, Some(Meta::empty())))
}

pub async fn request_password_reset(
    state: &AppState,
    payload: ForgotPasswordRequest,
) -> AppResult<ApiResponse<ResetCodeIssued>> {
    payload.validate()?;
    let email = normalize_email(&payload.email);

    if find_user_by_email(state, &email).await?.is_none() {
        return Err(AppError::NotFound);
    }

    let code = state.reset_codes.issue(&email);
    // No mail transport: the code is only delivered through the log or the response.
    tracing::info!(%email, %code, "password reset code issued");

    let data = ResetCodeIssued {
        expires_in_secs: state.reset_codes.ttl().as_secs(),
        code: state.config.expose_reset_code.then_some(code),
    };
    Ok(ApiResponse::success("Verification code issued", data, Some(Meta::empty())))
}

fn require_valid_code(state: &AppState, email: &str, code: &str) -> AppResult<()> {
    match state.reset_codes.check(email, code) {
        CodeCheck::Valid => Ok(()),
        other => Err(AppError::bad_request(other.message())),
    }
}

pub async fn verify_reset_code(
    state: &AppState,
    payload: VerifyResetRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    payload.validate()?;
    require_valid_code(state, &normalize_email(&payload.email), &payload.code)?;
    Ok(ApiResponse::message(CodeCheck::Valid.message()))
}

pub async fn reset_password(
    state: &AppState,
    payload: ResetPasswordRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    payload.validate()?;
    let email = normalize_email(&payload.email);
    require_valid_code(state, &email, &payload.code)?;

    let password_hash = hash_password(&payload.new_password)?;
    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET password_hash = $1 WHERE email = $2 RETURNING *",
    )
    .bind(password_hash)
    .bind(&email)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::NotFound)?;

    state.reset_codes.consume(&email);

    audit::record(
        &state.orm,
        Some(user.id),
        "password_reset",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Password updated",
        auth_response(state, user)?,
        Some(Meta::empty()),
    ))
}
