use axum::{extract::State, http::StatusCode, Json};
use shared_types::{
    AppError, LoginRequest, Token, UserPublic, UserSignupRequest, UserUpdateMeRequest,
};
use sqlx::{Pool, Postgres};

use crate::auth::extractors::AuthRequired;
use crate::auth::{jwt, password};
use crate::error_convert::ValidateRequest;
use crate::repo;

// ---------------------------------------------------------------------------
// POST /api/v1/login
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Bearer token", body = Token),
        (status = 401, description = "Invalid credentials", body = AppError)
    ),
    tag = "auth"
)]
pub async fn login(
    State(pool): State<Pool<Postgres>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Token>, AppError> {
    let user = repo::user::find_by_email(&pool, &body.email)
        .await?
        .ok_or_else(|| AppError::unauthorized("Incorrect email or password"))?;

    let valid = password::verify_password(&body.password, &user.password_hash)
        .map_err(|_| AppError::unauthorized("Incorrect email or password"))?;
    if !valid {
        return Err(AppError::unauthorized("Incorrect email or password"));
    }
    if !user.is_active {
        return Err(AppError::forbidden("Account is deactivated"));
    }

    let token = jwt::create_access_token(user.id, &user.email, user.is_reviewer)
        .map_err(|e| AppError::internal(format!("failed to sign token: {e}")))?;
    Ok(Json(Token::bearer(token)))
}

// ---------------------------------------------------------------------------
// POST /api/v1/users/signup
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/users/signup",
    request_body = UserSignupRequest,
    responses(
        (status = 201, description = "Account created", body = UserPublic),
        (status = 409, description = "Email already registered", body = AppError),
        (status = 422, description = "Validation error", body = AppError)
    ),
    tag = "auth"
)]
pub async fn signup(
    State(pool): State<Pool<Postgres>>,
    Json(body): Json<UserSignupRequest>,
) -> Result<(StatusCode, Json<UserPublic>), AppError> {
    body.validate_request()?;

    let password_hash = password::hash_password(&body.password)
        .map_err(|e| AppError::internal(format!("failed to hash password: {e}")))?;
    let user = repo::user::create(&pool, &body.email, &password_hash, body.full_name.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(UserPublic::from(user))))
}

// ---------------------------------------------------------------------------
// GET /api/v1/users/me
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses(
        (status = 200, description = "Current user", body = UserPublic),
        (status = 401, description = "Not authenticated", body = AppError)
    ),
    tag = "auth",
    security(("bearer_auth" = []))
)]
pub async fn me(
    State(pool): State<Pool<Postgres>>,
    auth: AuthRequired,
) -> Result<Json<UserPublic>, AppError> {
    let user = repo::user::find_by_id(&pool, auth.0.sub)
        .await?
        .ok_or_else(|| AppError::unauthorized("Account no longer exists"))?;
    Ok(Json(UserPublic::from(user)))
}

// ---------------------------------------------------------------------------
// PATCH /api/v1/users/me
// ---------------------------------------------------------------------------

#[utoipa::path(
    patch,
    path = "/api/v1/users/me",
    request_body = UserUpdateMeRequest,
    responses(
        (status = 200, description = "Updated user", body = UserPublic),
        (status = 401, description = "Not authenticated", body = AppError),
        (status = 409, description = "Email already registered", body = AppError)
    ),
    tag = "auth",
    security(("bearer_auth" = []))
)]
pub async fn update_me(
    State(pool): State<Pool<Postgres>>,
    auth: AuthRequired,
    Json(body): Json<UserUpdateMeRequest>,
) -> Result<Json<UserPublic>, AppError> {
    body.validate_request()?;

    let user = repo::user::update_me(
        &pool,
        auth.0.sub,
        body.email.as_deref(),
        body.full_name.as_deref(),
    )
    .await?
    .ok_or_else(|| AppError::unauthorized("Account no longer exists"))?;

    Ok(Json(UserPublic::from(user)))
}
