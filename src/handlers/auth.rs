// src/handlers/auth.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::{
    config::Config,
    error::AppError,
    models::user::{CreateUserRequest, LoginRequest},
    store::DynStore,
    utils::{
        extract::AppJson,
        hash::{hash_password, verify_password},
        jwt::sign_jwt,
    },
    validation::{check, ensure_valid},
};

/// Registers a new user.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(store): State<DynStore>,
    AppJson(payload): AppJson<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    ensure_valid(check(&payload))?;

    let hashed_password = hash_password(&payload.password)?;
    let user = store.create_user(&payload.username, &hashed_password).await?;

    tracing::info!(user_id = user.id, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// Authenticates a user and returns a JWT token.
///
/// Unknown usernames and wrong passwords get the same answer.
pub async fn login(
    State(store): State<DynStore>,
    State(config): State<Config>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    ensure_valid(check(&payload))?;

    let user = store
        .find_user_by_username(&payload.username)
        .await?
        .ok_or(AppError::AuthError("Invalid username or password".to_string()))?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(AppError::AuthError("Invalid username or password".to_string()));
    }

    let token = sign_jwt(user.id, &config.jwt_secret, config.jwt_expiration)?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "expires_in": config.jwt_expiration
    })))
}
