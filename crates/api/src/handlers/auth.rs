use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use simsvc_domain::User;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    if payload.password.is_empty() {
        return Err(ApiError::BadRequest("password must not be empty".into()));
    }
    let user = state
        .users
        .register(payload.email, &payload.password, payload.full_name)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = state
        .users
        .authenticate(&payload.email, &payload.password)
        .await?;
    let access_token = state.users.create_access_token(&user)?;
    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer",
        expires_in: state.users.token_ttl_secs(),
    }))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}
