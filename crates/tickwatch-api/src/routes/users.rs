//! User registration and login.
//!
//! - `POST /api/users` - register with email + password
//! - `POST /api/login` - credential check returning the user id

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::password;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
}

/// POST /api/users - register a new user
async fn register(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let email = request.email.trim();
    if email.is_empty() || request.password.is_empty() {
        return Err(ApiError::BadRequest(String::from(
            "email and password must not be empty",
        )));
    }

    let hash = password::hash_password(&request.password)
        .map_err(|error| ApiError::Internal(error.to_string()))?;
    let user = state.store.create_user(email, &hash)?;
    info!(user_id = %user.id, "registered user");

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            id: user.id,
            email: user.email,
        }),
    ))
}

/// POST /api/login - verify credentials
async fn login(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let email = request.email.trim();
    if email.is_empty() || request.password.is_empty() {
        return Err(ApiError::BadRequest(String::from(
            "email and password must not be empty",
        )));
    }

    // Same response for unknown email and wrong password.
    let invalid = || ApiError::Unauthorized(String::from("invalid email or password"));
    let user = state.store.find_user_by_email(email)?.ok_or_else(invalid)?;
    password::verify_password(&request.password, &user.password_hash).map_err(|_| invalid())?;

    Ok(Json(UserResponse {
        id: user.id,
        email: user.email,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/login", post(login))
}
