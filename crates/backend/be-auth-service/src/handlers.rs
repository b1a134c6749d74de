use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use be_authz::AuthUser;
use be_remote_db::{DbError, ProfilePatch, User};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    AppState,
    error::AuthError,
    password::{check_password_rules, hash_password, verify_password},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: &'static str,
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub message: &'static str,
    pub token: String,
    pub user_id: i64,
}

fn normalize_email(raw: &str) -> Result<String, AuthError> {
    let email = raw.trim().to_lowercase();
    let plausible = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !plausible {
        return Err(AuthError::InvalidInput("A valid email is required".into()));
    }
    Ok(email)
}

// ---------------------------------------------------------------------------
// POST /api/register
// ---------------------------------------------------------------------------

pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), AuthError> {
    let Json(body) = payload?;

    let email = normalize_email(&body.email)?;
    let full_name = body.full_name.trim();
    if full_name.is_empty() {
        return Err(AuthError::InvalidInput("fullName is required".into()));
    }
    check_password_rules(&body.password)?;

    let password_hash = hash_password(&body.password)?;
    let user = state
        .db
        .create_user()
        .email(&email)
        .full_name(full_name)
        .password_hash(&password_hash)
        .call()
        .await?;

    info!(user_id = user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully",
            user_id: user.id,
        }),
    ))
}

// ---------------------------------------------------------------------------
// POST /api/login
// ---------------------------------------------------------------------------

pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AuthError> {
    let Json(body) = payload?;

    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(AuthError::InvalidInput(
            "email and password are required".into(),
        ));
    }
    let email = body.email.trim().to_lowercase();

    let credentials = match state.db.get_credentials_by_email().email(&email).call().await {
        Ok(credentials) => credentials,
        Err(DbError::NotFound { .. }) => {
            warn!("Login attempt for unknown email");
            return Err(AuthError::InvalidCredentials);
        }
        Err(e) => return Err(e.into()),
    };

    if !verify_password(&body.password, &credentials.password_hash)? {
        warn!(user_id = credentials.id, "Login attempt with wrong password");
        return Err(AuthError::InvalidCredentials);
    }

    let token = state
        .jwt_config
        .issue_token(credentials.id, &credentials.email)?;

    Ok(Json(LoginResponse {
        message: "Login successful",
        token,
        user_id: credentials.id,
    }))
}

// ---------------------------------------------------------------------------
// GET / PUT /api/profile
// ---------------------------------------------------------------------------

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<User>, AuthError> {
    match state.db.get_user().user_id(user.user_id()).call().await {
        Ok(profile) => Ok(Json(profile)),
        Err(DbError::NotFound { .. }) => Err(AuthError::UserNotFound),
        Err(e) => Err(e.into()),
    }
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    payload: Result<Json<ProfilePatch>, JsonRejection>,
) -> Result<Json<User>, AuthError> {
    let Json(mut patch) = payload?;

    if let Some(email) = patch.email.as_deref() {
        patch.email = Some(normalize_email(email)?);
    }
    if let Some(name) = patch.full_name.as_deref() {
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::InvalidInput("fullName cannot be empty".into()));
        }
        patch.full_name = Some(name.to_string());
    }

    match state
        .db
        .update_profile()
        .user_id(user.user_id())
        .patch(&patch)
        .call()
        .await
    {
        Ok(profile) => {
            info!(user_id = profile.id, "Profile updated");
            Ok(Json(profile))
        }
        Err(DbError::NotFound { .. }) => Err(AuthError::UserNotFound),
        Err(e) => Err(e.into()),
    }
}
