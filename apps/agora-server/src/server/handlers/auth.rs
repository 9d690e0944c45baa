use agora_core::Username;
use axum::{extract::State, Json};

use crate::server::{
    core::AppState,
    domain::{login as login_user, register as register_user},
    errors::{AuthFailure, Outcome},
    types::{AuthResponse, LoginRequest, RegisterRequest, UserResponse},
};

const MIN_PASSWORD_CHARS: usize = 8;
const MAX_PASSWORD_CHARS: usize = 128;
const MAX_EMAIL_CHARS: usize = 254;

fn validate_password(password: &str) -> Result<(), AuthFailure> {
    let chars = password.chars().count();
    if (MIN_PASSWORD_CHARS..=MAX_PASSWORD_CHARS).contains(&chars) {
        Ok(())
    } else {
        Err(AuthFailure::InvalidRequest)
    }
}

fn validate_email(email: &str) -> Result<(), AuthFailure> {
    let trimmed = email.trim();
    let well_formed = trimmed.chars().count() <= MAX_EMAIL_CHARS
        && trimmed
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if well_formed {
        Ok(())
    } else {
        Err(AuthFailure::InvalidRequest)
    }
}

pub(crate) async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Outcome<UserResponse>, AuthFailure> {
    let username = Username::try_from(payload.username).map_err(|_| AuthFailure::InvalidRequest)?;
    validate_email(&payload.email)?;
    validate_password(&payload.password)?;
    Ok(register_user(&state, username, payload.email.trim().to_owned(), &payload.password).await)
}

pub(crate) async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthFailure> {
    let username = Username::try_from(payload.username).map_err(|_| AuthFailure::Unauthorized)?;
    if validate_password(&payload.password).is_err() {
        return Err(AuthFailure::Unauthorized);
    }
    login_user(&state, username.as_str(), &payload.password)
        .await
        .map(Json)
}
