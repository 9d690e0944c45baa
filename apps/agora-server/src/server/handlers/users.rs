use agora_core::{validate_description, UserId};
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Response,
    Json,
};

use super::{decode_upload, file_response, parse_id};
use crate::server::{
    auth::authenticate,
    core::AppState,
    domain::{avatar_file, get_user as fetch_user, update_user as apply_profile, ProfileChanges},
    errors::{AuthFailure, Outcome},
    types::{UpdateUserRequest, UserPath, UserResponse},
};

pub(crate) async fn get_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<UserPath>,
) -> Result<Outcome<UserResponse>, AuthFailure> {
    authenticate(&state, &headers).await?;
    let user_id: UserId = parse_id(path.user_id)?;
    Ok(fetch_user(&state, user_id).await)
}

pub(crate) async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<UserPath>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Outcome<UserResponse>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    let user_id: UserId = parse_id(path.user_id)?;
    if let Some(bio) = &payload.bio {
        validate_description(bio).map_err(|_| AuthFailure::InvalidRequest)?;
    }
    let changes = ProfileChanges {
        bio: payload.bio,
        avatar: decode_upload(payload.avatar_base64)?,
    };
    Ok(apply_profile(&state, auth, user_id, changes).await)
}

pub(crate) async fn get_user_avatar(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<UserPath>,
) -> Result<Response, AuthFailure> {
    authenticate(&state, &headers).await?;
    let user_id: UserId = parse_id(path.user_id)?;
    Ok(file_response("user.avatar", avatar_file(&state, user_id).await))
}
