use agora_core::{FriendshipId, UserId};
use axum::{
    extract::{Path, State},
    http::HeaderMap,
};

use super::parse_id;
use crate::server::{
    auth::authenticate,
    core::AppState,
    domain::{
        accept_friend as accept, add_friend as invite, list_friends as friends_of,
        mutual_friends as mutual, remove_friend as unfriend,
    },
    errors::{AuthFailure, Outcome},
    types::{FriendRequestPath, FriendResponse, UserPath, UserResponse},
};

pub(crate) async fn list_friends(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Outcome<Vec<FriendResponse>>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    Ok(friends_of(&state, auth).await)
}

pub(crate) async fn add_friend(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<UserPath>,
) -> Result<Outcome<FriendResponse>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    let friend_id: UserId = parse_id(path.user_id)?;
    Ok(invite(&state, auth, friend_id).await)
}

pub(crate) async fn accept_friend(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<FriendRequestPath>,
) -> Result<Outcome<FriendResponse>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    let request_id: FriendshipId = parse_id(path.request_id)?;
    Ok(accept(&state, auth, request_id).await)
}

pub(crate) async fn remove_friend(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<UserPath>,
) -> Result<Outcome<()>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    let friend_id: UserId = parse_id(path.user_id)?;
    Ok(unfriend(&state, auth, friend_id).await)
}

pub(crate) async fn mutual_friends(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<UserPath>,
) -> Result<Outcome<Vec<UserResponse>>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    let other_id: UserId = parse_id(path.user_id)?;
    Ok(mutual(&state, auth, other_id).await)
}
