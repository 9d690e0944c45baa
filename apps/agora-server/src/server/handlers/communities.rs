use agora_core::{
    validate_description, CommunityId, CommunityName, CommunityVisibility, UserId,
};
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
    domain::{
        artwork_file, ban_member as ban, create_community as create, get_community as fetch,
        join_community as join, leave_community as leave, list_members as members,
        list_my_communities as mine, unban_member as unban, update_community as update, Artwork,
        CommunityChanges, NewCommunity,
    },
    errors::{AuthFailure, Outcome},
    types::{
        CommunityPath, CommunityResponse, CreateCommunityRequest, MemberPath, MemberResponse,
        UpdateCommunityRequest,
    },
};

fn community_name(raw: String) -> Result<CommunityName, AuthFailure> {
    CommunityName::try_from(raw).map_err(|_| AuthFailure::InvalidRequest)
}

fn description(raw: Option<String>) -> Result<Option<String>, AuthFailure> {
    if let Some(text) = &raw {
        validate_description(text).map_err(|_| AuthFailure::InvalidRequest)?;
    }
    Ok(raw)
}

pub(crate) async fn create_community(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateCommunityRequest>,
) -> Result<Outcome<CommunityResponse>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    let command = NewCommunity {
        name: community_name(payload.name)?,
        description: description(payload.description)?.unwrap_or_default(),
        visibility: payload.visibility.unwrap_or(CommunityVisibility::Public),
        image: decode_upload(payload.image_base64)?,
        banner: decode_upload(payload.banner_base64)?,
    };
    Ok(create(&state, auth, command).await)
}

pub(crate) async fn list_my_communities(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Outcome<Vec<CommunityResponse>>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    Ok(mine(&state, auth).await)
}

pub(crate) async fn get_community(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<CommunityPath>,
) -> Result<Outcome<CommunityResponse>, AuthFailure> {
    authenticate(&state, &headers).await?;
    let community_id: CommunityId = parse_id(path.community_id)?;
    Ok(fetch(&state, community_id).await)
}

pub(crate) async fn update_community(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<CommunityPath>,
    Json(payload): Json<UpdateCommunityRequest>,
) -> Result<Outcome<CommunityResponse>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    let community_id: CommunityId = parse_id(path.community_id)?;
    let changes = CommunityChanges {
        name: payload.name.map(community_name).transpose()?,
        description: description(payload.description)?,
        visibility: payload.visibility,
        image: decode_upload(payload.image_base64)?,
        banner: decode_upload(payload.banner_base64)?,
    };
    Ok(update(&state, auth, community_id, changes).await)
}

pub(crate) async fn join_community(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<CommunityPath>,
) -> Result<Outcome<MemberResponse>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    let community_id: CommunityId = parse_id(path.community_id)?;
    Ok(join(&state, auth, community_id).await)
}

pub(crate) async fn leave_community(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<CommunityPath>,
) -> Result<Outcome<()>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    let community_id: CommunityId = parse_id(path.community_id)?;
    Ok(leave(&state, auth, community_id).await)
}

pub(crate) async fn list_members(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<CommunityPath>,
) -> Result<Outcome<Vec<MemberResponse>>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    let community_id: CommunityId = parse_id(path.community_id)?;
    Ok(members(&state, auth, community_id).await)
}

pub(crate) async fn ban_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<MemberPath>,
) -> Result<Outcome<MemberResponse>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    let community_id: CommunityId = parse_id(path.community_id)?;
    let member_id: UserId = parse_id(path.member_id)?;
    Ok(ban(&state, auth, community_id, member_id).await)
}

pub(crate) async fn unban_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<MemberPath>,
) -> Result<Outcome<MemberResponse>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    let community_id: CommunityId = parse_id(path.community_id)?;
    let member_id: UserId = parse_id(path.member_id)?;
    Ok(unban(&state, auth, community_id, member_id).await)
}

pub(crate) async fn get_community_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<CommunityPath>,
) -> Result<Response, AuthFailure> {
    authenticate(&state, &headers).await?;
    let community_id: CommunityId = parse_id(path.community_id)?;
    Ok(file_response(
        "community.image",
        artwork_file(&state, community_id, Artwork::Image).await,
    ))
}

pub(crate) async fn get_community_banner(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<CommunityPath>,
) -> Result<Response, AuthFailure> {
    authenticate(&state, &headers).await?;
    let community_id: CommunityId = parse_id(path.community_id)?;
    Ok(file_response(
        "community.banner",
        artwork_file(&state, community_id, Artwork::Banner).await,
    ))
}
