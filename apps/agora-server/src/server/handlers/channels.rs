use agora_core::{validate_description, ChannelId, ChannelTitle, CommunityId};
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};

use super::parse_id;
use crate::server::{
    auth::authenticate,
    core::AppState,
    domain::{
        add_channel as create_channel, delete_channel as soft_delete, get_channel as fetch,
        get_community_channels as channels_of, update_channel as apply_changes, ChannelChanges,
        NewChannel,
    },
    errors::{AuthFailure, Outcome},
    types::{
        ChannelPath, ChannelResponse, CommunityPath, CreateChannelRequest, UpdateChannelRequest,
    },
};

fn channel_title(raw: String) -> Result<ChannelTitle, AuthFailure> {
    ChannelTitle::try_from(raw).map_err(|_| AuthFailure::InvalidRequest)
}

fn description(raw: Option<String>) -> Result<Option<String>, AuthFailure> {
    if let Some(text) = &raw {
        validate_description(text).map_err(|_| AuthFailure::InvalidRequest)?;
    }
    Ok(raw)
}

pub(crate) async fn get_community_channels(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<CommunityPath>,
) -> Result<Outcome<Vec<ChannelResponse>>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    let community_id: CommunityId = parse_id(path.community_id)?;
    Ok(channels_of(&state, auth, community_id).await)
}

pub(crate) async fn add_channel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<CommunityPath>,
    Json(payload): Json<CreateChannelRequest>,
) -> Result<Outcome<ChannelResponse>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    let community_id: CommunityId = parse_id(path.community_id)?;
    let command = NewChannel {
        title: channel_title(payload.title)?,
        description: description(payload.description)?.unwrap_or_default(),
        kind: payload.kind,
    };
    Ok(create_channel(&state, auth, community_id, command).await)
}

pub(crate) async fn get_channel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<ChannelPath>,
) -> Result<Outcome<ChannelResponse>, AuthFailure> {
    authenticate(&state, &headers).await?;
    let channel_id: ChannelId = parse_id(path.channel_id)?;
    Ok(fetch(&state, channel_id).await)
}

pub(crate) async fn update_channel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<ChannelPath>,
    Json(payload): Json<UpdateChannelRequest>,
) -> Result<Outcome<ChannelResponse>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    let channel_id: ChannelId = parse_id(path.channel_id)?;
    if let Some(kind) = payload.kind {
        tracing::debug!(
            event = "channel.update",
            channel_id = %channel_id,
            requested_kind = kind.as_str(),
            "ignoring channel kind change"
        );
    }
    let changes = ChannelChanges {
        title: payload.title.map(channel_title).transpose()?,
        description: description(payload.description)?,
    };
    Ok(apply_changes(&state, auth, channel_id, changes).await)
}

pub(crate) async fn delete_channel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<ChannelPath>,
) -> Result<Outcome<()>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    let channel_id: ChannelId = parse_id(path.channel_id)?;
    Ok(soft_delete(&state, auth, channel_id).await)
}
