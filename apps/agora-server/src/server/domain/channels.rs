use agora_core::{ChannelId, ChannelKind, ChannelStatus, ChannelTitle, CommunityId};

use super::{load_community, member_context, require_active_community, update_with_retry};
use crate::server::{
    core::{now_unix, AppState, AuthContext},
    errors::{Outcome, ServiceError, ServiceResult},
    records::ChannelRecord,
    store::{Filter, FindOptions, SortDirection},
    types::ChannelResponse,
};

#[derive(Debug)]
pub(crate) struct NewChannel {
    pub(crate) title: ChannelTitle,
    pub(crate) description: String,
    pub(crate) kind: ChannelKind,
}

/// Editable channel fields. The kind is fixed at creation.
#[derive(Debug, Default)]
pub(crate) struct ChannelChanges {
    pub(crate) title: Option<ChannelTitle>,
    pub(crate) description: Option<String>,
}

pub(crate) async fn load_channel(state: &AppState, channel_id: ChannelId) -> ServiceResult<ChannelRecord> {
    state
        .store
        .channels
        .find_one(&Filter::by_id(channel_id))
        .await?
        .ok_or_else(|| ServiceError::not_found("Channel not found"))
}

fn require_not_deleted(channel: &ChannelRecord) -> ServiceResult<()> {
    if channel.status == ChannelStatus::Deleted {
        Err(ServiceError::invalid_state("Channel is deleted"))
    } else {
        Ok(())
    }
}

fn live_channels(community_id: CommunityId) -> Filter {
    Filter::eq("community_id", community_id) & Filter::ne("status", ChannelStatus::Deleted)
}

pub(crate) async fn add_channel(
    state: &AppState,
    auth: AuthContext,
    community_id: CommunityId,
    command: NewChannel,
) -> Outcome<ChannelResponse> {
    Outcome::settle(
        "channel.add",
        "Channel created",
        add_channel_inner(state, auth, community_id, command).await,
    )
}

async fn add_channel_inner(
    state: &AppState,
    auth: AuthContext,
    community_id: CommunityId,
    command: NewChannel,
) -> ServiceResult<ChannelResponse> {
    let community = load_community(state, community_id).await?;
    require_active_community(&community)?;
    let context = member_context(state, community, auth.user_id).await?;

    let live = state
        .store
        .channels
        .count(&live_channels(community_id))
        .await?;
    let limit = state.runtime.max_channels_per_community;
    if live >= u64::try_from(limit).unwrap_or(u64::MAX) {
        return Err(ServiceError::invalid_state(format!(
            "Community has reached the quota of {limit} channels"
        )));
    }
    context.require(command.kind.manage_permission())?;

    let last = state
        .store
        .channels
        .find_many(
            &Filter::eq("community_id", community_id),
            &FindOptions::default()
                .sorted_by("index", SortDirection::Descending)
                .limit(1),
        )
        .await?;
    let index = last.first().map_or(0, |channel| channel.index.saturating_add(1));

    let now = now_unix();
    let channel = state
        .store
        .channels
        .add(ChannelRecord {
            id: ChannelId::new(),
            community_id,
            index,
            title: command.title.into_inner(),
            description: command.description,
            kind: command.kind,
            status: ChannelStatus::Active,
            created_at_unix: now,
            updated_at_unix: now,
            version: 0,
        })
        .await?;
    tracing::info!(
        event = "channel.add",
        community_id = %community_id,
        channel_id = %channel.id,
        kind = channel.kind.as_str()
    );
    Ok(ChannelResponse::from(&channel))
}

/// Loads a live channel and checks the caller may manage channels of its kind.
async fn managed_channel(
    state: &AppState,
    auth: AuthContext,
    channel_id: ChannelId,
) -> ServiceResult<ChannelRecord> {
    let channel = load_channel(state, channel_id).await?;
    require_not_deleted(&channel)?;
    let community = load_community(state, channel.community_id).await?;
    require_active_community(&community)?;
    let context = member_context(state, community, auth.user_id).await?;
    context.require(channel.kind.manage_permission())?;
    Ok(channel)
}

pub(crate) async fn update_channel(
    state: &AppState,
    auth: AuthContext,
    channel_id: ChannelId,
    changes: ChannelChanges,
) -> Outcome<ChannelResponse> {
    let result: ServiceResult<_> = async {
        managed_channel(state, auth, channel_id).await?;
        let channel = update_with_retry(
            &state.store.channels,
            &Filter::by_id(channel_id),
            "Channel not found",
            |channel: &mut ChannelRecord| {
                require_not_deleted(channel)?;
                if let Some(title) = &changes.title {
                    channel.title = title.as_str().to_owned();
                }
                if let Some(description) = &changes.description {
                    channel.description.clone_from(description);
                }
                channel.updated_at_unix = now_unix();
                Ok(())
            },
        )
        .await?;
        Ok(ChannelResponse::from(&channel))
    }
    .await;
    Outcome::settle("channel.update", "Channel updated", result)
}

pub(crate) async fn delete_channel(
    state: &AppState,
    auth: AuthContext,
    channel_id: ChannelId,
) -> Outcome<()> {
    let result: ServiceResult<_> = async {
        managed_channel(state, auth, channel_id).await?;
        update_with_retry(
            &state.store.channels,
            &Filter::by_id(channel_id),
            "Channel not found",
            |channel: &mut ChannelRecord| {
                require_not_deleted(channel)?;
                channel.status = ChannelStatus::Deleted;
                channel.updated_at_unix = now_unix();
                Ok(())
            },
        )
        .await?;
        Ok(())
    }
    .await;
    Outcome::settle("channel.delete", "Channel deleted", result)
}

pub(crate) async fn get_community_channels(
    state: &AppState,
    auth: AuthContext,
    community_id: CommunityId,
) -> Outcome<Vec<ChannelResponse>> {
    let result: ServiceResult<_> = async {
        let community = load_community(state, community_id).await?;
        member_context(state, community, auth.user_id).await?;
        let channels = state
            .store
            .channels
            .find_many(
                &(Filter::eq("community_id", community_id)
                    & Filter::eq("status", ChannelStatus::Active)),
                &FindOptions::default().sorted_by("index", SortDirection::Ascending),
            )
            .await?;
        Ok(channels.iter().map(ChannelResponse::from).collect())
    }
    .await;
    Outcome::settle("channel.list", "Channels listed", result)
}

pub(crate) async fn get_channel(state: &AppState, channel_id: ChannelId) -> Outcome<ChannelResponse> {
    let result: ServiceResult<_> = async {
        let channel = load_channel(state, channel_id).await?;
        if channel.status == ChannelStatus::Deleted {
            return Err(ServiceError::not_found("Channel not found"));
        }
        Ok(ChannelResponse::from(&channel))
    }
    .await;
    Outcome::settle("channel.get", "Channel found", result)
}
