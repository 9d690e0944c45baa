use agora_core::{
    ChannelId, ChannelKind, ChannelStatus, MessageId, MessageText, Permission,
};
use ulid::Ulid;

use super::{
    channels::load_channel, load_active_user, load_community, member_context,
    require_active_community,
};
use crate::server::{
    core::{now_unix_ms, AppState, AuthContext},
    errors::{Outcome, ServiceError, ServiceResult},
    records::CommunityMessageRecord,
    store::{Filter, FindOptions, SortDirection},
    types::MessageResponse,
};

#[derive(Debug)]
pub(crate) struct NewMessage {
    pub(crate) text: MessageText,
    pub(crate) reply_to: Option<MessageId>,
}

/// Backward-only cursor: `before` is an exclusive bound on `created_at_unix_ms`.
///
/// `before_id` narrows the bound to `(before, before_id)` so messages sharing
/// the boundary millisecond are not skipped between pages.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct HistoryPage {
    pub(crate) before: Option<i64>,
    pub(crate) before_id: Option<Ulid>,
    pub(crate) limit: Option<usize>,
}

impl HistoryPage {
    pub(crate) fn effective_limit(self, state: &AppState) -> usize {
        self.limit
            .unwrap_or(state.runtime.default_history_limit)
            .clamp(1, state.runtime.max_history_limit)
    }

    /// Adds the cursor bound to `scope` and returns newest-first options.
    pub(crate) fn query(self, state: &AppState, scope: Filter) -> (Filter, FindOptions) {
        let filter = match (self.before, self.before_id) {
            (Some(before), Some(before_id)) => {
                scope
                    & (Filter::lt("created_at_unix_ms", before)
                        | (Filter::eq("created_at_unix_ms", before) & Filter::lt("id", before_id)))
            }
            (Some(before), None) => scope & Filter::lt("created_at_unix_ms", before),
            (None, _) => scope,
        };
        let options = FindOptions::default()
            .sorted_by("created_at_unix_ms", SortDirection::Descending)
            .sorted_by("id", SortDirection::Descending)
            .limit(self.effective_limit(state));
        (filter, options)
    }
}

fn require_postable(channel_kind: ChannelKind, channel_status: ChannelStatus) -> ServiceResult<()> {
    if channel_kind != ChannelKind::Text {
        return Err(ServiceError::invalid_state(
            "Messages can only be posted in text channels",
        ));
    }
    if channel_status != ChannelStatus::Active {
        return Err(ServiceError::invalid_state("Channel is not active"));
    }
    Ok(())
}

pub(crate) async fn add_message(
    state: &AppState,
    auth: AuthContext,
    channel_id: ChannelId,
    command: NewMessage,
) -> Outcome<MessageResponse> {
    Outcome::settle(
        "message.add",
        "Message sent",
        add_message_inner(state, auth, channel_id, command).await,
    )
}

async fn add_message_inner(
    state: &AppState,
    auth: AuthContext,
    channel_id: ChannelId,
    command: NewMessage,
) -> ServiceResult<MessageResponse> {
    let channel = load_channel(state, channel_id).await?;
    let community = load_community(state, channel.community_id).await?;
    require_active_community(&community)?;
    require_postable(channel.kind, channel.status)?;
    load_active_user(state, auth.user_id).await?;
    let context = member_context(state, community, auth.user_id).await?;
    context.require(Permission::SendMessage)?;

    if let Some(reply_to) = command.reply_to {
        let exists = state
            .store
            .community_messages
            .exists(&(Filter::by_id(reply_to) & Filter::eq("channel_id", channel_id)))
            .await?;
        if !exists {
            return Err(ServiceError::not_found("Replied message not found"));
        }
    }

    let now = now_unix_ms();
    let message = state
        .store
        .community_messages
        .add(CommunityMessageRecord {
            id: MessageId::new(),
            community_id: channel.community_id,
            channel_id,
            sender_id: auth.user_id,
            text: command.text.into_inner(),
            reply_to: command.reply_to,
            created_at_unix_ms: now,
            updated_at_unix_ms: now,
            version: 0,
        })
        .await?;
    Ok(MessageResponse::from(&message))
}

pub(crate) async fn remove_message(
    state: &AppState,
    auth: AuthContext,
    message_id: MessageId,
) -> Outcome<()> {
    Outcome::settle(
        "message.remove",
        "Message removed",
        remove_message_inner(state, auth, message_id).await,
    )
}

async fn remove_message_inner(
    state: &AppState,
    auth: AuthContext,
    message_id: MessageId,
) -> ServiceResult<()> {
    let message = state
        .store
        .community_messages
        .find_one(&Filter::by_id(message_id))
        .await?
        .ok_or_else(|| ServiceError::not_found("Message not found"))?;
    let channel = load_channel(state, message.channel_id).await?;
    let community = load_community(state, channel.community_id).await?;
    require_active_community(&community)?;
    if channel.status != ChannelStatus::Active {
        return Err(ServiceError::invalid_state("Channel is not active"));
    }
    let context = member_context(state, community, auth.user_id).await?;
    if message.sender_id != auth.user_id {
        context.require(Permission::RemoveMessages)?;
    }

    state
        .store
        .community_messages
        .remove(&Filter::by_id(message_id))
        .await?;
    tracing::info!(
        event = "message.remove",
        message_id = %message_id,
        channel_id = %channel.id,
        by_sender = message.sender_id == auth.user_id
    );
    Ok(())
}

pub(crate) async fn get_channel_messages(
    state: &AppState,
    auth: AuthContext,
    channel_id: ChannelId,
    page: HistoryPage,
) -> Outcome<Vec<MessageResponse>> {
    let result: ServiceResult<_> = async {
        let channel = load_channel(state, channel_id).await?;
        if channel.status == ChannelStatus::Deleted {
            return Err(ServiceError::not_found("Channel not found"));
        }
        let community = load_community(state, channel.community_id).await?;
        member_context(state, community, auth.user_id).await?;

        let (filter, options) = page.query(state, Filter::eq("channel_id", channel_id));
        let messages = state
            .store
            .community_messages
            .find_many(&filter, &options)
            .await?;
        Ok(messages.iter().map(MessageResponse::from).collect())
    }
    .await;
    Outcome::settle("message.history", "Messages listed", result)
}
