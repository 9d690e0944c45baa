use agora_core::{ChannelId, MessageId, MessageText, UserId};
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use ulid::Ulid;

use super::parse_id;
use crate::server::{
    auth::authenticate,
    core::AppState,
    domain::{
        add_message as post_message, add_private_message as post_private,
        get_channel_messages as channel_history, get_conversation as conversation_history,
        remove_message as drop_message, remove_private_message as drop_private, HistoryPage,
        NewMessage,
    },
    errors::{AuthFailure, Outcome},
    types::{
        ChannelPath, ConversationPath, CreateMessageRequest, HistoryQuery, MessagePath,
        MessageResponse, PrivateMessageResponse,
    },
};

fn new_message(payload: CreateMessageRequest) -> Result<NewMessage, AuthFailure> {
    Ok(NewMessage {
        text: MessageText::try_from(payload.text).map_err(|_| AuthFailure::InvalidRequest)?,
        reply_to: payload.reply_to.map(parse_id::<MessageId>).transpose()?,
    })
}

fn history_page(query: HistoryQuery) -> Result<HistoryPage, AuthFailure> {
    let before_id = query
        .before_id
        .map(|raw| Ulid::from_string(&raw).map_err(|_| AuthFailure::InvalidRequest))
        .transpose()?;
    if before_id.is_some() && query.before.is_none() {
        return Err(AuthFailure::InvalidRequest);
    }
    Ok(HistoryPage {
        before: query.before,
        before_id,
        limit: query.limit,
    })
}

pub(crate) async fn get_channel_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<ChannelPath>,
    Query(query): Query<HistoryQuery>,
) -> Result<Outcome<Vec<MessageResponse>>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    let channel_id: ChannelId = parse_id(path.channel_id)?;
    Ok(channel_history(&state, auth, channel_id, history_page(query)?).await)
}

pub(crate) async fn add_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<ChannelPath>,
    Json(payload): Json<CreateMessageRequest>,
) -> Result<Outcome<MessageResponse>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    let channel_id: ChannelId = parse_id(path.channel_id)?;
    Ok(post_message(&state, auth, channel_id, new_message(payload)?).await)
}

pub(crate) async fn remove_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<MessagePath>,
) -> Result<Outcome<()>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    let message_id: MessageId = parse_id(path.message_id)?;
    Ok(drop_message(&state, auth, message_id).await)
}

pub(crate) async fn get_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<ConversationPath>,
    Query(query): Query<HistoryQuery>,
) -> Result<Outcome<Vec<PrivateMessageResponse>>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    let friend_id: UserId = parse_id(path.friend_id)?;
    Ok(conversation_history(&state, auth, friend_id, history_page(query)?).await)
}

pub(crate) async fn add_private_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<ConversationPath>,
    Json(payload): Json<CreateMessageRequest>,
) -> Result<Outcome<PrivateMessageResponse>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    let receiver_id: UserId = parse_id(path.friend_id)?;
    Ok(post_private(&state, auth, receiver_id, new_message(payload)?).await)
}

pub(crate) async fn remove_private_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<MessagePath>,
) -> Result<Outcome<()>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    let message_id: MessageId = parse_id(path.message_id)?;
    Ok(drop_private(&state, auth, message_id).await)
}
