use agora_core::{FriendStatus, MessageId, UserId, UserStatus};

use super::{
    load_active_user,
    messages::{HistoryPage, NewMessage},
};
use crate::server::{
    core::{now_unix_ms, AppState, AuthContext},
    errors::{Outcome, ServiceError, ServiceResult},
    records::{conversation_key, PrivateMessageRecord},
    store::Filter,
    types::PrivateMessageResponse,
};

pub(crate) async fn add_private_message(
    state: &AppState,
    auth: AuthContext,
    receiver_id: UserId,
    command: NewMessage,
) -> Outcome<PrivateMessageResponse> {
    Outcome::settle(
        "private_message.add",
        "Message sent",
        add_private_message_inner(state, auth, receiver_id, command).await,
    )
}

async fn add_private_message_inner(
    state: &AppState,
    auth: AuthContext,
    receiver_id: UserId,
    command: NewMessage,
) -> ServiceResult<PrivateMessageResponse> {
    load_active_user(state, auth.user_id).await?;
    let receiver = state
        .store
        .users
        .find_one(&Filter::by_id(receiver_id))
        .await?
        .ok_or_else(|| ServiceError::not_found("User not found"))?;
    if receiver.status != UserStatus::Active {
        return Err(ServiceError::invalid_state("Recipient account is not active"));
    }

    let befriended = state
        .store
        .friends
        .exists(
            &(Filter::eq("user_id", auth.user_id)
                & Filter::eq("friend_id", receiver_id)
                & Filter::eq("status", FriendStatus::Active)),
        )
        .await?;
    if !befriended {
        return Err(ServiceError::permission_denied(
            "You can only message your friends",
        ));
    }

    let conversation = conversation_key(auth.user_id, receiver_id);
    if let Some(reply_to) = command.reply_to {
        let exists = state
            .store
            .private_messages
            .exists(&(Filter::by_id(reply_to) & Filter::eq("conversation", &conversation)))
            .await?;
        if !exists {
            return Err(ServiceError::not_found("Replied message not found"));
        }
    }

    let message = state
        .store
        .private_messages
        .add(PrivateMessageRecord {
            id: MessageId::new(),
            sender_id: auth.user_id,
            receiver_id,
            conversation,
            text: command.text.into_inner(),
            reply_to: command.reply_to,
            created_at_unix_ms: now_unix_ms(),
            version: 0,
        })
        .await?;
    Ok(PrivateMessageResponse::from(&message))
}

pub(crate) async fn remove_private_message(
    state: &AppState,
    auth: AuthContext,
    message_id: MessageId,
) -> Outcome<()> {
    let result: ServiceResult<_> = async {
        let message = state
            .store
            .private_messages
            .find_one(&Filter::by_id(message_id))
            .await?
            .ok_or_else(|| ServiceError::not_found("Message not found"))?;
        if message.sender_id != auth.user_id {
            return Err(ServiceError::permission_denied(
                "Only the sender can remove this message",
            ));
        }
        state
            .store
            .private_messages
            .remove(&Filter::by_id(message_id))
            .await?;
        Ok(())
    }
    .await;
    Outcome::settle("private_message.remove", "Message removed", result)
}

/// Both directions of the caller's conversation with `friend_id`, newest first.
pub(crate) async fn get_conversation(
    state: &AppState,
    auth: AuthContext,
    friend_id: UserId,
    page: HistoryPage,
) -> Outcome<Vec<PrivateMessageResponse>> {
    let result: ServiceResult<_> = async {
        if !state.store.users.exists(&Filter::by_id(friend_id)).await? {
            return Err(ServiceError::not_found("User not found"));
        }
        let (filter, options) = page.query(
            state,
            Filter::eq("conversation", conversation_key(auth.user_id, friend_id)),
        );
        let messages = state
            .store
            .private_messages
            .find_many(&filter, &options)
            .await?;
        Ok(messages.iter().map(PrivateMessageResponse::from).collect())
    }
    .await;
    Outcome::settle("private_message.history", "Messages listed", result)
}
