use agora_core::{
    ChannelId, ChannelKind, ChannelStatus, CommunityId, CommunityStatus, CommunityVisibility,
    FriendStatus, FriendshipId, MembershipId, MembershipStatus, MessageId, PermissionSet, RoleId,
    UserId, UserStatus,
};
use axum::{
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{
    core::METRICS_TEXT_CONTENT_TYPE,
    metrics::render_metrics,
    records::{
        ChannelRecord, CommunityMessageRecord, CommunityRecord, FriendRecord, MembershipRecord,
        PermissionCatalogRecord, PrivateMessageRecord, UserRecord,
    },
};

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
}

pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub(crate) async fn metrics() -> Response {
    (
        [(CONTENT_TYPE, METRICS_TEXT_CONTENT_TYPE)],
        render_metrics(),
    )
        .into_response()
}

#[derive(Debug, Serialize)]
pub(crate) struct AuthError {
    pub(crate) error: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RegisterRequest {
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct LoginRequest {
    pub(crate) username: String,
    pub(crate) password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AuthResponse {
    pub(crate) access_token: String,
    pub(crate) token_type: &'static str,
    pub(crate) expires_in_secs: u64,
    pub(crate) user_id: UserId,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    pub(crate) user_id: UserId,
    pub(crate) username: String,
    pub(crate) bio: String,
    pub(crate) avatar: Option<String>,
    pub(crate) status: UserStatus,
    pub(crate) created_at_unix: i64,
}

impl From<&UserRecord> for UserResponse {
    fn from(user: &UserRecord) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            bio: user.bio.clone(),
            avatar: user.avatar.clone(),
            status: user.status,
            created_at_unix: user.created_at_unix,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct UpdateUserRequest {
    pub(crate) bio: Option<String>,
    pub(crate) avatar_base64: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CreateCommunityRequest {
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) visibility: Option<CommunityVisibility>,
    pub(crate) image_base64: Option<String>,
    pub(crate) banner_base64: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct UpdateCommunityRequest {
    pub(crate) name: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) visibility: Option<CommunityVisibility>,
    pub(crate) image_base64: Option<String>,
    pub(crate) banner_base64: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RoleResponse {
    pub(crate) role_id: RoleId,
    pub(crate) name: String,
    pub(crate) permissions: PermissionSet,
}

#[derive(Debug, Serialize)]
pub(crate) struct CommunityResponse {
    pub(crate) community_id: CommunityId,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) image: Option<String>,
    pub(crate) banner: Option<String>,
    pub(crate) status: CommunityStatus,
    pub(crate) visibility: CommunityVisibility,
    pub(crate) owner_id: UserId,
    pub(crate) members_count: u64,
    pub(crate) roles: Vec<RoleResponse>,
    pub(crate) created_at_unix: i64,
    pub(crate) updated_at_unix: i64,
}

impl From<&CommunityRecord> for CommunityResponse {
    fn from(community: &CommunityRecord) -> Self {
        Self {
            community_id: community.id,
            name: community.name.clone(),
            description: community.description.clone(),
            image: community.image.clone(),
            banner: community.banner.clone(),
            status: community.status,
            visibility: community.visibility,
            owner_id: community.owner_id,
            members_count: community.members_count,
            roles: community
                .roles
                .values()
                .map(|role| RoleResponse {
                    role_id: role.id,
                    name: role.name.to_string(),
                    permissions: role.permissions,
                })
                .collect(),
            created_at_unix: community.created_at_unix,
            updated_at_unix: community.updated_at_unix,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct MemberResponse {
    pub(crate) membership_id: MembershipId,
    pub(crate) user_id: UserId,
    pub(crate) status: MembershipStatus,
    pub(crate) roles: Vec<String>,
    pub(crate) joined_at_unix: i64,
}

impl From<&MembershipRecord> for MemberResponse {
    fn from(membership: &MembershipRecord) -> Self {
        Self {
            membership_id: membership.id,
            user_id: membership.user_id,
            status: membership.status,
            roles: membership.roles.keys().map(ToString::to_string).collect(),
            joined_at_unix: membership.joined_at_unix,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CreateRoleRequest {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) permissions: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CreateChannelRequest {
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) kind: ChannelKind,
}

/// `kind` is accepted for client compatibility and never applied.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct UpdateChannelRequest {
    pub(crate) title: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) kind: Option<ChannelKind>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChannelResponse {
    pub(crate) channel_id: ChannelId,
    pub(crate) community_id: CommunityId,
    pub(crate) index: u32,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) kind: ChannelKind,
    pub(crate) status: ChannelStatus,
    pub(crate) created_at_unix: i64,
    pub(crate) updated_at_unix: i64,
}

impl From<&ChannelRecord> for ChannelResponse {
    fn from(channel: &ChannelRecord) -> Self {
        Self {
            channel_id: channel.id,
            community_id: channel.community_id,
            index: channel.index,
            title: channel.title.clone(),
            description: channel.description.clone(),
            kind: channel.kind,
            status: channel.status,
            created_at_unix: channel.created_at_unix,
            updated_at_unix: channel.updated_at_unix,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CreateMessageRequest {
    pub(crate) text: String,
    pub(crate) reply_to: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct HistoryQuery {
    pub(crate) before: Option<i64>,
    pub(crate) before_id: Option<String>,
    pub(crate) limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub(crate) struct MessageResponse {
    pub(crate) message_id: MessageId,
    pub(crate) community_id: CommunityId,
    pub(crate) channel_id: ChannelId,
    pub(crate) sender_id: UserId,
    pub(crate) text: String,
    pub(crate) reply_to: Option<MessageId>,
    pub(crate) created_at_unix_ms: i64,
}

impl From<&CommunityMessageRecord> for MessageResponse {
    fn from(message: &CommunityMessageRecord) -> Self {
        Self {
            message_id: message.id,
            community_id: message.community_id,
            channel_id: message.channel_id,
            sender_id: message.sender_id,
            text: message.text.clone(),
            reply_to: message.reply_to,
            created_at_unix_ms: message.created_at_unix_ms,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PrivateMessageResponse {
    pub(crate) message_id: MessageId,
    pub(crate) sender_id: UserId,
    pub(crate) receiver_id: UserId,
    pub(crate) text: String,
    pub(crate) reply_to: Option<MessageId>,
    pub(crate) created_at_unix_ms: i64,
}

impl From<&PrivateMessageRecord> for PrivateMessageResponse {
    fn from(message: &PrivateMessageRecord) -> Self {
        Self {
            message_id: message.id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            text: message.text.clone(),
            reply_to: message.reply_to,
            created_at_unix_ms: message.created_at_unix_ms,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct FriendResponse {
    pub(crate) friendship_id: FriendshipId,
    pub(crate) user_id: UserId,
    pub(crate) friend_id: UserId,
    pub(crate) status: FriendStatus,
    pub(crate) created_at_unix: i64,
}

impl From<&FriendRecord> for FriendResponse {
    fn from(friend: &FriendRecord) -> Self {
        Self {
            friendship_id: friend.id,
            user_id: friend.user_id,
            friend_id: friend.friend_id,
            status: friend.status,
            created_at_unix: friend.created_at_unix,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PermissionEntryResponse {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) abilities: Vec<String>,
}

impl From<PermissionCatalogRecord> for PermissionEntryResponse {
    fn from(entry: PermissionCatalogRecord) -> Self {
        Self {
            name: entry.name,
            description: entry.description,
            abilities: entry.abilities,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserPath {
    pub(crate) user_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommunityPath {
    pub(crate) community_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MemberPath {
    pub(crate) community_id: String,
    pub(crate) member_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RolePath {
    pub(crate) community_id: String,
    pub(crate) role_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MemberRolePath {
    pub(crate) community_id: String,
    pub(crate) member_id: String,
    pub(crate) role_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChannelPath {
    pub(crate) channel_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessagePath {
    pub(crate) message_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FriendRequestPath {
    pub(crate) request_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConversationPath {
    pub(crate) friend_id: String,
}
