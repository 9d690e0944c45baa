use std::collections::BTreeMap;

use agora_core::{
    ChannelId, ChannelKind, ChannelStatus, CommunityId, CommunityStatus, CommunityVisibility,
    FriendStatus, FriendshipId, MembershipId, MembershipStatus, MessageId, PermissionEntryId,
    Role, RoleName, UserId, UserStatus,
};
use serde::{Deserialize, Serialize};

use super::store::Document;

macro_rules! versioned_document {
    ($record:ty, $collection:literal) => {
        versioned_document!($record, $collection, |_record| None);
    };
    ($record:ty, $collection:literal, |$this:ident| $key:expr) => {
        impl Document for $record {
            const COLLECTION: &'static str = $collection;

            fn id(&self) -> String {
                self.id.to_string()
            }

            fn version(&self) -> u64 {
                self.version
            }

            fn set_version(&mut self, version: u64) {
                self.version = version;
            }

            fn unique_key(&self) -> Option<String> {
                let $this = self;
                $key
            }
        }
    };
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct UserRecord {
    pub(crate) id: UserId,
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) password_hash: String,
    pub(crate) status: UserStatus,
    pub(crate) bio: String,
    pub(crate) avatar: Option<String>,
    pub(crate) created_at_unix: i64,
    #[serde(default)]
    pub(crate) version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CommunityRecord {
    pub(crate) id: CommunityId,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) image: Option<String>,
    pub(crate) banner: Option<String>,
    pub(crate) status: CommunityStatus,
    pub(crate) visibility: CommunityVisibility,
    pub(crate) owner_id: UserId,
    pub(crate) members_count: u64,
    /// Role catalog keyed by normalized name.
    pub(crate) roles: BTreeMap<RoleName, Role>,
    pub(crate) created_at_unix: i64,
    pub(crate) updated_at_unix: i64,
    #[serde(default)]
    pub(crate) version: u64,
}

impl CommunityRecord {
    pub(crate) fn role(&self, name: &RoleName) -> Option<&Role> {
        self.roles.get(name)
    }

    /// True when the catalog still holds a role with this exact identity.
    pub(crate) fn holds_role(&self, role: &Role) -> bool {
        self.roles
            .get(&role.name)
            .is_some_and(|current| current.id == role.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MembershipRecord {
    pub(crate) id: MembershipId,
    pub(crate) user_id: UserId,
    pub(crate) community_id: CommunityId,
    pub(crate) status: MembershipStatus,
    /// Copies of the granted roles, taken at grant time.
    pub(crate) roles: BTreeMap<RoleName, Role>,
    pub(crate) joined_at_unix: i64,
    #[serde(default)]
    pub(crate) version: u64,
}

impl MembershipRecord {
    pub(crate) fn is_owner(&self) -> bool {
        self.roles.contains_key(&RoleName::owner())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ChannelRecord {
    pub(crate) id: ChannelId,
    pub(crate) community_id: CommunityId,
    pub(crate) index: u32,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) kind: ChannelKind,
    pub(crate) status: ChannelStatus,
    pub(crate) created_at_unix: i64,
    pub(crate) updated_at_unix: i64,
    #[serde(default)]
    pub(crate) version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CommunityMessageRecord {
    pub(crate) id: MessageId,
    pub(crate) community_id: CommunityId,
    pub(crate) channel_id: ChannelId,
    pub(crate) sender_id: UserId,
    pub(crate) text: String,
    pub(crate) reply_to: Option<MessageId>,
    pub(crate) created_at_unix_ms: i64,
    pub(crate) updated_at_unix_ms: i64,
    #[serde(default)]
    pub(crate) version: u64,
}

/// One direction of a friendship. Accepting an invite adds the reverse row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FriendRecord {
    pub(crate) id: FriendshipId,
    pub(crate) user_id: UserId,
    pub(crate) friend_id: UserId,
    pub(crate) status: FriendStatus,
    pub(crate) created_at_unix: i64,
    #[serde(default)]
    pub(crate) version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PrivateMessageRecord {
    pub(crate) id: MessageId,
    pub(crate) sender_id: UserId,
    pub(crate) receiver_id: UserId,
    /// Unordered pair key so both directions of a conversation share one filter.
    pub(crate) conversation: String,
    pub(crate) text: String,
    pub(crate) reply_to: Option<MessageId>,
    pub(crate) created_at_unix_ms: i64,
    #[serde(default)]
    pub(crate) version: u64,
}

pub(crate) fn conversation_key(a: UserId, b: UserId) -> String {
    if a <= b {
        format!("{a}:{b}")
    } else {
        format!("{b}:{a}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PermissionCatalogRecord {
    pub(crate) id: PermissionEntryId,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) abilities: Vec<String>,
    #[serde(default)]
    pub(crate) version: u64,
}

versioned_document!(UserRecord, "users", |user| Some(
    user.username.to_ascii_lowercase()
));
versioned_document!(CommunityRecord, "communities");
versioned_document!(MembershipRecord, "memberships", |membership| Some(
    format!("{}:{}", membership.community_id, membership.user_id)
));
versioned_document!(ChannelRecord, "channels");
versioned_document!(CommunityMessageRecord, "community_messages");
versioned_document!(FriendRecord, "friends", |friend| Some(format!(
    "{}:{}",
    friend.user_id, friend.friend_id
)));
versioned_document!(PrivateMessageRecord, "private_messages");
versioned_document!(PermissionCatalogRecord, "permission_catalog", |entry| Some(
    entry.name.clone()
));

#[cfg(test)]
mod tests {
    use agora_core::UserId;

    use super::conversation_key;

    #[test]
    fn conversation_key_ignores_direction() {
        let a = UserId::new();
        let b = UserId::new();
        assert_eq!(conversation_key(a, b), conversation_key(b, a));
        assert_ne!(conversation_key(a, b), conversation_key(a, a));
    }
}
