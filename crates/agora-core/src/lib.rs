#![forbid(unsafe_code)]

use core::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ulid::Ulid;

/// Returns the project code name.
#[must_use]
pub const fn project_name() -> &'static str {
    "agora"
}

pub const OWNER_ROLE: &str = "Owner";
pub const MEMBER_ROLE: &str = "Member";
pub const MAX_ROLE_NAME_CHARS: usize = 64;
pub const MAX_MESSAGE_CHARS: usize = 1_000;
pub const MAX_DESCRIPTION_CHARS: usize = 500;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("name is invalid")]
    InvalidName,
    #[error("channel kind is invalid")]
    InvalidChannelKind,
    #[error("username is invalid")]
    InvalidUsername,
    #[error("identifier is invalid")]
    InvalidId,
    #[error("role name is invalid")]
    InvalidRoleName,
    #[error("permission is unknown")]
    UnknownPermission,
    #[error("message text is invalid")]
    InvalidMessageText,
    #[error("description is invalid")]
    InvalidDescription,
}

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            #[must_use]
            pub const fn from_ulid(value: Ulid) -> Self {
                Self(value)
            }

            #[must_use]
            pub const fn as_ulid(self) -> Ulid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Ulid::from_string(value)
                    .map(Self)
                    .map_err(|_| DomainError::InvalidId)
            }
        }

        impl TryFrom<String> for $name {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

ulid_id!(UserId);
ulid_id!(CommunityId);
ulid_id!(ChannelId);
ulid_id!(MessageId);
ulid_id!(
    /// Stable identity of a role inside one community. A role removed and
    /// re-added under the same name gets a fresh id.
    RoleId
);
ulid_id!(MembershipId);
ulid_id!(FriendshipId);
ulid_id!(PermissionEntryId);

/// Closed catalog of community capabilities.
///
/// The serialized form is the human-readable catalog name, which is also the
/// registry key used by `from_name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "Send Message")]
    SendMessage,
    #[serde(rename = "Join Voice")]
    JoinVoice,
    #[serde(rename = "Ban & Unban")]
    BanAndUnban,
    #[serde(rename = "Create Voice Channel")]
    CreateVoiceChannel,
    #[serde(rename = "Create Text Channel")]
    CreateTextChannel,
    #[serde(rename = "Remove Messages")]
    RemoveMessages,
    #[serde(rename = "Voice Kick")]
    VoiceKick,
    #[serde(rename = "Create Role")]
    CreateRole,
    #[serde(rename = "Give Role")]
    GiveRole,
    #[serde(rename = "Update Community")]
    UpdateCommunity,
}

impl Permission {
    pub const ALL: [Self; 10] = [
        Self::SendMessage,
        Self::JoinVoice,
        Self::BanAndUnban,
        Self::CreateVoiceChannel,
        Self::CreateTextChannel,
        Self::RemoveMessages,
        Self::VoiceKick,
        Self::CreateRole,
        Self::GiveRole,
        Self::UpdateCommunity,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SendMessage => "Send Message",
            Self::JoinVoice => "Join Voice",
            Self::BanAndUnban => "Ban & Unban",
            Self::CreateVoiceChannel => "Create Voice Channel",
            Self::CreateTextChannel => "Create Text Channel",
            Self::RemoveMessages => "Remove Messages",
            Self::VoiceKick => "Voice Kick",
            Self::CreateRole => "Create Role",
            Self::GiveRole => "Give Role",
            Self::UpdateCommunity => "Update Community",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::SendMessage => "Post messages in text channels",
            Self::JoinVoice => "Connect to voice channels",
            Self::BanAndUnban => "Ban members from the community and lift bans",
            Self::CreateVoiceChannel => "Create, edit and delete voice channels",
            Self::CreateTextChannel => "Create, edit and delete text channels",
            Self::RemoveMessages => "Delete messages posted by other members",
            Self::VoiceKick => "Disconnect members from voice channels",
            Self::CreateRole => "Create and delete community roles",
            Self::GiveRole => "Grant and revoke roles on members",
            Self::UpdateCommunity => "Edit the community profile",
        }
    }

    #[must_use]
    pub const fn abilities(self) -> &'static [&'static str] {
        match self {
            Self::SendMessage => &["message.create"],
            Self::JoinVoice => &["voice.connect"],
            Self::BanAndUnban => &["member.ban", "member.unban"],
            Self::CreateVoiceChannel => &["channel.voice.manage"],
            Self::CreateTextChannel => &["channel.text.manage"],
            Self::RemoveMessages => &["message.delete.any"],
            Self::VoiceKick => &["voice.kick"],
            Self::CreateRole => &["role.create", "role.delete"],
            Self::GiveRole => &["role.grant", "role.revoke"],
            Self::UpdateCommunity => &["community.update"],
        }
    }

    /// Exact-string lookup against the catalog names.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|permission| permission.name() == name)
    }

    const fn mask(self) -> u64 {
        match self {
            Self::SendMessage => 1 << 0,
            Self::JoinVoice => 1 << 1,
            Self::BanAndUnban => 1 << 2,
            Self::CreateVoiceChannel => 1 << 3,
            Self::CreateTextChannel => 1 << 4,
            Self::RemoveMessages => 1 << 5,
            Self::VoiceKick => 1 << 6,
            Self::CreateRole => 1 << 7,
            Self::GiveRole => 1 << 8,
            Self::UpdateCommunity => 1 << 9,
        }
    }
}

impl FromStr for Permission {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_name(value).ok_or(DomainError::UnknownPermission)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bit set of catalog permissions. Serializes as the list of catalog names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct PermissionSet(u64);

impl PermissionSet {
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub fn all() -> Self {
        Permission::ALL.into_iter().collect()
    }

    /// Unknown bits are dropped.
    #[must_use]
    pub fn from_bits(bits: u64) -> Self {
        Self(bits & Self::all().0)
    }

    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn contains(self, permission: Permission) -> bool {
        self.0 & permission.mask() != 0
    }

    pub fn insert(&mut self, permission: Permission) {
        self.0 |= permission.mask();
    }

    pub fn remove(&mut self, permission: Permission) {
        self.0 &= !permission.mask();
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Iterates in catalog order.
    pub fn iter(self) -> impl Iterator<Item = Permission> {
        Permission::ALL
            .into_iter()
            .filter(move |permission| self.contains(*permission))
    }

    #[must_use]
    pub fn names(self) -> Vec<&'static str> {
        self.iter().map(Permission::name).collect()
    }

    /// Resolves catalog names. Any unknown name fails the whole set.
    pub fn from_names<I, S>(names: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| name.as_ref().parse::<Permission>())
            .collect()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        let mut set = Self::empty();
        for permission in iter {
            set.insert(permission);
        }
        set
    }
}

impl Serialize for PermissionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for PermissionSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let permissions = Vec::<Permission>::deserialize(deserializer)?;
        Ok(permissions.into_iter().collect())
    }
}

/// Lower-cases the input and upper-cases the first letter of every word.
///
/// A word starts after any character that is not alphanumeric, so
/// `"ban & UNBAN"` becomes `"Ban & Unban"` and `"co-owner"` becomes
/// `"Co-Owner"`.
#[must_use]
pub fn normalize_role_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let mut normalized = String::with_capacity(lowered.len());
    let mut at_word_start = true;
    for ch in lowered.chars() {
        if at_word_start && ch.is_alphabetic() {
            normalized.extend(ch.to_uppercase());
        } else {
            normalized.push(ch);
        }
        at_word_start = !ch.is_alphanumeric();
    }
    normalized
}

/// A normalized role name. Construction always goes through
/// `normalize_role_name`, so equal names compare equal regardless of the
/// casing a caller used.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleName(String);

impl RoleName {
    #[must_use]
    pub fn owner() -> Self {
        Self(OWNER_ROLE.to_owned())
    }

    #[must_use]
    pub fn member() -> Self {
        Self(MEMBER_ROLE.to_owned())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.0 == OWNER_ROLE
    }
}

impl TryFrom<String> for RoleName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let normalized = normalize_role_name(&value);
        let chars = normalized.chars().count();
        if chars == 0 || chars > MAX_ROLE_NAME_CHARS || normalized.chars().any(char::is_control) {
            return Err(DomainError::InvalidRoleName);
        }
        Ok(Self(normalized))
    }
}

impl TryFrom<&str> for RoleName {
    type Error = DomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_owned())
    }
}

impl From<RoleName> for String {
    fn from(value: RoleName) -> Self {
        value.0
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// False for any name that contains a reserved role name; such roles can
/// never be created or deleted through role management.
#[must_use]
pub fn can_mutate_role(name: &RoleName) -> bool {
    !(name.as_str().contains(OWNER_ROLE) || name.as_str().contains(MEMBER_ROLE))
}

/// Narrower check for granting and revoking: only the owner role is off limits.
#[must_use]
pub fn can_assign_role(name: &RoleName) -> bool {
    !name.as_str().contains(OWNER_ROLE)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: RoleName,
    pub permissions: PermissionSet,
}

impl Role {
    #[must_use]
    pub fn new(name: RoleName, permissions: PermissionSet) -> Self {
        Self {
            id: RoleId::new(),
            name,
            permissions,
        }
    }

    #[must_use]
    pub fn allows(&self, permission: Permission) -> bool {
        self.permissions.contains(permission)
    }
}

/// True iff any of the given roles carries `permission`.
#[must_use]
pub fn has_permission<'a, I>(roles: I, permission: Permission) -> bool
where
    I: IntoIterator<Item = &'a Role>,
{
    roles.into_iter().any(|role| role.allows(permission))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Text,
    Voice,
}

impl ChannelKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Voice => "voice",
        }
    }

    /// The capability that governs creating and editing channels of this kind.
    #[must_use]
    pub const fn manage_permission(self) -> Permission {
        match self {
            Self::Text => Permission::CreateTextChannel,
            Self::Voice => Permission::CreateVoiceChannel,
        }
    }
}

impl TryFrom<String> for ChannelKind {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "text" => Ok(Self::Text),
            "voice" => Ok(Self::Voice),
            _ => Err(DomainError::InvalidChannelKind),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Active,
    Inactive,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunityStatus {
    Active,
    Banned,
    Restricted,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunityVisibility {
    Public,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Active,
    Banned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Banned,
    Restricted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendStatus {
    Invited,
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Username {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_username(&value)?;
        Ok(Self(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommunityName(String);

impl CommunityName {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for CommunityName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let value = value.trim().to_owned();
        validate_name(&value, 1, 80)?;
        Ok(Self(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelTitle(String);

impl ChannelTitle {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for ChannelTitle {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let value = value.trim().to_owned();
        validate_name(&value, 1, 100)?;
        Ok(Self(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageText(String);

impl MessageText {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for MessageText {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let chars = value.chars().count();
        if chars == 0 || chars > MAX_MESSAGE_CHARS {
            return Err(DomainError::InvalidMessageText);
        }
        if value.trim().is_empty() || value.contains('\0') {
            return Err(DomainError::InvalidMessageText);
        }
        Ok(Self(value))
    }
}

/// Free-form description text: bounded length, no NUL bytes.
pub fn validate_description(value: &str) -> Result<(), DomainError> {
    if value.chars().count() > MAX_DESCRIPTION_CHARS || value.contains('\0') {
        return Err(DomainError::InvalidDescription);
    }
    Ok(())
}

fn validate_username(value: &str) -> Result<(), DomainError> {
    if !(3..=32).contains(&value.len()) {
        return Err(DomainError::InvalidUsername);
    }

    if value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return Ok(());
    }

    Err(DomainError::InvalidUsername)
}

fn validate_name(value: &str, min: usize, max: usize) -> Result<(), DomainError> {
    if !(min..=max).contains(&value.chars().count()) {
        return Err(DomainError::InvalidName);
    }

    if value.chars().any(char::is_control) {
        return Err(DomainError::InvalidName);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        can_assign_role, can_mutate_role, has_permission, normalize_role_name, project_name,
        validate_description, ChannelKind, ChannelTitle, CommunityId, CommunityName, DomainError,
        MessageText, Permission, PermissionSet, Role, RoleName, UserId, Username,
    };

    #[test]
    fn project_name_is_stable() {
        assert_eq!(project_name(), "agora");
    }

    #[test]
    fn ids_round_trip_and_reject_garbage() {
        let id = CommunityId::new();
        let parsed = CommunityId::try_from(id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert_eq!(
            UserId::try_from(String::from("not-a-ulid")).unwrap_err(),
            DomainError::InvalidId
        );
    }

    #[test]
    fn ids_serialize_as_canonical_strings() {
        let id = UserId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn role_names_are_title_cased() {
        assert_eq!(normalize_role_name("moderator"), "Moderator");
        assert_eq!(normalize_role_name("  SENIOR moderator "), "Senior Moderator");
        assert_eq!(normalize_role_name("ban & UNBAN"), "Ban & Unban");
        assert_eq!(normalize_role_name("co-owner"), "Co-Owner");
        assert_eq!(normalize_role_name("2nd place"), "2nd Place");
        assert_eq!(
            RoleName::try_from("oWnEr").unwrap(),
            RoleName::owner()
        );
    }

    #[test]
    fn role_name_rejects_empty_and_oversized_values() {
        assert_eq!(
            RoleName::try_from("   ").unwrap_err(),
            DomainError::InvalidRoleName
        );
        assert_eq!(
            RoleName::try_from("x".repeat(65)).unwrap_err(),
            DomainError::InvalidRoleName
        );
    }

    #[test]
    fn reserved_role_predicates_use_substring_matching() {
        let owner = RoleName::try_from("OWNER").unwrap();
        let member = RoleName::try_from("member").unwrap();
        let co_owner = RoleName::try_from("co owner").unwrap();
        let moderator = RoleName::try_from("moderator").unwrap();

        assert!(!can_mutate_role(&owner));
        assert!(!can_mutate_role(&member));
        assert!(!can_mutate_role(&co_owner));
        assert!(can_mutate_role(&moderator));

        assert!(!can_assign_role(&owner));
        assert!(!can_assign_role(&co_owner));
        assert!(can_assign_role(&member));
        assert!(can_assign_role(&moderator));
    }

    #[test]
    fn permission_registry_is_exact_string() {
        assert_eq!(
            Permission::from_name("Create Text Channel"),
            Some(Permission::CreateTextChannel)
        );
        assert_eq!(Permission::from_name("create text channel"), None);
        assert_eq!(
            "Nope".parse::<Permission>().unwrap_err(),
            DomainError::UnknownPermission
        );
        for permission in Permission::ALL {
            assert_eq!(Permission::from_name(permission.name()), Some(permission));
        }
    }

    #[test]
    fn permission_set_tracks_membership_and_order() {
        let mut set = PermissionSet::empty();
        assert!(set.is_empty());
        set.insert(Permission::GiveRole);
        set.insert(Permission::SendMessage);
        assert!(set.contains(Permission::GiveRole));
        assert!(!set.contains(Permission::CreateRole));
        assert_eq!(set.names(), vec!["Send Message", "Give Role"]);

        set.remove(Permission::GiveRole);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Permission::SendMessage]);
        assert_eq!(PermissionSet::all().iter().count(), Permission::ALL.len());
        assert_eq!(PermissionSet::from_bits(u64::MAX), PermissionSet::all());
    }

    #[test]
    fn permission_set_serializes_as_names() {
        let set = PermissionSet::from_names(["Join Voice", "Ban & Unban"]).unwrap();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["Join Voice","Ban & Unban"]"#);
        let back: PermissionSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);

        assert_eq!(
            PermissionSet::from_names(["Join Voice", "Fly"]).unwrap_err(),
            DomainError::UnknownPermission
        );
    }

    #[test]
    fn has_permission_is_any_role_union() {
        let member = Role::new(
            RoleName::member(),
            [Permission::SendMessage, Permission::JoinVoice]
                .into_iter()
                .collect(),
        );
        let moderator = Role::new(
            RoleName::try_from("moderator").unwrap(),
            [Permission::CreateTextChannel].into_iter().collect(),
        );

        assert!(!has_permission([&member], Permission::CreateTextChannel));
        assert!(has_permission(
            [&member, &moderator],
            Permission::CreateTextChannel
        ));
        assert!(!has_permission(
            std::iter::empty::<&Role>(),
            Permission::SendMessage
        ));
    }

    #[test]
    fn channel_kind_selects_manage_permission() {
        assert_eq!(
            ChannelKind::Text.manage_permission(),
            Permission::CreateTextChannel
        );
        assert_eq!(
            ChannelKind::Voice.manage_permission(),
            Permission::CreateVoiceChannel
        );
        assert_eq!(
            ChannelKind::try_from(String::from("video")).unwrap_err(),
            DomainError::InvalidChannelKind
        );
    }

    #[test]
    fn text_newtypes_enforce_bounds() {
        assert!(Username::try_from(String::from("alice_1")).is_ok());
        assert_eq!(
            Username::try_from(String::from("bad-name")).unwrap_err(),
            DomainError::InvalidUsername
        );
        assert_eq!(
            CommunityName::try_from(String::from("  Rustaceans  "))
                .unwrap()
                .as_str(),
            "Rustaceans"
        );
        assert!(CommunityName::try_from(String::from("   ")).is_err());
        assert!(ChannelTitle::try_from("t".repeat(101)).is_err());
        assert!(MessageText::try_from("é".repeat(1_000)).is_ok());
        assert_eq!(
            MessageText::try_from("a".repeat(1_001)).unwrap_err(),
            DomainError::InvalidMessageText
        );
        assert!(MessageText::try_from(String::from("  ")).is_err());
        assert!(validate_description("fine").is_ok());
        assert!(validate_description("\0").is_err());
    }
}
