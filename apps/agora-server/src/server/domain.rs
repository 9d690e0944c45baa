use agora_core::{
    has_permission, CommunityId, CommunityStatus, MembershipStatus, Permission, Role, RoleName,
    UserId, UserStatus,
};

mod channels;
mod communities;
mod friends;
mod messages;
mod private_messages;
mod roles;
mod users;

pub(crate) use channels::{
    add_channel, delete_channel, get_channel, get_community_channels, update_channel,
    ChannelChanges, NewChannel,
};
pub(crate) use communities::{
    artwork_file, ban_member, create_community, get_community, join_community, leave_community,
    list_members, list_my_communities, unban_member, update_community, Artwork,
    CommunityChanges, NewCommunity,
};
pub(crate) use friends::{accept_friend, add_friend, list_friends, mutual_friends, remove_friend};
pub(crate) use messages::{
    add_message, get_channel_messages, remove_message, HistoryPage, NewMessage,
};
pub(crate) use private_messages::{add_private_message, get_conversation, remove_private_message};
pub(crate) use roles::{add_role, get_community_roles, grant_role, remove_role, revoke_role};
pub(crate) use users::{avatar_file, get_user, login, register, update_user, ProfileChanges};

use super::{
    core::AppState,
    errors::{FailureKind, ServiceError, ServiceResult},
    records::{CommunityRecord, MembershipRecord, UserRecord},
    store::{Document, Filter, FindOptions, Repo, StoreError},
};

const MAX_UPDATE_ATTEMPTS: usize = 3;

/// Fetch latest, apply `change`, then compare-and-swap on the fetched version.
///
/// A version conflict re-runs the whole step against the newer copy. `change`
/// may reject the fetched state; that error ends the loop unchanged.
pub(crate) async fn update_with_retry<T, F>(
    repo: &Repo<T>,
    filter: &Filter,
    missing: &str,
    mut change: F,
) -> ServiceResult<T>
where
    T: Document,
    F: FnMut(&mut T) -> ServiceResult<()>,
{
    for attempt in 1..=MAX_UPDATE_ATTEMPTS {
        let Some(mut document) = repo.find_one(filter).await? else {
            return Err(ServiceError::not_found(missing));
        };
        change(&mut document)?;
        match repo.replace(filter, document).await {
            Ok(stored) => return Ok(stored),
            Err(StoreError::VersionConflict) => {
                tracing::debug!(event = "store.retry", collection = T::COLLECTION, attempt);
            }
            Err(StoreError::Missing) => return Err(ServiceError::not_found(missing)),
            Err(error) => return Err(error.into()),
        }
    }
    Err(ServiceError::conflict(format!(
        "{} was modified concurrently, retry the operation",
        T::COLLECTION
    )))
}

pub(crate) async fn load_community(
    state: &AppState,
    community_id: CommunityId,
) -> ServiceResult<CommunityRecord> {
    state
        .store
        .communities
        .find_one(&Filter::by_id(community_id))
        .await?
        .ok_or_else(|| ServiceError::not_found("Community not found"))
}

pub(crate) fn require_active_community(community: &CommunityRecord) -> ServiceResult<()> {
    if community.status == CommunityStatus::Active {
        Ok(())
    } else {
        Err(ServiceError::invalid_state("Community is not active"))
    }
}

pub(crate) async fn load_active_user(state: &AppState, user_id: UserId) -> ServiceResult<UserRecord> {
    let user = state
        .store
        .users
        .find_one(&Filter::by_id(user_id))
        .await?
        .ok_or_else(|| ServiceError::not_found("User not found"))?;
    if user.status != UserStatus::Active {
        return Err(ServiceError::permission_denied("User account is not active"));
    }
    Ok(user)
}

/// Copy of a catalog role, ready to be pinned into a membership.
pub(crate) fn catalog_role(community: &CommunityRecord, name: &RoleName) -> ServiceResult<Role> {
    community.role(name).cloned().ok_or_else(|| {
        ServiceError::not_found(format!("Role \"{name}\" does not exist in this community"))
    })
}

pub(crate) fn membership_filter(community_id: CommunityId, user_id: UserId) -> Filter {
    Filter::eq("community_id", community_id) & Filter::eq("user_id", user_id)
}

/// A caller's view of one community: the community document and the
/// caller's membership with stale grants already dropped.
#[derive(Debug, Clone)]
pub(crate) struct MemberContext {
    pub(crate) community: CommunityRecord,
    pub(crate) membership: MembershipRecord,
}

impl MemberContext {
    /// Grants whose role identity is gone from the catalog count for nothing.
    pub(crate) fn allows(&self, permission: Permission) -> bool {
        has_permission(
            self.membership
                .roles
                .values()
                .filter(|role| self.community.holds_role(role)),
            permission,
        )
    }

    pub(crate) fn require(&self, permission: Permission) -> ServiceResult<()> {
        if self.allows(permission) {
            Ok(())
        } else {
            Err(ServiceError::permission_denied(format!(
                "You do not have the \"{}\" permission in this community",
                permission.name()
            )))
        }
    }
}

/// Resolves the caller's membership, rejecting non-members and banned members.
pub(crate) async fn member_context(
    state: &AppState,
    community: CommunityRecord,
    user_id: UserId,
) -> ServiceResult<MemberContext> {
    let membership = find_membership(state, community.id, user_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("You are not a member of this community"))?;
    if membership.status == MembershipStatus::Banned {
        return Err(ServiceError::permission_denied(
            "You are banned from this community",
        ));
    }
    let membership = reconcile_membership(state, &community, membership).await?;
    Ok(MemberContext {
        community,
        membership,
    })
}

pub(crate) async fn find_membership(
    state: &AppState,
    community_id: CommunityId,
    user_id: UserId,
) -> ServiceResult<Option<MembershipRecord>> {
    Ok(state
        .store
        .memberships
        .find_one(&membership_filter(community_id, user_id))
        .await?)
}

fn stale_grants(community: &CommunityRecord, membership: &MembershipRecord) -> usize {
    membership
        .roles
        .values()
        .filter(|role| !community.holds_role(role))
        .count()
}

/// Strips grants of roles that were removed (or removed and re-added) since
/// they were granted. Finishes any cascade a removal left incomplete.
pub(crate) async fn reconcile_membership(
    state: &AppState,
    community: &CommunityRecord,
    membership: MembershipRecord,
) -> ServiceResult<MembershipRecord> {
    if stale_grants(community, &membership) == 0 {
        return Ok(membership);
    }
    let stored = update_with_retry(
        &state.store.memberships,
        &Filter::by_id(membership.id),
        "Membership not found",
        |current: &mut MembershipRecord| {
            current.roles.retain(|_, role| community.holds_role(role));
            Ok(())
        },
    )
    .await?;
    tracing::info!(
        event = "membership.reconcile",
        community_id = %community.id,
        user_id = %stored.user_id
    );
    Ok(stored)
}

/// Removes `role` from every membership of the community that still holds
/// this exact role. Returns how many memberships changed.
pub(crate) async fn cascade_role_removal(
    state: &AppState,
    community_id: CommunityId,
    role: &Role,
) -> ServiceResult<usize> {
    let holders = state
        .store
        .memberships
        .find_many(
            &(Filter::eq("community_id", community_id)
                & Filter::has_key("roles", role.name.as_str())),
            &FindOptions::default(),
        )
        .await?;
    let mut stripped = 0;
    for holder in holders {
        // Same name, different identity: a role re-added after an earlier removal.
        if !holder.roles.get(&role.name).is_some_and(|held| held.id == role.id) {
            continue;
        }
        let mut removed = false;
        let result = update_with_retry(
            &state.store.memberships,
            &Filter::by_id(holder.id),
            "Membership not found",
            |membership: &mut MembershipRecord| {
                removed = membership
                    .roles
                    .get(&role.name)
                    .is_some_and(|held| held.id == role.id);
                if removed {
                    membership.roles.remove(&role.name);
                }
                Ok(())
            },
        )
        .await;
        match result {
            Ok(_) if removed => stripped += 1,
            Ok(_) => {}
            // Left the community during the sweep.
            Err(error) if error.kind == FailureKind::NotFound => {}
            Err(error) => return Err(error),
        }
    }
    Ok(stripped)
}

#[cfg(test)]
pub(crate) mod test_support {
    use agora_core::{UserId, UserStatus};

    use crate::server::{
        core::{now_unix, AppConfig, AppState},
        records::UserRecord,
    };

    pub(crate) fn test_state() -> AppState {
        AppState::new(&AppConfig::default()).unwrap()
    }

    pub(crate) async fn seed_user(state: &AppState, username: &str) -> UserId {
        let user = UserRecord {
            id: UserId::new(),
            username: username.to_owned(),
            email: format!("{username}@example.test"),
            password_hash: String::new(),
            status: UserStatus::Active,
            bio: String::new(),
            avatar: None,
            created_at_unix: now_unix(),
            version: 0,
        };
        state.store.users.add(user).await.unwrap().id
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use agora_core::{
        CommunityId, CommunityStatus, CommunityVisibility, MembershipId, MembershipStatus,
        Permission, PermissionSet, Role, RoleName, UserId,
    };

    use super::{
        cascade_role_removal, member_context, test_support::test_state, update_with_retry,
    };
    use crate::server::{
        errors::FailureKind,
        permissions::{member_role, owner_role},
        records::{CommunityRecord, MembershipRecord},
        store::{Filter, FindOptions},
    };

    fn community_with(roles: &[Role]) -> CommunityRecord {
        CommunityRecord {
            id: CommunityId::new(),
            name: "Lab".to_owned(),
            description: String::new(),
            image: None,
            banner: None,
            status: CommunityStatus::Active,
            visibility: CommunityVisibility::Public,
            owner_id: UserId::new(),
            members_count: 1,
            roles: roles
                .iter()
                .map(|role| (role.name.clone(), role.clone()))
                .collect(),
            created_at_unix: 0,
            updated_at_unix: 0,
            version: 0,
        }
    }

    fn membership_of(community: &CommunityRecord, user_id: UserId, roles: &[Role]) -> MembershipRecord {
        MembershipRecord {
            id: MembershipId::new(),
            user_id,
            community_id: community.id,
            status: MembershipStatus::Active,
            roles: roles
                .iter()
                .map(|role| (role.name.clone(), role.clone()))
                .collect::<BTreeMap<_, _>>(),
            joined_at_unix: 0,
            version: 0,
        }
    }

    fn moderator() -> Role {
        Role::new(
            RoleName::try_from("moderator").unwrap(),
            [Permission::CreateTextChannel].into_iter().collect::<PermissionSet>(),
        )
    }

    #[tokio::test]
    async fn stale_grants_are_ignored_and_stripped() {
        let state = test_state();
        let granted = moderator();
        let community = community_with(&[owner_role(), member_role()]);
        let user_id = UserId::new();
        state
            .store
            .memberships
            .add(membership_of(&community, user_id, &[member_role(), granted]))
            .await
            .unwrap();

        let context = member_context(&state, community, user_id).await.unwrap();
        assert!(!context.allows(Permission::CreateTextChannel));
        assert!(!context
            .membership
            .roles
            .contains_key(&RoleName::try_from("Moderator").unwrap()));
        assert_eq!(context.membership.version, 2);
    }

    #[test]
    fn readded_role_does_not_revive_old_grants() {
        let old = moderator();
        let mut readded = moderator();
        readded.permissions.insert(Permission::GiveRole);
        let community = community_with(&[readded]);
        let context = super::MemberContext {
            membership: membership_of(&community, UserId::new(), &[old]),
            community,
        };
        assert!(!context.allows(Permission::CreateTextChannel));
        assert_eq!(
            context.require(Permission::GiveRole).unwrap_err().kind,
            FailureKind::PermissionDenied
        );
    }

    #[tokio::test]
    async fn banned_members_are_denied() {
        let state = test_state();
        let community = community_with(&[member_role()]);
        let user_id = UserId::new();
        let mut membership = membership_of(&community, user_id, &[member_role()]);
        membership.status = MembershipStatus::Banned;
        state.store.memberships.add(membership).await.unwrap();

        let error = member_context(&state, community.clone(), user_id)
            .await
            .unwrap_err();
        assert_eq!(error.kind, FailureKind::PermissionDenied);

        let stranger = member_context(&state, community, UserId::new())
            .await
            .unwrap_err();
        assert_eq!(stranger.kind, FailureKind::NotFound);
    }

    #[tokio::test]
    async fn cascade_only_touches_the_target_community() {
        let state = test_state();
        let role = moderator();
        let here = community_with(&[role.clone()]);
        let elsewhere_role = moderator();
        let elsewhere = community_with(&[elsewhere_role.clone()]);
        let holder = UserId::new();
        state
            .store
            .memberships
            .add(membership_of(&here, holder, &[role.clone()]))
            .await
            .unwrap();
        state
            .store
            .memberships
            .add(membership_of(&elsewhere, holder, &[elsewhere_role]))
            .await
            .unwrap();

        let stripped = cascade_role_removal(&state, here.id, &role).await.unwrap();
        assert_eq!(stripped, 1);

        let remaining = state
            .store
            .memberships
            .find_many(&Filter::has_key("roles", "Moderator"), &FindOptions::default())
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].community_id, elsewhere.id);
    }

    #[tokio::test]
    async fn update_with_retry_reports_missing_documents() {
        let state = test_state();
        let error = update_with_retry(
            &state.store.memberships,
            &Filter::by_id(MembershipId::new()),
            "Membership not found",
            |_membership: &mut MembershipRecord| Ok(()),
        )
        .await
        .unwrap_err();
        assert_eq!(error.kind, FailureKind::NotFound);
        assert_eq!(error.message, "Membership not found");
    }

    #[tokio::test]
    async fn cascade_skips_holders_of_another_identity() {
        let state = test_state();
        let removed = moderator();
        let community = community_with(&[removed.clone()]);
        let stored = state
            .store
            .memberships
            .add(membership_of(&community, UserId::new(), &[moderator()]))
            .await
            .unwrap();

        let stripped = cascade_role_removal(&state, community.id, &removed)
            .await
            .unwrap();
        assert_eq!(stripped, 0);
        let untouched = state
            .store
            .memberships
            .find_one(&Filter::by_id(stored.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(untouched.version, stored.version);
        assert_eq!(untouched.roles.len(), 1);
    }

    #[tokio::test]
    async fn update_with_retry_gives_up_as_a_conflict() {
        let state = test_state();
        let community = community_with(&[member_role()]);
        let stored = state
            .store
            .memberships
            .add(membership_of(&community, UserId::new(), &[member_role()]))
            .await
            .unwrap();

        let mut attempts = 0;
        let error = update_with_retry(
            &state.store.memberships,
            &Filter::by_id(stored.id),
            "Membership not found",
            |membership: &mut MembershipRecord| {
                attempts += 1;
                // A stale version makes every swap lose.
                membership.version += 1;
                Ok(())
            },
        )
        .await
        .unwrap_err();
        assert_eq!(error.kind, FailureKind::Conflict);
        assert_eq!(attempts, super::MAX_UPDATE_ATTEMPTS);

        let unchanged = state
            .store
            .memberships
            .find_one(&Filter::by_id(stored.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unchanged.version, stored.version);
    }
}
