use std::collections::BTreeMap;

use agora_core::{
    ChannelId, ChannelKind, ChannelStatus, CommunityId, CommunityName, CommunityStatus,
    CommunityVisibility, MembershipId, MembershipStatus, Permission, RoleName, UserId,
};

use super::{
    catalog_role, find_membership, load_active_user, load_community, member_context,
    require_active_community, update_with_retry,
};
use crate::server::{
    core::{now_unix, AppState, AuthContext},
    errors::{Outcome, ServiceError, ServiceResult},
    files::{StoragePath, StoredFile},
    permissions::{member_role, owner_role},
    records::{ChannelRecord, CommunityRecord, MembershipRecord},
    store::{Filter, FindOptions, SortDirection},
    types::{CommunityResponse, MemberResponse},
};

#[derive(Debug)]
pub(crate) struct NewCommunity {
    pub(crate) name: CommunityName,
    pub(crate) description: String,
    pub(crate) visibility: CommunityVisibility,
    pub(crate) image: Option<Vec<u8>>,
    pub(crate) banner: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
pub(crate) struct CommunityChanges {
    pub(crate) name: Option<CommunityName>,
    pub(crate) description: Option<String>,
    pub(crate) visibility: Option<CommunityVisibility>,
    pub(crate) image: Option<Vec<u8>>,
    pub(crate) banner: Option<Vec<u8>>,
}

/// Only active memberships of communities that still exist count; bans and
/// deleted communities release their slot.
async fn require_membership_quota(state: &AppState, user_id: UserId) -> ServiceResult<()> {
    let memberships = state
        .store
        .memberships
        .find_many(
            &(Filter::eq("user_id", user_id) & Filter::eq("status", MembershipStatus::Active)),
            &FindOptions::default(),
        )
        .await?;
    let mut joined = 0_usize;
    for membership in memberships {
        let live = state
            .store
            .communities
            .exists(
                &(Filter::by_id(membership.community_id)
                    & Filter::ne("status", CommunityStatus::Deleted)),
            )
            .await?;
        if live {
            joined += 1;
        }
    }
    let limit = state.runtime.max_communities_per_user;
    if joined >= limit {
        return Err(ServiceError::invalid_state(format!(
            "You have reached the quota of {limit} communities"
        )));
    }
    Ok(())
}

fn default_channel(community_id: CommunityId, index: u32, title: &str, kind: ChannelKind) -> ChannelRecord {
    let now = now_unix();
    ChannelRecord {
        id: ChannelId::new(),
        community_id,
        index,
        title: title.to_owned(),
        description: String::new(),
        kind,
        status: ChannelStatus::Active,
        created_at_unix: now,
        updated_at_unix: now,
        version: 0,
    }
}

async fn store_artwork(
    state: &AppState,
    bytes: Option<Vec<u8>>,
    hint: StoragePath,
) -> ServiceResult<Option<String>> {
    match bytes {
        Some(bytes) => Ok(Some(state.files.save(bytes, hint).await?)),
        None => Ok(None),
    }
}

pub(crate) async fn create_community(
    state: &AppState,
    auth: AuthContext,
    command: NewCommunity,
) -> Outcome<CommunityResponse> {
    Outcome::settle(
        "community.create",
        "Community created",
        create_community_inner(state, auth, command).await,
    )
}

async fn create_community_inner(
    state: &AppState,
    auth: AuthContext,
    command: NewCommunity,
) -> ServiceResult<CommunityResponse> {
    load_active_user(state, auth.user_id).await?;
    require_membership_quota(state, auth.user_id).await?;

    let community_id = CommunityId::new();
    let image = store_artwork(state, command.image, StoragePath::CommunityImage(community_id)).await?;
    let banner =
        match store_artwork(state, command.banner, StoragePath::CommunityBanner(community_id)).await {
            Ok(banner) => banner,
            Err(error) => {
                if let Some(image) = &image {
                    state.files.delete(image).await;
                }
                return Err(error);
            }
        };

    let owner = owner_role();
    let member = member_role();
    let now = now_unix();
    let community = CommunityRecord {
        id: community_id,
        name: command.name.into_inner(),
        description: command.description,
        image,
        banner,
        status: CommunityStatus::Active,
        visibility: command.visibility,
        owner_id: auth.user_id,
        members_count: 1,
        roles: BTreeMap::from([
            (owner.name.clone(), owner.clone()),
            (member.name.clone(), member),
        ]),
        created_at_unix: now,
        updated_at_unix: now,
        version: 0,
    };
    let community = state.store.communities.add(community).await?;

    state
        .store
        .channels
        .add_many(vec![
            default_channel(community_id, 0, "General Text", ChannelKind::Text),
            default_channel(community_id, 1, "General Voice", ChannelKind::Voice),
        ])
        .await?;

    state
        .store
        .memberships
        .add(MembershipRecord {
            id: MembershipId::new(),
            user_id: auth.user_id,
            community_id,
            status: MembershipStatus::Active,
            roles: BTreeMap::from([(owner.name.clone(), owner)]),
            joined_at_unix: now,
            version: 0,
        })
        .await?;

    tracing::info!(
        event = "community.create",
        community_id = %community_id,
        user_id = %auth.user_id
    );
    Ok(CommunityResponse::from(&community))
}

pub(crate) async fn get_community(
    state: &AppState,
    community_id: CommunityId,
) -> Outcome<CommunityResponse> {
    let result: ServiceResult<_> = async {
        let community = load_community(state, community_id).await?;
        if community.status == CommunityStatus::Deleted {
            return Err(ServiceError::not_found("Community not found"));
        }
        Ok(CommunityResponse::from(&community))
    }
    .await;
    Outcome::settle("community.get", "Community found", result)
}

pub(crate) async fn list_my_communities(
    state: &AppState,
    auth: AuthContext,
) -> Outcome<Vec<CommunityResponse>> {
    let result: ServiceResult<_> = async {
        let memberships = state
            .store
            .memberships
            .find_many(
                &(Filter::eq("user_id", auth.user_id)
                    & Filter::eq("status", MembershipStatus::Active)),
                &FindOptions::default().sorted_by("joined_at_unix", SortDirection::Ascending),
            )
            .await?;
        let mut communities = Vec::with_capacity(memberships.len());
        for membership in memberships {
            let community = state
                .store
                .communities
                .find_one(&Filter::by_id(membership.community_id))
                .await?;
            if let Some(community) = community.filter(|c| c.status != CommunityStatus::Deleted) {
                communities.push(CommunityResponse::from(&community));
            }
        }
        Ok(communities)
    }
    .await;
    Outcome::settle("community.list_mine", "Communities listed", result)
}

pub(crate) async fn update_community(
    state: &AppState,
    auth: AuthContext,
    community_id: CommunityId,
    changes: CommunityChanges,
) -> Outcome<CommunityResponse> {
    Outcome::settle(
        "community.update",
        "Community updated",
        update_community_inner(state, auth, community_id, changes).await,
    )
}

async fn update_community_inner(
    state: &AppState,
    auth: AuthContext,
    community_id: CommunityId,
    changes: CommunityChanges,
) -> ServiceResult<CommunityResponse> {
    let community = load_community(state, community_id).await?;
    require_active_community(&community)?;
    let context = member_context(state, community, auth.user_id).await?;
    context.require(Permission::UpdateCommunity)?;

    let image = store_artwork(state, changes.image, StoragePath::CommunityImage(community_id)).await?;
    let banner = store_artwork(state, changes.banner, StoragePath::CommunityBanner(community_id)).await?;
    let mut replaced = Vec::new();
    let result = update_with_retry(
        &state.store.communities,
        &Filter::by_id(community_id),
        "Community not found",
        |community: &mut CommunityRecord| {
            replaced.clear();
            if let Some(name) = &changes.name {
                community.name = name.as_str().to_owned();
            }
            if let Some(description) = &changes.description {
                community.description.clone_from(description);
            }
            if let Some(visibility) = changes.visibility {
                community.visibility = visibility;
            }
            if let Some(image) = &image {
                replaced.extend(community.image.replace(image.clone()));
            }
            if let Some(banner) = &banner {
                replaced.extend(community.banner.replace(banner.clone()));
            }
            community.updated_at_unix = now_unix();
            Ok(())
        },
    )
    .await;

    match result {
        Ok(community) => {
            for stale in &replaced {
                state.files.delete(stale).await;
            }
            Ok(CommunityResponse::from(&community))
        }
        Err(error) => {
            for fresh in image.iter().chain(banner.iter()) {
                state.files.delete(fresh).await;
            }
            Err(error)
        }
    }
}

pub(crate) async fn join_community(
    state: &AppState,
    auth: AuthContext,
    community_id: CommunityId,
) -> Outcome<MemberResponse> {
    Outcome::settle(
        "community.join",
        "Joined community",
        join_community_inner(state, auth, community_id).await,
    )
}

async fn join_community_inner(
    state: &AppState,
    auth: AuthContext,
    community_id: CommunityId,
) -> ServiceResult<MemberResponse> {
    load_active_user(state, auth.user_id).await?;
    let community = load_community(state, community_id).await?;
    require_active_community(&community)?;
    if find_membership(state, community_id, auth.user_id)
        .await?
        .is_some()
    {
        return Err(ServiceError::conflict(
            "You are already a member of this community",
        ));
    }
    require_membership_quota(state, auth.user_id).await?;

    let member = catalog_role(&community, &RoleName::member())?;
    let membership = state
        .store
        .memberships
        .add(MembershipRecord {
            id: MembershipId::new(),
            user_id: auth.user_id,
            community_id,
            status: MembershipStatus::Active,
            roles: BTreeMap::from([(member.name.clone(), member)]),
            joined_at_unix: now_unix(),
            version: 0,
        })
        .await?;

    update_with_retry(
        &state.store.communities,
        &Filter::by_id(community_id),
        "Community not found",
        |community: &mut CommunityRecord| {
            community.members_count += 1;
            Ok(())
        },
    )
    .await?;
    Ok(MemberResponse::from(&membership))
}

pub(crate) async fn leave_community(
    state: &AppState,
    auth: AuthContext,
    community_id: CommunityId,
) -> Outcome<()> {
    Outcome::settle(
        "community.leave",
        "Left community",
        leave_community_inner(state, auth, community_id).await,
    )
}

async fn leave_community_inner(
    state: &AppState,
    auth: AuthContext,
    community_id: CommunityId,
) -> ServiceResult<()> {
    load_community(state, community_id).await?;
    let membership = find_membership(state, community_id, auth.user_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("You are not a member of this community"))?;
    if membership.status == MembershipStatus::Banned {
        return Err(ServiceError::permission_denied(
            "You are banned from this community",
        ));
    }

    state
        .store
        .memberships
        .remove(&Filter::by_id(membership.id))
        .await?;

    let owner_left = membership.is_owner();
    update_with_retry(
        &state.store.communities,
        &Filter::by_id(community_id),
        "Community not found",
        |community: &mut CommunityRecord| {
            community.members_count = community.members_count.saturating_sub(1);
            if owner_left {
                community.status = CommunityStatus::Deleted;
                community.updated_at_unix = now_unix();
            }
            Ok(())
        },
    )
    .await?;
    if owner_left {
        tracing::warn!(
            event = "community.leave",
            community_id = %community_id,
            user_id = %auth.user_id,
            "owner left; community deleted"
        );
    }
    Ok(())
}

pub(crate) async fn ban_member(
    state: &AppState,
    auth: AuthContext,
    community_id: CommunityId,
    member_id: UserId,
) -> Outcome<MemberResponse> {
    Outcome::settle(
        "community.ban",
        "Member banned",
        set_member_status(state, auth, community_id, member_id, MembershipStatus::Banned).await,
    )
}

pub(crate) async fn unban_member(
    state: &AppState,
    auth: AuthContext,
    community_id: CommunityId,
    member_id: UserId,
) -> Outcome<MemberResponse> {
    Outcome::settle(
        "community.unban",
        "Member unbanned",
        set_member_status(state, auth, community_id, member_id, MembershipStatus::Active).await,
    )
}

async fn set_member_status(
    state: &AppState,
    auth: AuthContext,
    community_id: CommunityId,
    member_id: UserId,
    status: MembershipStatus,
) -> ServiceResult<MemberResponse> {
    let community = load_community(state, community_id).await?;
    require_active_community(&community)?;
    let context = member_context(state, community, auth.user_id).await?;
    context.require(Permission::BanAndUnban)?;

    let target = find_membership(state, community_id, member_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Member not found"))?;
    let updated = update_with_retry(
        &state.store.memberships,
        &Filter::by_id(target.id),
        "Member not found",
        |membership: &mut MembershipRecord| {
            if membership.is_owner() {
                return Err(ServiceError::permission_denied(
                    "The community owner cannot be banned",
                ));
            }
            if membership.status == status {
                return Err(ServiceError::conflict(match status {
                    MembershipStatus::Banned => "Member is already banned",
                    MembershipStatus::Active => "Member is not banned",
                }));
            }
            membership.status = status;
            Ok(())
        },
    )
    .await?;
    Ok(MemberResponse::from(&updated))
}

pub(crate) async fn list_members(
    state: &AppState,
    auth: AuthContext,
    community_id: CommunityId,
) -> Outcome<Vec<MemberResponse>> {
    let result: ServiceResult<_> = async {
        let community = load_community(state, community_id).await?;
        member_context(state, community, auth.user_id).await?;
        let members = state
            .store
            .memberships
            .find_many(
                &Filter::eq("community_id", community_id),
                &FindOptions::default().sorted_by("joined_at_unix", SortDirection::Ascending),
            )
            .await?;
        Ok(members.iter().map(MemberResponse::from).collect())
    }
    .await;
    Outcome::settle("community.members", "Members listed", result)
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Artwork {
    Image,
    Banner,
}

pub(crate) async fn artwork_file(
    state: &AppState,
    community_id: CommunityId,
    artwork: Artwork,
) -> ServiceResult<StoredFile> {
    let community = load_community(state, community_id).await?;
    let stored = match artwork {
        Artwork::Image => community.image,
        Artwork::Banner => community.banner,
    };
    let Some(stored) = stored else {
        return Err(ServiceError::not_found("Community has no such artwork"));
    };
    state.files.load(&stored).await
}
