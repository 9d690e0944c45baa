use agora_core::{
    can_assign_role, can_mutate_role, CommunityId, CommunityStatus, MembershipStatus, Permission,
    PermissionSet, Role, RoleName, UserId,
};

use super::{
    cascade_role_removal, catalog_role, find_membership, load_community, member_context,
    require_active_community, update_with_retry, MemberContext,
};
use crate::server::{
    core::{AppState, AuthContext},
    errors::{Outcome, ServiceError, ServiceResult},
    records::{CommunityRecord, MembershipRecord},
    store::Filter,
    types::{MemberResponse, RoleResponse},
};

fn role_response(role: &Role) -> RoleResponse {
    RoleResponse {
        role_id: role.id,
        name: role.name.to_string(),
        permissions: role.permissions,
    }
}

fn reject_reserved(name: &RoleName) -> ServiceResult<()> {
    if can_mutate_role(name) {
        Ok(())
    } else {
        Err(ServiceError::permission_denied(format!(
            "Role \"{name}\" is reserved"
        )))
    }
}

fn reject_unassignable(name: &RoleName) -> ServiceResult<()> {
    if can_assign_role(name) {
        Ok(())
    } else {
        Err(ServiceError::permission_denied(
            "The Owner role cannot be granted or revoked",
        ))
    }
}

async fn gated_context(
    state: &AppState,
    auth: AuthContext,
    community_id: CommunityId,
    permission: Permission,
) -> ServiceResult<MemberContext> {
    let community = load_community(state, community_id).await?;
    require_active_community(&community)?;
    let context = member_context(state, community, auth.user_id).await?;
    context.require(permission)?;
    Ok(context)
}

pub(crate) async fn get_community_roles(
    state: &AppState,
    community_id: CommunityId,
) -> Outcome<Vec<RoleResponse>> {
    let result: ServiceResult<_> = async {
        let community = load_community(state, community_id).await?;
        if community.status == CommunityStatus::Deleted {
            return Err(ServiceError::not_found("Community not found"));
        }
        Ok(community.roles.values().map(role_response).collect())
    }
    .await;
    Outcome::settle("role.list", "Roles listed", result)
}

pub(crate) async fn add_role(
    state: &AppState,
    auth: AuthContext,
    community_id: CommunityId,
    name: RoleName,
    permissions: Vec<String>,
) -> Outcome<RoleResponse> {
    Outcome::settle(
        "role.add",
        "Role created",
        add_role_inner(state, auth, community_id, name, permissions).await,
    )
}

async fn add_role_inner(
    state: &AppState,
    auth: AuthContext,
    community_id: CommunityId,
    name: RoleName,
    permissions: Vec<String>,
) -> ServiceResult<RoleResponse> {
    reject_reserved(&name)?;
    gated_context(state, auth, community_id, Permission::CreateRole).await?;

    let mut granted = PermissionSet::empty();
    for permission in &permissions {
        let permission = Permission::from_name(permission).ok_or_else(|| {
            ServiceError::not_found(format!("Permission \"{permission}\" does not exist"))
        })?;
        granted.insert(permission);
    }
    let role = Role::new(name, granted);

    update_with_retry(
        &state.store.communities,
        &Filter::by_id(community_id),
        "Community not found",
        |community: &mut CommunityRecord| {
            if community.roles.contains_key(&role.name) {
                return Err(ServiceError::conflict(format!(
                    "Role \"{}\" already exists in this community",
                    role.name
                )));
            }
            community.roles.insert(role.name.clone(), role.clone());
            Ok(())
        },
    )
    .await?;
    tracing::info!(
        event = "role.add",
        community_id = %community_id,
        role = %role.name,
        permissions = ?role.permissions.names()
    );
    Ok(role_response(&role))
}

pub(crate) async fn remove_role(
    state: &AppState,
    auth: AuthContext,
    community_id: CommunityId,
    name: RoleName,
) -> Outcome<()> {
    Outcome::settle(
        "role.remove",
        "Role removed",
        remove_role_inner(state, auth, community_id, name).await,
    )
}

async fn remove_role_inner(
    state: &AppState,
    auth: AuthContext,
    community_id: CommunityId,
    name: RoleName,
) -> ServiceResult<()> {
    reject_reserved(&name)?;
    gated_context(state, auth, community_id, Permission::CreateRole).await?;

    let mut removed = None;
    update_with_retry(
        &state.store.communities,
        &Filter::by_id(community_id),
        "Community not found",
        |community: &mut CommunityRecord| {
            removed = Some(community.roles.remove(&name).ok_or_else(|| {
                ServiceError::not_found(format!("Role \"{name}\" does not exist in this community"))
            })?);
            Ok(())
        },
    )
    .await?;
    let Some(role) = removed else {
        return Err(ServiceError::unexpected("removed role was not captured"));
    };

    let stripped = cascade_role_removal(state, community_id, &role).await?;
    tracing::info!(
        event = "role.remove",
        community_id = %community_id,
        role = %role.name,
        stripped
    );
    Ok(())
}

pub(crate) async fn grant_role(
    state: &AppState,
    auth: AuthContext,
    community_id: CommunityId,
    member_id: UserId,
    name: RoleName,
) -> Outcome<MemberResponse> {
    Outcome::settle(
        "role.grant",
        "Role granted",
        change_grant(state, auth, community_id, member_id, name, Grant::Give).await,
    )
}

pub(crate) async fn revoke_role(
    state: &AppState,
    auth: AuthContext,
    community_id: CommunityId,
    member_id: UserId,
    name: RoleName,
) -> Outcome<MemberResponse> {
    Outcome::settle(
        "role.revoke",
        "Role revoked",
        change_grant(state, auth, community_id, member_id, name, Grant::Take).await,
    )
}

#[derive(Clone, Copy)]
enum Grant {
    Give,
    Take,
}

async fn change_grant(
    state: &AppState,
    auth: AuthContext,
    community_id: CommunityId,
    member_id: UserId,
    name: RoleName,
    grant: Grant,
) -> ServiceResult<MemberResponse> {
    reject_unassignable(&name)?;
    let context = gated_context(state, auth, community_id, Permission::GiveRole).await?;
    let role = catalog_role(&context.community, &name)?;

    let target = find_membership(state, community_id, member_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Member not found"))?;

    // Ban status is read inside the swap so a concurrent ban cannot slip past.
    let updated = update_with_retry(
        &state.store.memberships,
        &Filter::by_id(target.id),
        "Member not found",
        |membership: &mut MembershipRecord| {
            if membership.status == MembershipStatus::Banned {
                return Err(ServiceError::invalid_state("Member is banned"));
            }
            let holds = membership
                .roles
                .get(&role.name)
                .is_some_and(|held| held.id == role.id);
            match grant {
                Grant::Give if holds => Err(ServiceError::conflict(format!(
                    "Member already holds role \"{}\"",
                    role.name
                ))),
                Grant::Give => {
                    membership.roles.insert(role.name.clone(), role.clone());
                    Ok(())
                }
                Grant::Take if !holds => Err(ServiceError::not_found(format!(
                    "Member does not hold role \"{}\"",
                    role.name
                ))),
                Grant::Take => {
                    membership.roles.remove(&role.name);
                    Ok(())
                }
            }
        },
    )
    .await?;
    Ok(MemberResponse::from(&updated))
}

#[cfg(test)]
mod tests {
    use agora_core::{
        CommunityId, CommunityName, CommunityVisibility, Permission, RoleName, UserId,
    };

    use super::{add_role, get_community_roles, grant_role, remove_role, revoke_role};
    use crate::server::{
        core::{AppState, AuthContext},
        domain::{
            ban_member, create_community, find_membership, join_community, leave_community,
            load_community, member_context,
            test_support::{seed_user, test_state},
            NewCommunity,
        },
        errors::FailureKind,
    };

    fn name(raw: &str) -> RoleName {
        RoleName::try_from(raw).unwrap()
    }

    async fn community_with_guest(
        state: &AppState,
        tag: &str,
    ) -> (CommunityId, AuthContext, UserId) {
        let owner = seed_user(state, &format!("{tag}_owner")).await;
        let guest = seed_user(state, &format!("{tag}_guest")).await;
        let community_id = create_community(
            state,
            AuthContext { user_id: owner },
            NewCommunity {
                name: CommunityName::try_from("Lab".to_owned()).unwrap(),
                description: String::new(),
                visibility: CommunityVisibility::Public,
                image: None,
                banner: None,
            },
        )
        .await
        .into_result()
        .unwrap()
        .community_id;
        join_community(state, AuthContext { user_id: guest }, community_id).await;
        (community_id, AuthContext { user_id: owner }, guest)
    }

    #[tokio::test]
    async fn reserved_roles_are_protected_in_any_casing() {
        let state = test_state();
        let (community_id, owner, guest) = community_with_guest(&state, "lab").await;

        for raw in ["owner", "MEMBER", "Co-Owner"] {
            let outcome = remove_role(&state, owner, community_id, name(raw)).await;
            assert_eq!(outcome.failure(), Some(FailureKind::PermissionDenied), "{raw}");
        }
        let add = add_role(&state, owner, community_id, name("owner"), vec![]).await;
        assert_eq!(add.failure(), Some(FailureKind::PermissionDenied));
        let grant = grant_role(&state, owner, community_id, guest, name("oWnEr")).await;
        assert_eq!(grant.failure(), Some(FailureKind::PermissionDenied));

        let roles = get_community_roles(&state, community_id)
            .await
            .into_result()
            .unwrap();
        assert_eq!(roles.len(), 2);
    }

    #[tokio::test]
    async fn add_role_validates_name_and_permissions() {
        let state = test_state();
        let (community_id, owner, guest) = community_with_guest(&state, "lab").await;

        let created = add_role(
            &state,
            owner,
            community_id,
            name("moderator"),
            vec!["Create Text Channel".to_owned()],
        )
        .await
        .into_result()
        .unwrap();
        assert_eq!(created.name, "Moderator");

        let duplicate = add_role(&state, owner, community_id, name("MODERATOR"), vec![]).await;
        assert_eq!(duplicate.failure(), Some(FailureKind::Conflict));

        let unknown = add_role(
            &state,
            owner,
            community_id,
            name("helper"),
            vec!["Fly".to_owned()],
        )
        .await;
        assert_eq!(unknown.failure(), Some(FailureKind::NotFound));

        let denied = add_role(
            &state,
            AuthContext { user_id: guest },
            community_id,
            name("helper"),
            vec![],
        )
        .await;
        assert_eq!(denied.failure(), Some(FailureKind::PermissionDenied));
    }

    #[tokio::test]
    async fn grants_and_revokes_are_checked() {
        let state = test_state();
        let (community_id, owner, guest) = community_with_guest(&state, "lab").await;
        add_role(
            &state,
            owner,
            community_id,
            name("helper"),
            vec!["Remove Messages".to_owned()],
        )
        .await;

        let granted = grant_role(&state, owner, community_id, guest, name("HELPER"))
            .await
            .into_result()
            .unwrap();
        assert_eq!(granted.roles, vec!["Helper".to_owned(), "Member".to_owned()]);
        assert_eq!(
            grant_role(&state, owner, community_id, guest, name("helper"))
                .await
                .failure(),
            Some(FailureKind::Conflict)
        );
        assert_eq!(
            grant_role(&state, owner, community_id, guest, name("ghost"))
                .await
                .failure(),
            Some(FailureKind::NotFound)
        );
        assert_eq!(
            grant_role(&state, owner, community_id, UserId::new(), name("helper"))
                .await
                .failure(),
            Some(FailureKind::NotFound)
        );

        let self_grant = grant_role(
            &state,
            AuthContext { user_id: guest },
            community_id,
            guest,
            name("helper"),
        )
        .await;
        assert_eq!(self_grant.failure(), Some(FailureKind::PermissionDenied));

        assert!(revoke_role(&state, owner, community_id, guest, name("helper"))
            .await
            .is_success());
        assert_eq!(
            revoke_role(&state, owner, community_id, guest, name("helper"))
                .await
                .failure(),
            Some(FailureKind::NotFound)
        );
        // Member may be revoked explicitly even though it can never be deleted.
        assert!(revoke_role(&state, owner, community_id, guest, name("member"))
            .await
            .is_success());
    }

    #[tokio::test]
    async fn removal_cascades_within_one_community_only() {
        let state = test_state();
        let (here, owner, guest) = community_with_guest(&state, "here").await;
        let (elsewhere, other_owner, other_guest) = community_with_guest(&state, "there").await;
        let permissions = vec!["Create Text Channel".to_owned()];
        for (community_id, by, member) in [(here, owner, guest), (elsewhere, other_owner, other_guest)] {
            add_role(&state, by, community_id, name("moderator"), permissions.clone()).await;
            assert!(grant_role(&state, by, community_id, member, name("moderator"))
                .await
                .is_success());
        }

        assert!(remove_role(&state, owner, here, name("Moderator"))
            .await
            .is_success());
        let stripped = find_membership(&state, here, guest).await.unwrap().unwrap();
        assert!(!stripped.roles.contains_key(&name("moderator")));
        let untouched = find_membership(&state, elsewhere, other_guest)
            .await
            .unwrap()
            .unwrap();
        assert!(untouched.roles.contains_key(&name("moderator")));

        assert_eq!(
            remove_role(&state, owner, here, name("moderator")).await.failure(),
            Some(FailureKind::NotFound)
        );

        // Re-adding under the same name yields a new identity.
        add_role(&state, owner, here, name("moderator"), permissions).await;
        let community = load_community(&state, here).await.unwrap();
        let context = member_context(&state, community, guest).await.unwrap();
        assert!(!context.allows(Permission::CreateTextChannel));
    }

    #[tokio::test]
    async fn banned_members_cannot_receive_roles() {
        let state = test_state();
        let (community_id, owner, guest) = community_with_guest(&state, "lab").await;
        add_role(&state, owner, community_id, name("helper"), vec![]).await;
        assert!(ban_member(&state, owner, community_id, guest).await.is_success());

        let grant = grant_role(&state, owner, community_id, guest, name("helper")).await;
        assert_eq!(grant.failure(), Some(FailureKind::InvalidState));
        let held = find_membership(&state, community_id, guest)
            .await
            .unwrap()
            .unwrap();
        assert!(!held.roles.contains_key(&name("helper")));
    }

    #[tokio::test]
    async fn roles_of_a_deleted_community_are_not_found() {
        let state = test_state();
        let (community_id, owner, _) = community_with_guest(&state, "gone").await;
        assert!(leave_community(&state, owner, community_id).await.is_success());

        let roles = get_community_roles(&state, community_id).await;
        assert_eq!(roles.failure(), Some(FailureKind::NotFound));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_grants_to_one_member_are_never_lost() {
        let state = test_state();
        let (community_id, owner, guest) = community_with_guest(&state, "race").await;
        let names: Vec<String> = (0..12).map(|index| format!("Crew {index}")).collect();
        for raw in &names {
            assert!(add_role(&state, owner, community_id, name(raw), vec![])
                .await
                .is_success());
        }

        let tasks: Vec<_> = names
            .iter()
            .map(|raw| {
                let state = state.clone();
                let role = name(raw);
                tokio::spawn(async move {
                    (
                        role.clone(),
                        grant_role(&state, owner, community_id, guest, role).await,
                    )
                })
            })
            .collect();

        let mut granted = Vec::new();
        for task in tasks {
            let (role, outcome) = task.await.unwrap();
            match outcome.failure() {
                None => granted.push(role),
                Some(kind) => assert_eq!(kind, FailureKind::Conflict),
            }
        }
        assert!(!granted.is_empty());

        let held = find_membership(&state, community_id, guest)
            .await
            .unwrap()
            .unwrap();
        for role in &granted {
            assert!(held.roles.contains_key(role), "{role} was lost");
        }
        assert_eq!(held.roles.len(), granted.len() + 1);
    }
}
