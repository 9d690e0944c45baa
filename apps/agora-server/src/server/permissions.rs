use agora_core::{Permission, PermissionEntryId, PermissionSet, Role, RoleName};

use super::{
    core::AppState,
    errors::{ServiceError, ServiceResult},
    records::PermissionCatalogRecord,
    store::{Filter, FindOptions, SortDirection},
};

pub(crate) fn all_permissions() -> PermissionSet {
    PermissionSet::all()
}

pub(crate) fn default_member_permissions() -> PermissionSet {
    let mut permissions = PermissionSet::empty();
    permissions.insert(Permission::SendMessage);
    permissions.insert(Permission::JoinVoice);
    permissions
}

pub(crate) fn owner_role() -> Role {
    Role::new(RoleName::owner(), all_permissions())
}

pub(crate) fn member_role() -> Role {
    Role::new(RoleName::member(), default_member_permissions())
}

fn catalog_entry(permission: Permission) -> PermissionCatalogRecord {
    PermissionCatalogRecord {
        id: PermissionEntryId::new(),
        name: permission.name().to_owned(),
        description: permission.description().to_owned(),
        abilities: permission
            .abilities()
            .iter()
            .map(|ability| (*ability).to_owned())
            .collect(),
        version: 0,
    }
}

/// Loads the catalog vocabulary once per process; existing entries are kept.
pub(crate) async fn seed_permission_catalog(state: &AppState) -> ServiceResult<()> {
    state
        .catalog_seeded
        .get_or_try_init(|| async {
            let repo = &state.store.permission_catalog;
            let mut missing = Vec::new();
            for permission in Permission::ALL {
                if !repo
                    .exists(&Filter::eq("name", permission.name()))
                    .await?
                {
                    missing.push(catalog_entry(permission));
                }
            }
            let inserted = missing.len();
            if !missing.is_empty() {
                repo.add_many(missing).await?;
            }
            tracing::info!(event = "permissions.seed", inserted);
            Ok::<(), ServiceError>(())
        })
        .await?;
    Ok(())
}

pub(crate) async fn list_permission_catalog(
    state: &AppState,
) -> ServiceResult<Vec<PermissionCatalogRecord>> {
    seed_permission_catalog(state).await?;
    let mut entries = state
        .store
        .permission_catalog
        .find_many(
            &Filter::All,
            &FindOptions::default().sorted_by("name", SortDirection::Ascending),
        )
        .await?;
    entries.retain(|entry| Permission::from_name(&entry.name).is_some());
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use agora_core::Permission;

    use super::{
        default_member_permissions, list_permission_catalog, member_role, owner_role,
        seed_permission_catalog,
    };
    use crate::server::{
        core::{AppConfig, AppState},
        store::Filter,
    };

    #[test]
    fn preset_roles_carry_expected_permissions() {
        let owner = owner_role();
        assert!(owner.name.is_owner());
        assert!(Permission::ALL.iter().all(|p| owner.allows(*p)));

        let member = member_role();
        assert_eq!(member.permissions, default_member_permissions());
        assert!(member.allows(Permission::SendMessage));
        assert!(member.allows(Permission::JoinVoice));
        assert!(!member.allows(Permission::CreateTextChannel));
    }

    #[tokio::test]
    async fn catalog_seeds_once() {
        let state = AppState::new(&AppConfig::default()).unwrap();
        seed_permission_catalog(&state).await.unwrap();
        seed_permission_catalog(&state).await.unwrap();
        let total = state
            .store
            .permission_catalog
            .count(&Filter::All)
            .await
            .unwrap();
        assert_eq!(total, Permission::ALL.len() as u64);

        let listed = list_permission_catalog(&state).await.unwrap();
        assert!(listed.iter().any(|entry| entry.name == "Ban & Unban"));
        assert!(listed.windows(2).all(|pair| pair[0].name <= pair[1].name));
    }
}
