use agora_core::{CommunityId, RoleName, UserId};
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};

use super::parse_id;
use crate::server::{
    auth::authenticate,
    core::AppState,
    domain::{
        add_role as create_role, get_community_roles as roles_of, grant_role as grant,
        remove_role as delete_role, revoke_role as revoke,
    },
    errors::{AuthFailure, Outcome},
    permissions::list_permission_catalog,
    types::{
        CommunityPath, CreateRoleRequest, MemberResponse, MemberRolePath, PermissionEntryResponse,
        RolePath, RoleResponse,
    },
};

fn role_name(raw: String) -> Result<RoleName, AuthFailure> {
    RoleName::try_from(raw).map_err(|_| AuthFailure::InvalidRequest)
}

pub(crate) async fn list_permissions(
    State(state): State<AppState>,
) -> Outcome<Vec<PermissionEntryResponse>> {
    let result = list_permission_catalog(&state)
        .await
        .map(|entries| entries.into_iter().map(PermissionEntryResponse::from).collect());
    Outcome::settle("permissions.list", "Permissions listed", result)
}

pub(crate) async fn get_community_roles(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<CommunityPath>,
) -> Result<Outcome<Vec<RoleResponse>>, AuthFailure> {
    authenticate(&state, &headers).await?;
    let community_id: CommunityId = parse_id(path.community_id)?;
    Ok(roles_of(&state, community_id).await)
}

pub(crate) async fn add_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<CommunityPath>,
    Json(payload): Json<CreateRoleRequest>,
) -> Result<Outcome<RoleResponse>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    let community_id: CommunityId = parse_id(path.community_id)?;
    let name = role_name(payload.name)?;
    Ok(create_role(&state, auth, community_id, name, payload.permissions).await)
}

pub(crate) async fn remove_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<RolePath>,
) -> Result<Outcome<()>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    let community_id: CommunityId = parse_id(path.community_id)?;
    let name = role_name(path.role_name)?;
    Ok(delete_role(&state, auth, community_id, name).await)
}

pub(crate) async fn grant_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<MemberRolePath>,
) -> Result<Outcome<MemberResponse>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    let community_id: CommunityId = parse_id(path.community_id)?;
    let member_id: UserId = parse_id(path.member_id)?;
    let name = role_name(path.role_name)?;
    Ok(grant(&state, auth, community_id, member_id, name).await)
}

pub(crate) async fn revoke_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<MemberRolePath>,
) -> Result<Outcome<MemberResponse>, AuthFailure> {
    let auth = authenticate(&state, &headers).await?;
    let community_id: CommunityId = parse_id(path.community_id)?;
    let member_id: UserId = parse_id(path.member_id)?;
    let name = role_name(path.role_name)?;
    Ok(revoke(&state, auth, community_id, member_id, name).await)
}
