use agora_core::{UserId, UserStatus, Username};

use super::update_with_retry;
use crate::server::{
    auth::{hash_password, issue_access_token, verify_password},
    core::{now_unix, AppState, AuthContext},
    errors::{AuthFailure, Outcome, ServiceError, ServiceResult},
    files::{StoragePath, StoredFile},
    records::UserRecord,
    store::{Filter, StoreError},
    types::{AuthResponse, UserResponse},
};

#[derive(Debug, Default)]
pub(crate) struct ProfileChanges {
    pub(crate) bio: Option<String>,
    pub(crate) avatar: Option<Vec<u8>>,
}

pub(crate) async fn register(
    state: &AppState,
    username: Username,
    email: String,
    password: &str,
) -> Outcome<UserResponse> {
    let result: ServiceResult<_> = async {
        let password_hash = hash_password(password)
            .map_err(|error| ServiceError::unexpected(error.to_string()))?;
        let user = UserRecord {
            id: UserId::new(),
            username: username.as_str().to_owned(),
            email,
            password_hash,
            status: UserStatus::Active,
            bio: String::new(),
            avatar: None,
            created_at_unix: now_unix(),
            version: 0,
        };
        match state.store.users.add(user).await {
            Ok(user) => Ok(UserResponse::from(&user)),
            Err(StoreError::Duplicate) => {
                Err(ServiceError::conflict("Username is already taken"))
            }
            Err(error) => Err(error.into()),
        }
    }
    .await;
    Outcome::settle("user.register", "User registered", result)
}

/// Exchanges credentials for an access token. Unknown users still pay for a
/// hash verification so timing does not reveal which usernames exist.
pub(crate) async fn login(
    state: &AppState,
    username: &str,
    password: &str,
) -> Result<AuthResponse, AuthFailure> {
    let user = state
        .store
        .users
        .find_one(&Filter::eq("username", username))
        .await
        .map_err(|error| {
            tracing::error!(event = "auth.login", error = %error);
            AuthFailure::Internal
        })?;
    let Some(user) = user else {
        let _ = verify_password(&state.dummy_password_hash, password);
        tracing::warn!(event = "auth.login", outcome = "unknown_user");
        return Err(AuthFailure::Unauthorized);
    };
    if !verify_password(&user.password_hash, password) {
        tracing::warn!(event = "auth.login", outcome = "bad_password", user_id = %user.id);
        return Err(AuthFailure::Unauthorized);
    }
    if user.status != UserStatus::Active {
        tracing::warn!(event = "auth.login", outcome = "inactive", user_id = %user.id);
        return Err(AuthFailure::Unauthorized);
    }

    let access_token = issue_access_token(state, user.id).map_err(|error| {
        tracing::error!(event = "auth.login", error = %error);
        AuthFailure::Internal
    })?;
    tracing::info!(event = "auth.login", outcome = "ok", user_id = %user.id);
    Ok(AuthResponse {
        access_token,
        token_type: "Bearer",
        expires_in_secs: state.runtime.access_token_ttl.as_secs(),
        user_id: user.id,
    })
}

async fn load_user(state: &AppState, user_id: UserId) -> ServiceResult<UserRecord> {
    state
        .store
        .users
        .find_one(&Filter::by_id(user_id))
        .await?
        .ok_or_else(|| ServiceError::not_found("User not found"))
}

pub(crate) async fn get_user(state: &AppState, user_id: UserId) -> Outcome<UserResponse> {
    let result = load_user(state, user_id)
        .await
        .map(|user| UserResponse::from(&user));
    Outcome::settle("user.get", "User found", result)
}

pub(crate) async fn update_user(
    state: &AppState,
    auth: AuthContext,
    user_id: UserId,
    changes: ProfileChanges,
) -> Outcome<UserResponse> {
    Outcome::settle(
        "user.update",
        "Profile updated",
        update_user_inner(state, auth, user_id, changes).await,
    )
}

async fn update_user_inner(
    state: &AppState,
    auth: AuthContext,
    user_id: UserId,
    changes: ProfileChanges,
) -> ServiceResult<UserResponse> {
    if auth.user_id != user_id {
        return Err(ServiceError::permission_denied(
            "You can only update your own profile",
        ));
    }
    load_user(state, user_id).await?;
    let avatar = match changes.avatar {
        Some(bytes) => Some(state.files.save(bytes, StoragePath::UserAvatar(user_id)).await?),
        None => None,
    };

    let mut previous = None;
    let result = update_with_retry(
        &state.store.users,
        &Filter::by_id(user_id),
        "User not found",
        |user: &mut UserRecord| {
            if let Some(bio) = &changes.bio {
                user.bio.clone_from(bio);
            }
            previous = match &avatar {
                Some(avatar) => user.avatar.replace(avatar.clone()),
                None => None,
            };
            Ok(())
        },
    )
    .await;
    match result {
        Ok(user) => {
            if let Some(previous) = previous {
                state.files.delete(&previous).await;
            }
            Ok(UserResponse::from(&user))
        }
        Err(error) => {
            if let Some(avatar) = &avatar {
                state.files.delete(avatar).await;
            }
            Err(error)
        }
    }
}

pub(crate) async fn avatar_file(state: &AppState, user_id: UserId) -> ServiceResult<StoredFile> {
    let user = load_user(state, user_id).await?;
    let Some(avatar) = user.avatar else {
        return Err(ServiceError::not_found("User has no avatar"));
    };
    state.files.load(&avatar).await
}
