use std::collections::BTreeSet;

use agora_core::{FriendStatus, FriendshipId, UserId};

use super::update_with_retry;
use crate::server::{
    core::{now_unix, AppState, AuthContext},
    errors::{Outcome, ServiceError, ServiceResult},
    records::{FriendRecord, UserRecord},
    store::{Filter, FindOptions, SortDirection},
    types::{FriendResponse, UserResponse},
};

fn pair(user_id: UserId, friend_id: UserId) -> Filter {
    Filter::eq("user_id", user_id) & Filter::eq("friend_id", friend_id)
}

pub(crate) async fn add_friend(
    state: &AppState,
    auth: AuthContext,
    friend_id: UserId,
) -> Outcome<FriendResponse> {
    let result: ServiceResult<_> = async {
        if friend_id == auth.user_id {
            return Err(ServiceError::invalid_state("You cannot befriend yourself"));
        }
        if !state.store.users.exists(&Filter::by_id(friend_id)).await? {
            return Err(ServiceError::not_found("User not found"));
        }
        let friends = &state.store.friends;
        if friends.exists(&pair(auth.user_id, friend_id)).await?
            || friends.exists(&pair(friend_id, auth.user_id)).await?
        {
            return Err(ServiceError::conflict(
                "A friendship or invitation already exists",
            ));
        }
        let invite = friends
            .add(FriendRecord {
                id: FriendshipId::new(),
                user_id: auth.user_id,
                friend_id,
                status: FriendStatus::Invited,
                created_at_unix: now_unix(),
                version: 0,
            })
            .await?;
        Ok(FriendResponse::from(&invite))
    }
    .await;
    Outcome::settle("friend.add", "Friend invitation sent", result)
}

/// Accepts an invitation addressed to the caller and records the reverse edge.
pub(crate) async fn accept_friend(
    state: &AppState,
    auth: AuthContext,
    request_id: FriendshipId,
) -> Outcome<FriendResponse> {
    let result: ServiceResult<_> = async {
        let invite_filter = Filter::by_id(request_id)
            & Filter::eq("friend_id", auth.user_id)
            & Filter::eq("status", FriendStatus::Invited);
        let accepted = update_with_retry(
            &state.store.friends,
            &invite_filter,
            "Friend request not found",
            |invite: &mut FriendRecord| {
                invite.status = FriendStatus::Active;
                Ok(())
            },
        )
        .await?;
        let reverse = state
            .store
            .friends
            .add(FriendRecord {
                id: FriendshipId::new(),
                user_id: auth.user_id,
                friend_id: accepted.user_id,
                status: FriendStatus::Active,
                created_at_unix: now_unix(),
                version: 0,
            })
            .await?;
        Ok(FriendResponse::from(&reverse))
    }
    .await;
    Outcome::settle("friend.accept", "Friend request accepted", result)
}

pub(crate) async fn remove_friend(
    state: &AppState,
    auth: AuthContext,
    friend_id: UserId,
) -> Outcome<()> {
    let result: ServiceResult<_> = async {
        let friends = &state.store.friends;
        let removed = friends.remove(&pair(auth.user_id, friend_id)).await?
            + friends.remove(&pair(friend_id, auth.user_id)).await?;
        if removed == 0 {
            return Err(ServiceError::not_found("Friend not found"));
        }
        Ok(())
    }
    .await;
    Outcome::settle("friend.remove", "Friend removed", result)
}

/// The caller's outgoing edges of any status plus invitations waiting on them.
pub(crate) async fn list_friends(state: &AppState, auth: AuthContext) -> Outcome<Vec<FriendResponse>> {
    let result: ServiceResult<_> = async {
        let oldest_first =
            FindOptions::default().sorted_by("created_at_unix", SortDirection::Ascending);
        let mut records = state
            .store
            .friends
            .find_many(&Filter::eq("user_id", auth.user_id), &oldest_first)
            .await?;
        records.extend(
            state
                .store
                .friends
                .find_many(
                    &(Filter::eq("friend_id", auth.user_id)
                        & Filter::eq("status", FriendStatus::Invited)),
                    &oldest_first,
                )
                .await?,
        );
        Ok(records.iter().map(FriendResponse::from).collect())
    }
    .await;
    Outcome::settle("friend.list", "Friends listed", result)
}

async fn active_friend_ids(state: &AppState, user_id: UserId) -> ServiceResult<BTreeSet<UserId>> {
    let records = state
        .store
        .friends
        .find_many(
            &(Filter::eq("user_id", user_id) & Filter::eq("status", FriendStatus::Active)),
            &FindOptions::default(),
        )
        .await?;
    Ok(records.into_iter().map(|record| record.friend_id).collect())
}

pub(crate) async fn mutual_friends(
    state: &AppState,
    auth: AuthContext,
    other_id: UserId,
) -> Outcome<Vec<UserResponse>> {
    let result: ServiceResult<_> = async {
        if !state.store.users.exists(&Filter::by_id(other_id)).await? {
            return Err(ServiceError::not_found("User not found"));
        }
        let mine = active_friend_ids(state, auth.user_id).await?;
        let theirs = active_friend_ids(state, other_id).await?;
        let mut mutual = Vec::new();
        for user_id in mine.intersection(&theirs) {
            let user: Option<UserRecord> =
                state.store.users.find_one(&Filter::by_id(*user_id)).await?;
            mutual.extend(user.as_ref().map(UserResponse::from));
        }
        Ok(mutual)
    }
    .await;
    Outcome::settle("friend.mutual", "Mutual friends listed", result)
}

#[cfg(test)]
mod tests {
    use agora_core::{FriendStatus, FriendshipId, UserId};

    use super::{accept_friend, add_friend, list_friends, mutual_friends, remove_friend};
    use crate::server::{
        core::{AppState, AuthContext},
        domain::test_support::{seed_user, test_state},
        errors::FailureKind,
    };

    async fn befriend(state: &AppState, a: AuthContext, b: AuthContext) {
        let invite = add_friend(state, a, b.user_id).await.into_result().unwrap();
        assert!(accept_friend(state, b, invite.friendship_id)
            .await
            .is_success());
    }

    async fn user(state: &AppState, name: &str) -> AuthContext {
        AuthContext {
            user_id: seed_user(state, name).await,
        }
    }

    #[tokio::test]
    async fn invitations_are_validated_and_accepted_once() {
        let state = test_state();
        let ada = user(&state, "ada").await;
        let bob = user(&state, "bob").await;

        assert_eq!(
            add_friend(&state, ada, ada.user_id).await.failure(),
            Some(FailureKind::InvalidState)
        );
        assert_eq!(
            add_friend(&state, ada, UserId::new()).await.failure(),
            Some(FailureKind::NotFound)
        );

        let invite = add_friend(&state, ada, bob.user_id)
            .await
            .into_result()
            .unwrap();
        assert_eq!(invite.status, FriendStatus::Invited);
        assert_eq!(
            add_friend(&state, bob, ada.user_id).await.failure(),
            Some(FailureKind::Conflict)
        );

        let incoming = list_friends(&state, bob).await.into_result().unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].friendship_id, invite.friendship_id);

        assert_eq!(
            accept_friend(&state, ada, invite.friendship_id)
                .await
                .failure(),
            Some(FailureKind::NotFound)
        );
        assert!(accept_friend(&state, bob, invite.friendship_id)
            .await
            .is_success());
        assert_eq!(
            accept_friend(&state, bob, invite.friendship_id)
                .await
                .failure(),
            Some(FailureKind::NotFound)
        );
        assert_eq!(
            accept_friend(&state, bob, FriendshipId::new()).await.failure(),
            Some(FailureKind::NotFound)
        );

        let ada_view = list_friends(&state, ada).await.into_result().unwrap();
        assert_eq!(ada_view.len(), 1);
        assert_eq!(ada_view[0].status, FriendStatus::Active);
    }

    #[tokio::test]
    async fn removal_drops_both_directions() {
        let state = test_state();
        let ada = user(&state, "ada").await;
        let bob = user(&state, "bob").await;
        befriend(&state, ada, bob).await;

        assert!(remove_friend(&state, bob, ada.user_id).await.is_success());
        assert!(list_friends(&state, ada).await.into_result().unwrap().is_empty());
        assert!(list_friends(&state, bob).await.into_result().unwrap().is_empty());
        assert_eq!(
            remove_friend(&state, bob, ada.user_id).await.failure(),
            Some(FailureKind::NotFound)
        );
    }

    #[tokio::test]
    async fn mutual_friends_intersect_active_edges() {
        let state = test_state();
        let ada = user(&state, "ada").await;
        let bob = user(&state, "bob").await;
        let cy = user(&state, "cy").await;
        let dee = user(&state, "dee").await;
        befriend(&state, ada, cy).await;
        befriend(&state, bob, cy).await;
        befriend(&state, ada, dee).await;
        add_friend(&state, bob, dee.user_id).await;

        let mutual = mutual_friends(&state, ada, bob.user_id)
            .await
            .into_result()
            .unwrap();
        assert_eq!(mutual.len(), 1);
        assert_eq!(mutual[0].user_id, cy.user_id);
    }
}
