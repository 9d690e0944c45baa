use std::{sync::Arc, time::Duration};

use anyhow::anyhow;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderName, StatusCode},
    middleware::map_response,
    response::Response,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use super::{
    core::{AppConfig, AppState},
    handlers::{
        accept_friend, add_channel, add_friend, add_message, add_private_message, add_role,
        ban_member, create_community, delete_channel, get_channel, get_channel_messages,
        get_community, get_community_banner, get_community_channels, get_community_image,
        get_community_roles, get_conversation, get_user, get_user_avatar, grant_role,
        join_community, leave_community, list_friends, list_members, list_my_communities,
        list_permissions, login, mutual_friends, register, remove_friend, remove_message,
        remove_private_message, remove_role, revoke_role, unban_member, update_channel,
        update_community, update_user,
    },
    metrics::record_rate_limit_hit,
    types::{health, metrics},
};

async fn count_rate_limited(response: Response) -> Response {
    if response.status() == StatusCode::TOO_MANY_REQUESTS {
        record_rate_limit_hit("http", "ip_rate_limit");
    }
    response
}

/// Build the axum router with global security middleware.
///
/// # Errors
/// Returns an error if configured limits are invalid or the store cannot be initialized.
pub fn build_router(config: &AppConfig) -> anyhow::Result<Router> {
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .period(Duration::from_secs(60))
            .burst_size(config.rate_limit_requests_per_minute)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow!("invalid governor configuration"))?,
    );
    let app_state = AppState::new(config)?;
    let request_id_header = HeaderName::from_static("x-request-id");
    let governor_layer = GovernorLayer::new(governor_config);

    Ok(Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/users/{user_id}", get(get_user).patch(update_user))
        .route("/users/{user_id}/avatar", get(get_user_avatar))
        .route("/permissions", get(list_permissions))
        .route("/communities", post(create_community))
        .route("/communities/mine", get(list_my_communities))
        .route(
            "/communities/{community_id}",
            get(get_community).patch(update_community),
        )
        .route("/communities/{community_id}/image", get(get_community_image))
        .route(
            "/communities/{community_id}/banner",
            get(get_community_banner),
        )
        .route("/communities/{community_id}/join", post(join_community))
        .route("/communities/{community_id}/leave", post(leave_community))
        .route("/communities/{community_id}/members", get(list_members))
        .route(
            "/communities/{community_id}/members/{member_id}/ban",
            post(ban_member).delete(unban_member),
        )
        .route(
            "/communities/{community_id}/roles",
            get(get_community_roles).post(add_role),
        )
        .route(
            "/communities/{community_id}/roles/{role_name}",
            delete(remove_role),
        )
        .route(
            "/communities/{community_id}/members/{member_id}/roles/{role_name}",
            post(grant_role).delete(revoke_role),
        )
        .route(
            "/communities/{community_id}/channels",
            get(get_community_channels).post(add_channel),
        )
        .route(
            "/channels/{channel_id}",
            get(get_channel).patch(update_channel).delete(delete_channel),
        )
        .route(
            "/channels/{channel_id}/messages",
            get(get_channel_messages).post(add_message),
        )
        .route("/messages/{message_id}", delete(remove_message))
        .route("/friends", get(list_friends))
        .route(
            "/friends/{user_id}",
            post(add_friend).delete(remove_friend),
        )
        .route("/friends/{user_id}/mutual", get(mutual_friends))
        .route(
            "/friends/requests/{request_id}/accept",
            post(accept_friend),
        )
        .route(
            "/conversations/{friend_id}/messages",
            get(get_conversation).post(add_private_message),
        )
        .route(
            "/private-messages/{message_id}",
            delete(remove_private_message),
        )
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
                .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    config.request_timeout,
                ))
                .layer(map_response(count_rate_limited))
                .layer(governor_layer),
        ))
}
