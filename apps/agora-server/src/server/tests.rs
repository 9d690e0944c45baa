#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::super::{core::AppConfig, router::build_router};

    const IP: &str = "203.0.113.40";

    fn test_app() -> Router {
        build_router(&AppConfig {
            rate_limit_requests_per_minute: 1_000,
            ..AppConfig::default()
        })
        .unwrap()
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Option<Value>) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", IP);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).ok())
    }

    async fn register_and_login_as(app: &Router, username: &str) -> (String, String) {
        let (status, _) = send(
            app,
            "POST",
            "/auth/register",
            None,
            Some(json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "super-secure-password",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            app,
            "POST",
            "/auth/login",
            None,
            Some(json!({"username": username, "password": "super-secure-password"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body = body.unwrap();
        (
            body["access_token"].as_str().unwrap().to_owned(),
            body["user_id"].as_str().unwrap().to_owned(),
        )
    }

    #[tokio::test]
    async fn health_is_public_and_request_ids_are_propagated() {
        let app = test_app();
        let request = Request::builder()
            .uri("/health")
            .header("x-forwarded-for", IP)
            .header("x-request-id", "req-123")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-request-id").unwrap(),
            "req-123"
        );
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts_and_login_failures_look_alike() {
        let app = test_app();
        register_and_login_as(&app, "router_dup").await;

        let (status, body) = send(
            &app,
            "POST",
            "/auth/register",
            None,
            Some(json!({
                "username": "router_dup",
                "email": "other@example.com",
                "password": "super-secure-password",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.unwrap()["success"], false);

        let (unknown_status, unknown_body) = send(
            &app,
            "POST",
            "/auth/login",
            None,
            Some(json!({"username": "nobody_here", "password": "super-secure-password"})),
        )
        .await;
        let (wrong_status, wrong_body) = send(
            &app,
            "POST",
            "/auth/login",
            None,
            Some(json!({"username": "router_dup", "password": "wrong-password-1"})),
        )
        .await;
        assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
        assert_eq!(unknown_body, wrong_body);
    }

    #[tokio::test]
    async fn malformed_registration_is_rejected_before_the_core() {
        let app = test_app();
        let (status, body) = send(
            &app,
            "POST",
            "/auth/register",
            None,
            Some(json!({"username": "x", "email": "x@example.com", "password": "super-secure-password"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.unwrap()["error"], "invalid_request");

        let (status, _) = send(
            &app,
            "POST",
            "/auth/register",
            None,
            Some(json!({"username": "valid_name", "email": "not-an-email", "password": "super-secure-password"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn protected_routes_require_a_bearer_token() {
        let app = test_app();
        let (status, body) = send(&app, "GET", "/communities/mine", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.unwrap()["error"], "invalid_credentials");

        let (status, _) = send(
            &app,
            "GET",
            "/communities/mine",
            Some("v4.local.garbage"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_path_ids_are_bad_requests() {
        let app = test_app();
        let (token, _) = register_and_login_as(&app, "router_ids").await;
        let (status, _) = send(&app, "GET", "/communities/not-a-ulid", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, "DELETE", "/messages/also-bad", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let channel = "/channels/01ARZ3NDEKTSV4RRFFQ69G5FAV/messages";
        let (status, _) = send(
            &app,
            "GET",
            &format!("{channel}?before=10&before_id=nope"),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(
            &app,
            "GET",
            &format!("{channel}?before_id=01ARZ3NDEKTSV4RRFFQ69G5FAV"),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn permission_catalog_lists_every_entry_in_name_order() {
        let app = test_app();
        let (status, body) = send(&app, "GET", "/permissions", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let body = body.unwrap();
        assert_eq!(body["success"], true);
        let names: Vec<&str> = body["result"]
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry["name"].as_str().unwrap())
            .collect();
        assert_eq!(names.len(), 10);
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        assert!(names.contains(&"Ban & Unban"));
    }

    #[tokio::test]
    async fn failure_kinds_map_to_status_codes() {
        let app = test_app();
        let (owner, _) = register_and_login_as(&app, "router_owner").await;
        let (guest, _) = register_and_login_as(&app, "router_guest").await;

        let (status, body) = send(
            &app,
            "POST",
            "/communities",
            Some(&owner),
            Some(json!({"name": "Router Hall"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let community_id = body.unwrap()["result"]["community_id"]
            .as_str()
            .unwrap()
            .to_owned();

        let (status, body) = send(
            &app,
            "POST",
            &format!("/communities/{community_id}/roles"),
            Some(&guest),
            Some(json!({"name": "Helper", "permissions": ["Send Message"]})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.unwrap()["success"], false);

        let (status, _) = send(
            &app,
            "POST",
            &format!("/communities/{community_id}/join"),
            Some(&guest),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app,
            "POST",
            &format!("/communities/{community_id}/roles"),
            Some(&guest),
            Some(json!({"name": "Helper", "permissions": ["Send Message"]})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.unwrap()["message"]
            .as_str()
            .unwrap()
            .contains("Create Role"));

        let (status, _) = send(
            &app,
            "POST",
            &format!("/communities/{community_id}/join"),
            Some(&guest),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn rate_limit_rejects_bursts_and_is_counted() {
        let app = build_router(&AppConfig {
            rate_limit_requests_per_minute: 2,
            ..AppConfig::default()
        })
        .unwrap();
        for _ in 0..2 {
            let (status, _) = send(&app, "GET", "/health", None, None).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, _) = send(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

        let metrics = build_router(&AppConfig {
            rate_limit_requests_per_minute: 10,
            ..AppConfig::default()
        })
        .unwrap();
        let request = Request::builder()
            .uri("/metrics")
            .header("x-forwarded-for", IP)
            .body(Body::empty())
            .unwrap();
        let response = metrics.oneshot(request).await.unwrap();
        let text = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(text.to_vec()).unwrap();
        assert!(text.contains("agora_rate_limit_hits_total{surface=\"http\",reason=\"ip_rate_limit\"}"));
    }

    #[tokio::test]
    async fn oversized_bodies_are_rejected() {
        let app = build_router(&AppConfig {
            max_body_bytes: 256,
            rate_limit_requests_per_minute: 1_000,
            request_timeout: Duration::from_secs(5),
            ..AppConfig::default()
        })
        .unwrap();
        let (status, _) = send(
            &app,
            "POST",
            "/auth/register",
            None,
            Some(json!({
                "username": "big_body",
                "email": "big@example.com",
                "password": "x".repeat(1_024),
            })),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }
}
