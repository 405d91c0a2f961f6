//! # 认证中间件测试

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use tower::ServiceExt;

use warden_auth::app::AppContext;
use warden_auth::auth::types::UserId;
use warden_auth::server::middleware::REQUEST_ID_HEADER;
use warden_auth::testing::{
    build_test_context, init_test_env, sample_profile, test_app_config, test_router,
};

async fn context_with_identity() -> (Arc<AppContext>, UserId) {
    init_test_env();
    let context = build_test_context(test_app_config("http://127.0.0.1:9")).unwrap();
    let binding = context
        .login
        .resolve_identity(&sample_profile("yandex", "7"))
        .await
        .unwrap();
    (context, binding.identity_id)
}

async fn get(context: &Arc<AppContext>, uri: &str, bearer: Option<&str>) -> Response {
    let mut request = Request::get(uri);
    if let Some(token) = bearer {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    test_router(context.clone())
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_bearer_token_is_accepted() {
    let (context, user_id) = context_with_identity().await;
    let token = context.login.access_tokens().generate_token(user_id).unwrap();

    let response = get(&context, "/api/user", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["id"].as_i64(), Some(i64::from(user_id)));
    assert_eq!(body["email"], "7@example.com");
}

#[tokio::test]
async fn test_query_token_takes_precedence() {
    let (context, user_id) = context_with_identity().await;
    let token = context.login.access_tokens().generate_token(user_id).unwrap();

    let ok = get(
        &context,
        &format!("/api/user?accessToken={token}"),
        Some("not-a-token"),
    )
    .await;
    assert_eq!(ok.status(), StatusCode::OK);

    let rejected = get(&context, "/api/user?accessToken=not-a-token", Some(&token)).await;
    assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_or_invalid_token_is_unauthorized() {
    let (context, user_id) = context_with_identity().await;

    assert_eq!(
        get(&context, "/api/user", None).await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        get(&context, "/api/user", Some("a.b.c")).await.status(),
        StatusCode::UNAUTHORIZED
    );

    let expired = context
        .login
        .access_tokens()
        .issue(user_id, None, Utc::now() - ChronoDuration::hours(2))
        .unwrap()
        .0;
    assert_eq!(
        get(&context, "/api/user", Some(&expired)).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_refresh_token_is_not_an_access_token() {
    let (context, user_id) = context_with_identity().await;
    let refresh = context.login.refresh_tokens().generate_token(user_id).unwrap();

    assert_eq!(
        get(&context, "/api/user", Some(&refresh)).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_unknown_identity_is_not_found() {
    let (context, _) = context_with_identity().await;
    let token = context.login.access_tokens().generate_token(9999).unwrap();

    let response = get(&context, "/api/user", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    init_test_env();
    let context = build_test_context(test_app_config("http://127.0.0.1:9")).unwrap();

    let response = test_router(context.clone())
        .oneshot(
            Request::get("/api/ping")
                .header(REQUEST_ID_HEADER, "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-123");

    let generated = get(&context, "/api/ping", None).await;
    assert!(generated.headers().contains_key(REQUEST_ID_HEADER));
}
