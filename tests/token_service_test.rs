//! # 令牌服务测试
//!
//! 访问令牌与刷新令牌使用独立密钥，互不接受。

use chrono::{Duration as ChronoDuration, Utc};
use rstest::rstest;
use std::time::Duration;

use warden_auth::AuthError;
use warden_auth::auth::TokenService;
use warden_auth::auth::types::TokenKind;
use warden_auth::testing::{TEST_ACCESS_SECRET, TEST_REFRESH_SECRET};

fn services() -> (TokenService, TokenService) {
    (
        TokenService::access(TEST_ACCESS_SECRET, Duration::from_secs(1800)).unwrap(),
        TokenService::refresh(TEST_REFRESH_SECRET, Duration::from_secs(30 * 24 * 3600)).unwrap(),
    )
}

#[test]
fn test_session_token_carries_session_id() {
    let (access, refresh) = services();
    let (token, issued) = refresh.generate_session_token(5, "sid-1").unwrap();
    let claims = refresh.validate_token(&token).unwrap();

    assert_eq!(claims, issued);
    assert_eq!(claims.token_type, TokenKind::Refresh);
    assert_eq!(claims.sid.as_deref(), Some("sid-1"));
    assert_eq!(claims.exp - claims.iat, 30 * 24 * 3600);

    let plain = access.generate_token(5).unwrap();
    assert_eq!(access.validate_token(&plain).unwrap().sid, None);
}

#[test]
fn test_tokens_are_unique() {
    let (access, _) = services();
    let a = access.generate_token(1).unwrap();
    let b = access.generate_token(1).unwrap();
    assert_ne!(a, b);
}

#[test]
fn test_cross_kind_tokens_are_wrong_type() {
    let (access, refresh) = services();
    let refresh_token = refresh.generate_token(1).unwrap();
    let access_token = access.generate_token(1).unwrap();

    assert!(matches!(
        access.validate_token(&refresh_token),
        Err(AuthError::WrongType { .. })
    ));
    assert!(matches!(
        refresh.validate_token(&access_token),
        Err(AuthError::WrongType { .. })
    ));
}

#[test]
fn test_same_kind_with_foreign_secret_is_signature_error() {
    let (access, _) = services();
    let other = TokenService::access("another-secret", Duration::from_secs(60)).unwrap();
    let token = other.generate_token(1).unwrap();
    assert!(matches!(
        access.validate_token(&token),
        Err(AuthError::Signature { .. })
    ));
}

#[test]
fn test_expired_token() {
    let (access, _) = services();
    let (token, _) = access
        .issue(1, None, Utc::now() - ChronoDuration::hours(1))
        .unwrap();
    let err = access.validate_token(&token).unwrap_err();
    assert!(matches!(err, AuthError::Expired { .. }));
    assert!(err.is_token_error());
}

#[rstest]
#[case("")]
#[case("abc")]
#[case("a.b.c")]
#[case("eyJhbGciOiJIUzI1NiJ9.e30")]
fn test_malformed_tokens(#[case] token: &str) {
    let (access, _) = services();
    let err = access.validate_token(token).unwrap_err();
    assert!(err.is_token_error(), "{err}");
}

#[test]
fn test_remaining_ttl() {
    let (access, _) = services();
    let token = access.generate_token(1).unwrap();
    let remaining = access.remaining_ttl(&token).unwrap();
    assert!(remaining <= Duration::from_secs(1800));
    assert!(remaining >= Duration::from_secs(1790));
}

#[test]
fn test_invalid_construction() {
    assert!(matches!(
        TokenService::access("", Duration::from_secs(60)),
        Err(AuthError::Configuration { .. })
    ));
    assert!(matches!(
        TokenService::refresh("s", Duration::ZERO),
        Err(AuthError::Configuration { .. })
    ));
}
