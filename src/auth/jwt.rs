//! # JWT 令牌服务
//!
//! 每种令牌一个实例。访问令牌与刷新令牌使用各自独立的密钥和有效期，
//! 实例只接受 `token_type` 与自身一致的令牌。

use base64::engine::{Engine, general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::auth::types::{TokenClaims, TokenKind, UserId};
use crate::error::{AuthError, Result};

const ALGORITHM_NAME: &str = "HS256";

/// 验签前读取的头部字段
#[derive(Debug, Deserialize)]
struct PeekHeader {
    alg: String,
}

/// 未验签读取的声明字段，只用于错误归类
#[derive(Debug, Deserialize)]
struct PeekClaims {
    #[serde(default)]
    token_type: Option<String>,
}

/// 签发并校验一种令牌
pub struct TokenService {
    /// 本实例签发与接受的令牌类型
    kind: TokenKind,
    /// 有效期
    ttl: Duration,
    /// 签名密钥
    encoding_key: EncodingKey,
    /// 验签密钥
    decoding_key: DecodingKey,
    /// 校验配置
    validation: Validation,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("kind", &self.kind)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// 创建令牌服务，密钥不能为空且有效期必须为正
    pub fn new(kind: TokenKind, secret: &str, ttl: Duration) -> Result<Self> {
        if secret.is_empty() {
            return Err(AuthError::config(format!("{kind} 令牌密钥不能为空")));
        }
        if ttl.is_zero() {
            return Err(AuthError::config(format!("{kind} 令牌有效期必须大于 0")));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            kind,
            ttl,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// 访问令牌服务
    pub fn access(secret: &str, ttl: Duration) -> Result<Self> {
        Self::new(TokenKind::Access, secret, ttl)
    }

    /// 刷新令牌服务
    pub fn refresh(secret: &str, ttl: Duration) -> Result<Self> {
        Self::new(TokenKind::Refresh, secret, ttl)
    }

    /// 令牌类型
    #[must_use]
    pub const fn kind(&self) -> TokenKind {
        self.kind
    }

    /// 有效期
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 为 `user_id` 生成不绑定会话的令牌
    pub fn generate_token(&self, user_id: UserId) -> Result<String> {
        self.issue(user_id, None, Utc::now()).map(|(token, _)| token)
    }

    /// 生成绑定会话的令牌，返回令牌字符串与声明
    pub fn generate_session_token(
        &self,
        user_id: UserId,
        session_id: &str,
    ) -> Result<(String, TokenClaims)> {
        self.issue(user_id, Some(session_id.to_string()), Utc::now())
    }

    /// 以 `issued_at` 作为签发时间生成令牌
    pub fn issue(
        &self,
        user_id: UserId,
        session_id: Option<String>,
        issued_at: DateTime<Utc>,
    ) -> Result<(String, TokenClaims)> {
        let ttl_secs = i64::try_from(self.ttl.as_secs())
            .map_err(|e| AuthError::internal_with_source("令牌有效期溢出", e))?;
        let iat = issued_at.timestamp();

        let claims = TokenClaims {
            user_id,
            token_type: self.kind,
            exp: iat + ttl_secs,
            iat,
            jti: uuid::Uuid::new_v4().to_string(),
            sid: session_id,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::internal_with_source("生成令牌失败", e))?;

        Ok((token, claims))
    }

    /// 校验令牌
    ///
    /// 依次检查结构、算法（仅 HS256）、签名、过期时间、令牌类型。
    /// 签名或过期校验失败、但载荷声明了另一种令牌类型时，按类型不匹配报告。
    pub fn validate_token(&self, token: &str) -> Result<TokenClaims> {
        let header: PeekHeader = peek_segment(token, 0)?;
        if header.alg != ALGORITHM_NAME {
            return Err(self.classify_failure(
                token,
                AuthError::Signature {
                    message: format!("不支持的签名算法 {}", header.alg),
                    source: None,
                },
            ));
        }

        let claims = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let err = match e.kind() {
                    ErrorKind::InvalidSignature
                    | ErrorKind::InvalidAlgorithm
                    | ErrorKind::InvalidAlgorithmName
                    | ErrorKind::InvalidKeyFormat => {
                        AuthError::signature_with_source("令牌签名无效", e)
                    }
                    ErrorKind::ExpiredSignature => AuthError::expired("令牌已过期"),
                    _ => AuthError::decode_with_source("令牌格式错误", e),
                };
                self.classify_failure(token, err)
            })?;

        if claims.token_type != self.kind {
            return Err(AuthError::wrong_type(self.kind.as_str(), claims.token_type.as_str()));
        }

        Ok(claims)
    }

    /// 有效令牌的剩余有效期
    pub fn remaining_ttl(&self, token: &str) -> Result<Duration> {
        let claims = self.validate_token(token)?;
        let remaining = claims.exp - Utc::now().timestamp();
        Ok(Duration::from_secs(u64::try_from(remaining).unwrap_or(0)))
    }

    fn classify_failure(&self, token: &str, err: AuthError) -> AuthError {
        if !matches!(err, AuthError::Signature { .. } | AuthError::Expired { .. }) {
            return err;
        }
        match peek_segment::<PeekClaims>(token, 1)
            .ok()
            .and_then(|claims| claims.token_type)
        {
            Some(actual) if actual != self.kind.as_str() => {
                AuthError::wrong_type(self.kind.as_str(), actual)
            }
            _ => err,
        }
    }
}

/// 不验签解码紧凑 JWT 的一段 base64url JSON
fn peek_segment<T: DeserializeOwned>(token: &str, index: usize) -> Result<T> {
    let mut parts = token.split('.');
    let segments = [parts.next(), parts.next(), parts.next()];
    if parts.next().is_some() || segments.iter().any(Option::is_none) {
        return Err(AuthError::decode("令牌必须由三段组成"));
    }

    let segment = segments[index].unwrap_or_default();
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| AuthError::decode_with_source("令牌分段不是合法的 base64url", e))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::decode_with_source("令牌分段不是合法的 JSON", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn access() -> TokenService {
        TokenService::access("access-secret", Duration::from_secs(30 * 60)).unwrap()
    }

    fn refresh() -> TokenService {
        TokenService::refresh("refresh-secret", Duration::from_secs(30 * 24 * 3600)).unwrap()
    }

    #[test]
    fn test_roundtrip_preserves_user_and_type() {
        let service = access();
        let token = service.generate_token(42).unwrap();
        let claims = service.validate_token(&token).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.token_type, TokenKind::Access);
        assert!(claims.sid.is_none());
        assert_eq!(claims.exp - claims.iat, 30 * 60);
    }

    #[test]
    fn test_session_token_carries_sid() {
        let service = refresh();
        let (token, issued) = service.generate_session_token(7, "sess-1").unwrap();
        let claims = service.validate_token(&token).unwrap();
        assert_eq!(claims, issued);
        assert_eq!(claims.sid.as_deref(), Some("sess-1"));
    }

    #[test]
    fn test_cross_type_is_wrong_type() {
        let access_token = access().generate_token(1).unwrap();
        let refresh_token = refresh().generate_token(1).unwrap();

        assert!(matches!(
            refresh().validate_token(&access_token),
            Err(AuthError::WrongType { .. })
        ));
        assert!(matches!(
            access().validate_token(&refresh_token),
            Err(AuthError::WrongType { .. })
        ));
    }

    #[test]
    fn test_cross_type_with_shared_secret_is_wrong_type() {
        let a = TokenService::access("same", Duration::from_secs(60)).unwrap();
        let r = TokenService::refresh("same", Duration::from_secs(120)).unwrap();
        let token = a.generate_token(1).unwrap();
        assert!(matches!(r.validate_token(&token), Err(AuthError::WrongType { .. })));
    }

    #[test]
    fn test_expired_token() {
        let service = access();
        let (token, _) = service
            .issue(1, None, Utc::now() - ChronoDuration::hours(2))
            .unwrap();
        assert!(matches!(
            service.validate_token(&token),
            Err(AuthError::Expired { .. })
        ));
    }

    #[test]
    fn test_bad_signature() {
        let other = TokenService::access("other-secret", Duration::from_secs(60)).unwrap();
        let token = other.generate_token(1).unwrap();
        assert!(matches!(
            access().validate_token(&token),
            Err(AuthError::Signature { .. })
        ));
    }

    #[test]
    fn test_algorithm_confusion_rejected() {
        let claims = TokenClaims {
            user_id: 1,
            token_type: TokenKind::Access,
            exp: Utc::now().timestamp() + 600,
            iat: Utc::now().timestamp(),
            jti: "x".to_string(),
            sid: None,
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(b"access-secret"),
        )
        .unwrap();
        assert!(matches!(
            access().validate_token(&token),
            Err(AuthError::Signature { .. })
        ));
    }

    #[test]
    fn test_alg_none_rejected() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(
            format!(
                r#"{{"user_id":1,"token_type":"access","exp":{},"iat":0,"jti":"x"}}"#,
                Utc::now().timestamp() + 600
            )
            .as_bytes(),
        );
        let token = format!("{header}.{payload}.");
        assert!(matches!(
            access().validate_token(&token),
            Err(AuthError::Signature { .. })
        ));
    }

    #[test]
    fn test_malformed_token() {
        for token in ["", "abc", "a.b", "a.b.c.d", "!!!.###.$$$"] {
            assert!(
                matches!(access().validate_token(token), Err(AuthError::Decode { .. })),
                "{token}"
            );
        }
    }

    #[test]
    fn test_remaining_ttl() {
        let service = access();
        let token = service.generate_token(1).unwrap();
        let remaining = service.remaining_ttl(&token).unwrap();
        assert!(remaining <= Duration::from_secs(30 * 60));
        assert!(remaining >= Duration::from_secs(30 * 60 - 5));
    }

    #[test]
    fn test_rejects_empty_secret_and_zero_ttl() {
        assert!(TokenService::access("", Duration::from_secs(1)).is_err());
        assert!(TokenService::access("s", Duration::ZERO).is_err());
    }
}
