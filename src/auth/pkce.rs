//! # PKCE (Proof Key for Code Exchange)
//!
//! RFC 7636 的 S256 方法，以及登录 state 的随机生成。
//!
//! ## 流程
//! 1. 客户端生成 Code Verifier（43-128 个字符），计算 `BASE64URL(SHA256(verifier))` 作为 Challenge
//! 2. 授权请求携带 Challenge，服务端随 state 一同保存
//! 3. 交换授权码时客户端提交 Verifier，服务端校验后转发给提供商

use base64::engine::{Engine, general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, RngCore, distributions::Alphanumeric, rngs::OsRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{AuthError, Result};

/// PKCE Code Verifier长度范围
const MIN_CODE_VERIFIER_LENGTH: usize = 43;
const MAX_CODE_VERIFIER_LENGTH: usize = 128;
const DEFAULT_CODE_VERIFIER_LENGTH: usize = 64;

/// 客户端 Challenge 的最大长度
const MAX_CODE_CHALLENGE_LENGTH: usize = 128;

/// state 随机字节数（256 bit）
const STATE_BYTES: usize = 32;

/// 唯一支持的 Challenge 方法
pub const CHALLENGE_METHOD_S256: &str = "S256";

fn is_unreserved(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')
}

/// PKCE Code Verifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkceVerifier {
    value: String,
}

impl PkceVerifier {
    /// 生成默认长度的随机 Verifier
    #[must_use]
    pub fn generate() -> Self {
        let verifier: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(DEFAULT_CODE_VERIFIER_LENGTH)
            .map(char::from)
            .collect();

        Self { value: verifier }
    }

    /// 解析客户端提交的 Verifier
    pub fn parse(value: &str) -> Result<Self> {
        let len = value.len();
        if !(MIN_CODE_VERIFIER_LENGTH..=MAX_CODE_VERIFIER_LENGTH).contains(&len) {
            return Err(AuthError::config(format!(
                "code_verifier 长度无效: {len}，必须在 {MIN_CODE_VERIFIER_LENGTH} 到 {MAX_CODE_VERIFIER_LENGTH} 之间"
            )));
        }

        // 字符集：[A-Z] [a-z] [0-9] - . _ ~
        if !value.chars().all(is_unreserved) {
            return Err(AuthError::config("code_verifier 包含非法字符"));
        }

        Ok(Self {
            value: value.to_string(),
        })
    }

    /// 获取Code Verifier的字符串值
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// 生成对应的 S256 Challenge
    #[must_use]
    pub fn challenge(&self) -> PkceChallenge {
        PkceChallenge::from_verifier(self)
    }
}

/// PKCE Code Challenge（S256）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkceChallenge {
    value: String,
}

impl PkceChallenge {
    /// 从 Verifier 计算 `BASE64URL(SHA256(verifier))`
    #[must_use]
    pub fn from_verifier(verifier: &PkceVerifier) -> Self {
        let hash = Sha256::digest(verifier.as_str().as_bytes());
        Self {
            value: URL_SAFE_NO_PAD.encode(hash),
        }
    }

    /// 接收客户端提供的 Challenge
    ///
    /// 只检查非空、长度上限与 URL 安全字符集；生成方式由客户端负责。
    pub fn from_client(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(AuthError::config("缺少 code_challenge"));
        }
        if value.len() > MAX_CODE_CHALLENGE_LENGTH {
            return Err(AuthError::config("code_challenge 过长"));
        }
        if !value.chars().all(is_unreserved) {
            return Err(AuthError::config("code_challenge 包含非法字符"));
        }
        Ok(Self {
            value: value.to_string(),
        })
    }

    /// 获取Code Challenge的字符串值
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Challenge 方法，固定为 S256
    #[must_use]
    pub const fn method(&self) -> &'static str {
        CHALLENGE_METHOD_S256
    }

    /// 校验 Verifier 是否与此 Challenge 匹配
    #[must_use]
    pub fn verify(&self, verifier: &PkceVerifier) -> bool {
        Self::from_verifier(verifier).value == self.value
    }
}

/// 生成登录 state：256 bit 系统随机数，base64url 编码
#[must_use]
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_verifier_generation() {
        let verifier = PkceVerifier::generate();
        assert_eq!(verifier.as_str().len(), DEFAULT_CODE_VERIFIER_LENGTH);
        assert!(PkceVerifier::parse(verifier.as_str()).is_ok());
    }

    #[test]
    fn test_rfc7636_appendix_b_vector() {
        let verifier = PkceVerifier::parse("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk").unwrap();
        assert_eq!(
            verifier.challenge().as_str(),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_verify_roundtrip_and_mismatch() {
        let verifier = PkceVerifier::generate();
        let challenge = PkceChallenge::from_client(verifier.challenge().as_str()).unwrap();
        assert!(challenge.verify(&verifier));
        assert!(!challenge.verify(&PkceVerifier::generate()));
    }

    #[test]
    fn test_verifier_format_validation() {
        assert!(PkceVerifier::parse("short").is_err());
        assert!(PkceVerifier::parse(&"a".repeat(129)).is_err());
        assert!(PkceVerifier::parse(&format!("{}!", "a".repeat(50))).is_err());
        assert!(PkceVerifier::parse(&"a-._~".repeat(10)).is_ok());
    }

    #[test]
    fn test_client_challenge_validation() {
        assert!(PkceChallenge::from_client("abc123").is_ok());
        assert!(PkceChallenge::from_client("").is_err());
        assert!(PkceChallenge::from_client("   ").is_err());
        assert!(PkceChallenge::from_client("has space").is_err());
        assert!(PkceChallenge::from_client(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_state_is_random_and_url_safe() {
        let states: HashSet<String> = (0..64).map(|_| generate_state()).collect();
        assert_eq!(states.len(), 64);
        for state in &states {
            assert_eq!(state.len(), 43);
            assert!(state.chars().all(is_unreserved));
        }
    }
}
