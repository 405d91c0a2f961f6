//! # 认证工具函数
//!
//! 请求中令牌与会话 Cookie 的提取，以及 Set-Cookie 头的构建

use axum::http::{HeaderMap, header};

/// 查询参数中的访问令牌名，优先于 Authorization 头
pub const ACCESS_TOKEN_QUERY_PARAM: &str = "accessToken";

/// 认证工具类
pub struct AuthUtils;

impl AuthUtils {
    /// `从HTTP头中提取Authorization头的值`
    #[must_use]
    pub fn extract_authorization_header(headers: &HeaderMap) -> Option<&str> {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
    }

    /// `从Authorization头中提取Bearer` token
    ///
    /// # 参数
    /// - `auth_header`: Authorization头的完整值，如 "Bearer eyJ..."
    ///
    /// # 返回
    /// - `Some(&str)`: Bearer token部分
    /// - `None`: 不是Bearer类型的认证头或 token 为空
    #[must_use]
    pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
        auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// 从查询字符串中读取参数
    #[must_use]
    pub fn query_param(query: Option<&str>, name: &str) -> Option<String> {
        let query = query?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    }

    /// 提取访问令牌：`?accessToken=` 优先，其次 `Authorization: Bearer`
    #[must_use]
    pub fn extract_access_token(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
        Self::query_param(query, ACCESS_TOKEN_QUERY_PARAM).or_else(|| {
            Self::extract_authorization_header(headers)
                .and_then(Self::extract_bearer_token)
                .map(str::to_string)
        })
    }

    /// 从 Cookie 头中读取指定 Cookie
    #[must_use]
    pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    /// 会话 Cookie：HttpOnly、SameSite=None，`Max-Age` 取刷新令牌有效期
    #[must_use]
    pub fn session_cookie(name: &str, value: &str, secure: bool, max_age_secs: u64) -> String {
        let mut cookie =
            format!("{name}={value}; HttpOnly; SameSite=None; Path=/; Max-Age={max_age_secs}");
        if secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// 清除会话 Cookie
    #[must_use]
    pub fn clear_session_cookie(name: &str, secure: bool) -> String {
        Self::session_cookie(name, "", secure, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(AuthUtils::extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(AuthUtils::extract_bearer_token("Bearer "), None);
        assert_eq!(AuthUtils::extract_bearer_token("Basic abc"), None);
        assert_eq!(AuthUtils::extract_bearer_token("abc"), None);
    }

    #[test]
    fn test_query_param_takes_precedence() {
        let map = headers(&[(header::AUTHORIZATION, "Bearer from-header")]);
        assert_eq!(
            AuthUtils::extract_access_token(&map, Some("x=1&accessToken=from-query")).as_deref(),
            Some("from-query")
        );
        assert_eq!(
            AuthUtils::extract_access_token(&map, Some("accessToken=")).as_deref(),
            Some("from-header")
        );
        assert_eq!(
            AuthUtils::extract_access_token(&map, None).as_deref(),
            Some("from-header")
        );
        assert_eq!(AuthUtils::extract_access_token(&HeaderMap::new(), None), None);
    }

    #[test]
    fn test_extract_cookie() {
        let map = headers(&[
            (header::COOKIE, "a=1; warden_session=tok.en.x"),
            (header::COOKIE, "b=2"),
        ]);
        assert_eq!(
            AuthUtils::extract_cookie(&map, "warden_session").as_deref(),
            Some("tok.en.x")
        );
        assert_eq!(AuthUtils::extract_cookie(&map, "b").as_deref(), Some("2"));
        assert_eq!(AuthUtils::extract_cookie(&map, "missing"), None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = AuthUtils::session_cookie("warden_session", "t", true, 2_592_000);
        assert!(cookie.starts_with("warden_session=t;"));
        for attr in ["HttpOnly", "Secure", "SameSite=None", "Path=/", "Max-Age=2592000"] {
            assert!(cookie.contains(attr), "{attr}");
        }
        assert!(!AuthUtils::session_cookie("s", "t", false, 1).contains("Secure"));
        assert!(AuthUtils::clear_session_cookie("s", true).contains("Max-Age=0"));
    }
}
