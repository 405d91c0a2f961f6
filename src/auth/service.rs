//! # 登录服务
//!
//! 编排一次完整的第三方登录：
//! 发放授权地址时经历 `Init → AwaitingProvider`，回调时经历
//! `Exchanging → ResolvingIdentity → IssuingTokens → Complete`。
//! 任一步骤失败即进入 `Error`。
//!
//! 提供商标识不区分大小写，内部统一使用注册表中的小写标识。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::identity::IdentityRepository;
use crate::auth::jwt::TokenService;
use crate::auth::oauth_client::{ProviderClient, ProviderRegistry};
use crate::auth::pkce::{PkceChallenge, PkceVerifier};
use crate::auth::session::SessionStore;
use crate::auth::state_store::LoginStateStore;
use crate::auth::types::{
    AuthorizeUrl, Identity, ProviderBinding, ProviderInfo, ProviderProfile, TokenPair, UserId,
};
use crate::cache::KvStore;
use crate::config::AppConfig;
use crate::error::{AuthError, Result};
use crate::logging::{LogComponent, LogStage, token_fingerprint};
use crate::{ldebug, linfo, lwarn};

/// 登录尝试所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginPhase {
    /// 收到登录请求
    Init,
    /// 已发放授权地址，等待提供商回调
    AwaitingProvider,
    /// 用授权码换取令牌并拉取资料
    Exchanging,
    /// 把提供商资料映射到本地身份
    ResolvingIdentity,
    /// 建立会话并签发令牌
    IssuingTokens,
    /// 登录完成
    Complete,
    /// 登录失败
    Error,
}

impl LoginPhase {
    /// 日志中使用的阶段名
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::AwaitingProvider => "AWAITING_PROVIDER",
            Self::Exchanging => "EXCHANGING",
            Self::ResolvingIdentity => "RESOLVING_IDENTITY",
            Self::IssuingTokens => "ISSUING_TOKENS",
            Self::Complete => "COMPLETE",
            Self::Error => "ERROR",
        }
    }

    const fn stage(self) -> LogStage {
        match self {
            Self::Init | Self::AwaitingProvider => LogStage::Authorize,
            Self::Exchanging => LogStage::Exchange,
            Self::ResolvingIdentity => LogStage::IdentityResolve,
            Self::IssuingTokens | Self::Complete => LogStage::TokenIssue,
            Self::Error => LogStage::Error,
        }
    }
}

impl fmt::Display for LoginPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 回调交换请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExchangeRequest {
    /// 提供商标识
    pub provider: String,
    /// 提供商回调带回的授权码
    pub code: String,
    /// PKCE verifier
    #[serde(default)]
    pub code_verifier: Option<String>,
    /// 发放授权地址时返回的 state
    #[serde(default)]
    pub state: Option<String>,
}

/// 按刷新令牌查到的有效会话
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    /// 用户ID
    pub user_id: UserId,
    /// 会话ID
    pub session_id: String,
    /// 刷新令牌剩余有效秒数
    pub expires_in: u64,
}

/// 登录编排服务
pub struct LoginService {
    registry: Arc<ProviderRegistry>,
    provider_client: ProviderClient,
    state_store: LoginStateStore,
    access_tokens: Arc<TokenService>,
    refresh_tokens: Arc<TokenService>,
    sessions: SessionStore,
    identities: Arc<dyn IdentityRepository>,
}

impl LoginService {
    /// 由各组件组装服务
    ///
    /// 访问令牌有效期必须严格短于刷新令牌，否则返回配置错误。
    pub fn new(
        registry: Arc<ProviderRegistry>,
        provider_client: ProviderClient,
        state_store: LoginStateStore,
        access_tokens: Arc<TokenService>,
        refresh_tokens: Arc<TokenService>,
        sessions: SessionStore,
        identities: Arc<dyn IdentityRepository>,
    ) -> Result<Self> {
        if access_tokens.ttl() >= refresh_tokens.ttl() {
            return Err(AuthError::config(
                "访问令牌有效期必须短于刷新令牌有效期",
            ));
        }

        Ok(Self {
            registry,
            provider_client,
            state_store,
            access_tokens,
            refresh_tokens,
            sessions,
            identities,
        })
    }

    /// 按应用配置构建全部组件
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn KvStore>,
        identities: Arc<dyn IdentityRepository>,
    ) -> Result<Self> {
        let access_tokens = TokenService::access(
            &config.tokens.access_secret,
            Duration::from_secs(config.tokens.access_ttl),
        )?;
        let refresh_ttl = Duration::from_secs(config.tokens.refresh_ttl);
        let refresh_tokens = TokenService::refresh(&config.tokens.refresh_secret, refresh_ttl)?;

        Self::new(
            Arc::new(ProviderRegistry::from_config(config)?),
            ProviderClient::new(&config.http_client)?,
            LoginStateStore::new(
                Arc::clone(&store),
                Duration::from_secs(config.state_store.ttl),
            ),
            Arc::new(access_tokens),
            Arc::new(refresh_tokens),
            SessionStore::new(store, refresh_ttl, config.session.revoke_chain_on_reuse),
            identities,
        )
    }

    /// 访问令牌服务
    #[must_use]
    pub fn access_tokens(&self) -> Arc<TokenService> {
        Arc::clone(&self.access_tokens)
    }

    /// 刷新令牌服务
    #[must_use]
    pub fn refresh_tokens(&self) -> Arc<TokenService> {
        Arc::clone(&self.refresh_tokens)
    }

    /// 提供商注册表
    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// 登录页展示的提供商
    #[must_use]
    pub fn list_providers(&self) -> Vec<ProviderInfo> {
        self.registry.list_providers()
    }

    fn enter(phase: LoginPhase, provider: &str) {
        ldebug!(
            "system",
            phase.stage(),
            LogComponent::LoginService,
            "phase",
            "登录阶段切换",
            phase = %phase,
            provider = %provider
        );
    }

    fn fail(provider: &str, err: AuthError) -> AuthError {
        lwarn!(
            "system",
            LoginPhase::Error.stage(),
            LogComponent::LoginService,
            "phase",
            "登录失败",
            phase = %LoginPhase::Error,
            provider = %provider,
            error = %err
        );
        err
    }

    /// 为 `provider` 创建登录 state 并返回授权地址
    ///
    /// PKCE challenge 必须由客户端提供。
    pub async fn build_authorize_url(
        &self,
        provider: &str,
        code_challenge: Option<&str>,
    ) -> Result<AuthorizeUrl> {
        Self::enter(LoginPhase::Init, provider);
        self.authorize(provider, code_challenge)
            .await
            .map_err(|e| Self::fail(provider, e))
    }

    async fn authorize(&self, provider: &str, code_challenge: Option<&str>) -> Result<AuthorizeUrl> {
        let config = self.registry.get_config(provider)?;
        let challenge = PkceChallenge::from_client(code_challenge.unwrap_or_default())?;

        let state = self.state_store.create(&config.key, &challenge).await?;
        let auth_url = self
            .registry
            .build_authorize_url(config, &state.state_token, &challenge)?;

        Self::enter(LoginPhase::AwaitingProvider, &config.key);
        Ok(AuthorizeUrl {
            auth_url,
            state: state.state_token,
        })
    }

    /// 处理提供商回调，完成登录并签发令牌对
    pub async fn exchange(&self, request: &ExchangeRequest) -> Result<TokenPair> {
        let provider = request.provider.as_str();
        Self::enter(LoginPhase::Exchanging, provider);

        let result = async {
            let profile = self.fetch_profile(request).await?;

            Self::enter(LoginPhase::ResolvingIdentity, provider);
            let binding = self.resolve_identity(&profile).await?;

            Self::enter(LoginPhase::IssuingTokens, provider);
            self.issue_tokens(binding.identity_id).await
        }
        .await;

        match result {
            Ok(pair) => {
                linfo!(
                    "system",
                    LoginPhase::Complete.stage(),
                    LogComponent::LoginService,
                    "phase",
                    "登录完成",
                    phase = %LoginPhase::Complete,
                    provider = %provider,
                    user_id = pair.user_id
                );
                Ok(pair)
            }
            Err(err) => Err(Self::fail(provider, err)),
        }
    }

    async fn fetch_profile(&self, request: &ExchangeRequest) -> Result<ProviderProfile> {
        let config = self.registry.get_config(&request.provider)?;

        if request.code.trim().is_empty() {
            return Err(AuthError::config("缺少授权码"));
        }
        let verifier = request
            .code_verifier
            .as_deref()
            .filter(|v| !v.is_empty())
            .map(PkceVerifier::parse)
            .transpose()?;
        let state = request.state.as_deref().filter(|s| !s.is_empty());
        if verifier.is_none() && state.is_none() {
            return Err(AuthError::config("code_verifier 与 state 至少提供一个"));
        }

        if let Some(state) = state {
            let login_state = self.state_store.consume(state).await?;
            if !login_state.provider.eq_ignore_ascii_case(&config.key) {
                return Err(AuthError::config(format!(
                    "state 属于提供商 {}",
                    login_state.provider
                )));
            }
            if let Some(verifier) = &verifier {
                let challenge = PkceChallenge::from_client(&login_state.code_challenge)?;
                if !challenge.verify(verifier) {
                    return Err(AuthError::unauthorized("code_verifier 与登录时的 challenge 不匹配"));
                }
            }
        }

        self.provider_client
            .get_user_data(config, &request.code, verifier.as_ref().map(PkceVerifier::as_str))
            .await
    }

    /// 把提供商资料映射到本地身份，首次登录时创建
    ///
    /// 同一账号并发首次登录时仓储返回冲突，此时重读一次绑定。
    pub async fn resolve_identity(&self, profile: &ProviderProfile) -> Result<ProviderBinding> {
        let provider = profile.provider_name.as_str();
        let uid = profile.provider_id.as_str();

        if let Some(binding) = self.identities.find_binding(provider, uid).await? {
            return Ok(binding);
        }

        match self.identities.create_identity_with_binding(profile).await {
            Ok(binding) => {
                linfo!(
                    "system",
                    LogStage::IdentityResolve,
                    LogComponent::Identity,
                    "identity_created",
                    "已创建新身份",
                    user_id = binding.identity_id,
                    provider = %provider
                );
                Ok(binding)
            }
            Err(err) if matches!(err.root(), AuthError::Conflict { .. }) => {
                ldebug!(
                    "system",
                    LogStage::IdentityResolve,
                    LogComponent::Identity,
                    "identity_race",
                    "绑定已被并发创建，重新读取",
                    provider = %provider
                );
                self.identities
                    .find_binding(provider, uid)
                    .await?
                    .ok_or(err)
            }
            Err(err) => Err(err),
        }
    }

    /// 为 `user_id` 建立新会话并签发首个令牌对
    pub async fn issue_tokens(&self, user_id: UserId) -> Result<TokenPair> {
        let session_id = SessionStore::new_session_id();
        let (refresh_token, refresh_claims) = self
            .refresh_tokens
            .generate_session_token(user_id, &session_id)?;
        let (access_token, _) = self
            .access_tokens
            .generate_session_token(user_id, &session_id)?;

        self.sessions
            .start(&session_id, user_id, &refresh_claims.jti)
            .await?;

        Ok(self.pair(user_id, session_id, access_token, refresh_token))
    }

    /// 轮换刷新令牌
    ///
    /// 提交的令牌必须是所属会话的当前令牌；新令牌对签发后旧令牌即失效。
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let claims = self.refresh_tokens.validate_token(refresh_token)?;
        let session_id = claims
            .sid
            .ok_or_else(|| AuthError::unauthorized("刷新令牌未绑定会话"))?;

        let (new_refresh, new_claims) = self
            .refresh_tokens
            .generate_session_token(claims.user_id, &session_id)?;
        let record = self
            .sessions
            .rotate(&session_id, &claims.jti, &new_claims.jti)
            .await?;
        if record.user_id != claims.user_id {
            self.sessions.revoke(&session_id).await?;
            return Err(AuthError::unauthorized("会话属于其他用户"));
        }

        let (access_token, _) = self
            .access_tokens
            .generate_session_token(claims.user_id, &session_id)?;

        linfo!(
            "system",
            LogStage::Refresh,
            LogComponent::LoginService,
            "token_refreshed",
            "令牌对已轮换",
            user_id = claims.user_id,
            token_fp = %token_fingerprint(refresh_token)
        );
        Ok(self.pair(claims.user_id, session_id, access_token, new_refresh))
    }

    /// 吊销刷新令牌所属的会话
    ///
    /// 幂等；无效令牌直接忽略。返回是否吊销了一个有效会话。
    pub async fn logout(&self, refresh_token: &str) -> Result<bool> {
        let claims = match self.refresh_tokens.validate_token(refresh_token) {
            Ok(claims) => claims,
            Err(err) if err.is_token_error() => {
                ldebug!(
                    "system",
                    LogStage::Logout,
                    LogComponent::LoginService,
                    "logout_ignored",
                    "登出令牌无效，已忽略",
                    error = %err
                );
                return Ok(false);
            }
            Err(err) => return Err(err),
        };

        match claims.sid {
            Some(session_id) => self.sessions.revoke(&session_id).await,
            None => Ok(false),
        }
    }

    /// 查询刷新令牌所属的有效会话
    pub async fn session(&self, refresh_token: &str) -> Result<SessionInfo> {
        let claims = self.refresh_tokens.validate_token(refresh_token)?;
        let session_id = claims
            .sid
            .ok_or_else(|| AuthError::unauthorized("刷新令牌未绑定会话"))?;
        let record = self.sessions.current(&session_id, &claims.jti).await?;

        let remaining = claims.exp - Utc::now().timestamp();
        Ok(SessionInfo {
            user_id: record.user_id,
            session_id,
            expires_in: u64::try_from(remaining).unwrap_or(0),
        })
    }

    /// 按ID读取身份
    pub async fn get_identity(&self, user_id: UserId) -> Result<Identity> {
        self.identities
            .get_identity(user_id)
            .await?
            .ok_or_else(|| AuthError::not_found("identity", user_id.to_string()))
    }

    fn pair(
        &self,
        user_id: UserId,
        session_id: String,
        access_token: String,
        refresh_token: String,
    ) -> TokenPair {
        TokenPair {
            user_id,
            access_token,
            refresh_token,
            session_id,
            access_expires_in: self.access_tokens.ttl().as_secs(),
            refresh_expires_in: self.refresh_tokens.ttl().as_secs(),
        }
    }
}
