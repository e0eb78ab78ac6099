//! 身份 / 授权提供方
//!
//! TokenBroker 只通过 AuthProvider 获取凭据：已登录用户走增量授权（reauthorize，保留身份只追加范围），
//! 未登录则走首次登录（sign_in）。控制台实现打印 Google OAuth 授权链接并从标准输入读取令牌。

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use reqwest::Url;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use crate::auth::ScopeSet;
use crate::config::GoogleSection;
use crate::core::AuthorizationError;

/// 授权流程返回的凭据；用户取消授权时 access_token 为 None
#[derive(Debug, Clone, Default)]
pub struct Credential {
    pub user: Option<String>,
    pub access_token: Option<String>,
}

/// 外部身份提供方：首次登录与增量授权是两条不同的路径
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// 当前已登录用户（无则 None）
    fn current_user(&self) -> Option<String>;

    /// 首次登录，申请完整的 scopes
    async fn sign_in(&self, scopes: &ScopeSet) -> Result<Credential, AuthorizationError>;

    /// 已登录用户的增量授权：只针对 scopes 重新征求同意，保留现有身份
    async fn reauthorize(
        &self,
        user: &str,
        scopes: &ScopeSet,
    ) -> Result<Credential, AuthorizationError>;
}

/// 控制台共享的标准输入行读取器（REPL 与授权提示共用，避免两个 BufReader 互相吞数据）
pub type SharedStdin = Arc<Mutex<Lines<BufReader<Stdin>>>>;

pub fn shared_stdin() -> SharedStdin {
    Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()))
}

/// 控制台授权：打印授权链接，用户在浏览器完成同意后粘贴回跳 URL 或 access_token
pub struct ConsoleConsentProvider {
    auth_url: String,
    client_id: String,
    redirect_uri: String,
    login_hint: Option<String>,
    input: SharedStdin,
    user: RwLock<Option<String>>,
}

impl ConsoleConsentProvider {
    pub fn new(cfg: &GoogleSection, input: SharedStdin) -> Self {
        Self {
            auth_url: cfg.auth_url.clone(),
            client_id: cfg.client_id.clone().unwrap_or_default(),
            redirect_uri: cfg.redirect_uri.clone(),
            login_hint: cfg.login_hint.clone(),
            input,
            user: RwLock::new(None),
        }
    }

    /// 构建 OAuth 2.0 授权链接（implicit grant，include_granted_scopes 以支持增量授权）
    pub fn authorization_url(
        &self,
        scopes: &ScopeSet,
        login_hint: Option<&str>,
    ) -> Result<Url, AuthorizationError> {
        let scope = scopes.to_param();
        let mut params: Vec<(&str, &str)> = vec![
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("response_type", "token"),
            ("scope", scope.as_str()),
            ("include_granted_scopes", "true"),
        ];
        match login_hint {
            Some(hint) => {
                params.push(("prompt", "consent"));
                params.push(("login_hint", hint));
            }
            None => params.push(("prompt", "select_account")),
        }
        Url::parse_with_params(&self.auth_url, &params)
            .map_err(|e| AuthorizationError::Provider(format!("invalid auth url: {e}")))
    }

    async fn prompt_for_token(&self, url: &Url) -> Result<Option<String>, AuthorizationError> {
        println!("\n请在浏览器中打开以下链接完成 Google 授权：\n{url}\n");
        println!("授权完成后粘贴回跳地址（或 access_token），直接回车表示取消：");
        let line = self
            .input
            .lock()
            .await
            .next_line()
            .await
            .map_err(|e| AuthorizationError::Provider(format!("read stdin: {e}")))?;
        Ok(line.and_then(|l| parse_pasted_token(&l)))
    }

    async fn authorize(
        &self,
        scopes: &ScopeSet,
        login_hint: Option<&str>,
    ) -> Result<Credential, AuthorizationError> {
        let url = self.authorization_url(scopes, login_hint)?;
        let access_token = self.prompt_for_token(&url).await?;
        Ok(self.complete_authorization(login_hint, access_token))
    }

    /// 记录授权结果。身份只来自 login_hint（调用参数或配置）；未知时不记录用户，
    /// 之后的授权继续走 sign_in，避免把无效的 login_hint 发给 Google
    fn complete_authorization(&self, login_hint: Option<&str>, access_token: Option<String>) -> Credential {
        let user = login_hint
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(String::from)
            .or_else(|| self.login_hint.clone().filter(|h| !h.trim().is_empty()));
        if access_token.is_some() && user.is_some() {
            if let Ok(mut guard) = self.user.write() {
                *guard = user.clone();
            }
        }
        Credential { user, access_token }
    }
}

#[async_trait]
impl AuthProvider for ConsoleConsentProvider {
    fn current_user(&self) -> Option<String> {
        self.user.read().ok().and_then(|u| u.clone())
    }

    async fn sign_in(&self, scopes: &ScopeSet) -> Result<Credential, AuthorizationError> {
        tracing::info!(scopes = %scopes, "starting Google sign-in");
        self.authorize(scopes, None).await
    }

    async fn reauthorize(
        &self,
        user: &str,
        scopes: &ScopeSet,
    ) -> Result<Credential, AuthorizationError> {
        tracing::info!(user = %user, scopes = %scopes, "requesting incremental authorization");
        self.authorize(scopes, Some(user)).await
    }
}

/// 从粘贴内容中取出访问令牌：支持完整回跳 URL（`#access_token=...&...`）或令牌本身
pub fn parse_pasted_token(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Some(idx) = input.find("access_token=") {
        let rest = &input[idx + "access_token=".len()..];
        let token = rest.split('&').next().unwrap_or("").trim();
        return (!token.is_empty()).then(|| token.to_string());
    }
    Some(input.to_string())
}

/// 固定令牌（来自配置 google.access_token），用于非交互运行
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    fn credential(&self) -> Credential {
        Credential {
            user: Some("static".to_string()),
            access_token: Some(self.token.clone()),
        }
    }
}

#[async_trait]
impl AuthProvider for StaticTokenProvider {
    fn current_user(&self) -> Option<String> {
        Some("static".to_string())
    }

    async fn sign_in(&self, _scopes: &ScopeSet) -> Result<Credential, AuthorizationError> {
        Ok(self.credential())
    }

    async fn reauthorize(
        &self,
        _user: &str,
        _scopes: &ScopeSet,
    ) -> Result<Credential, AuthorizationError> {
        Ok(self.credential())
    }
}
