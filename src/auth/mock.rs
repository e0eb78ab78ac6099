//! Mock 授权提供方（用于测试，无需浏览器）
//!
//! 记录 sign_in / reauthorize 调用次数与最近一次申请的范围；每次授权返回递增的令牌。
//! RecordingTokenSource 直接实现 TokenSource，供分发器与 Dashboard 测试观察令牌请求。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::auth::{AuthProvider, Credential, ScopeSet, TokenSource};
use crate::core::AuthorizationError;

#[derive(Debug, Default)]
pub struct MockAuthProvider {
    user: Option<String>,
    dismiss: bool,
    sign_ins: AtomicUsize,
    reauthorizations: AtomicUsize,
    last_scopes: Mutex<Option<ScopeSet>>,
}

impl MockAuthProvider {
    /// 每次都授予令牌
    pub fn granting() -> Self {
        Self::default()
    }

    /// 模拟用户关闭同意窗口：不返回令牌
    pub fn dismissing() -> Self {
        Self {
            dismiss: true,
            ..Self::default()
        }
    }

    pub fn signed_in(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn sign_in_calls(&self) -> usize {
        self.sign_ins.load(Ordering::SeqCst)
    }

    pub fn reauthorize_calls(&self) -> usize {
        self.reauthorizations.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.sign_in_calls() + self.reauthorize_calls()
    }

    pub fn last_scopes(&self) -> Option<ScopeSet> {
        self.last_scopes.lock().ok().and_then(|s| s.clone())
    }

    fn grant(&self, scopes: &ScopeSet) -> Credential {
        if let Ok(mut last) = self.last_scopes.lock() {
            *last = Some(scopes.clone());
        }
        let access_token = (!self.dismiss).then(|| format!("mock-token-{}", self.total_calls()));
        Credential {
            user: self.user.clone(),
            access_token,
        }
    }
}

#[async_trait]
impl AuthProvider for MockAuthProvider {
    fn current_user(&self) -> Option<String> {
        self.user.clone()
    }

    async fn sign_in(&self, scopes: &ScopeSet) -> Result<Credential, AuthorizationError> {
        self.sign_ins.fetch_add(1, Ordering::SeqCst);
        Ok(self.grant(scopes))
    }

    async fn reauthorize(
        &self,
        _user: &str,
        scopes: &ScopeSet,
    ) -> Result<Credential, AuthorizationError> {
        self.reauthorizations.fetch_add(1, Ordering::SeqCst);
        Ok(self.grant(scopes))
    }
}

/// 记录每次令牌请求的范围；可配置为拒绝授权
#[derive(Debug, Default)]
pub struct RecordingTokenSource {
    deny: bool,
    requests: Mutex<Vec<ScopeSet>>,
}

impl RecordingTokenSource {
    pub fn granting() -> Self {
        Self::default()
    }

    pub fn denying() -> Self {
        Self {
            deny: true,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<ScopeSet> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests().len()
    }
}

#[async_trait]
impl TokenSource for RecordingTokenSource {
    async fn access_token(&self, required: &ScopeSet) -> Result<String, AuthorizationError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(required.clone());
        }
        if self.deny {
            Err(AuthorizationError::MissingToken)
        } else {
            Ok("test-token".to_string())
        }
    }
}
