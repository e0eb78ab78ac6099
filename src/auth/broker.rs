//! 令牌代理（Token Broker）
//!
//! get_access_token(required)：needed = 基础范围 ∪ required；缓存非空、未过期（默认 45 分钟）
//! 且覆盖 needed 时直接复用，否则经 AuthProvider 重新授权，并用 needed 整体覆盖缓存。
//! 缓存先读后写、锁不跨 await：两个并发调用可能同时触发授权，交互式授权下可接受。

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::auth::{AuthProvider, ScopeSet};
use crate::core::AuthorizationError;

/// 默认缓存有效期
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(45 * 60);

/// 时钟抽象，测试中替换为 ManualClock 以确定性地验证 TTL
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 手动推进的时钟
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// 缓存条目：令牌、获取时间、覆盖的范围
#[derive(Debug, Clone, PartialEq)]
pub struct TokenCacheEntry {
    pub token: String,
    pub obtained_at: DateTime<Utc>,
    pub scopes: ScopeSet,
}

impl TokenCacheEntry {
    fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match (now - self.obtained_at).to_std() {
            Ok(age) => age < ttl,
            // 时钟回拨：获取时间在未来，视为新鲜
            Err(_) => true,
        }
    }
}

/// 显式持有的令牌缓存，可在多个 Broker / 组件间共享
#[derive(Debug, Default)]
pub struct TokenCache {
    entry: Mutex<Option<TokenCacheEntry>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Option<TokenCacheEntry>> {
        self.entry.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 缓存新鲜且覆盖 needed 时返回令牌
    pub fn fresh_token(&self, needed: &ScopeSet, now: DateTime<Utc>, ttl: Duration) -> Option<String> {
        self.guard()
            .as_ref()
            .filter(|e| e.is_fresh(now, ttl) && e.scopes.covers(needed))
            .map(|e| e.token.clone())
    }

    pub fn store(&self, entry: TokenCacheEntry) {
        *self.guard() = Some(entry);
    }

    pub fn snapshot(&self) -> Option<TokenCacheEntry> {
        self.guard().clone()
    }

    pub fn clear(&self) {
        *self.guard() = None;
    }
}

/// 令牌来源：分发器与 Dashboard 只依赖此 trait
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self, required: &ScopeSet) -> Result<String, AuthorizationError>;
}

pub struct TokenBroker {
    provider: Arc<dyn AuthProvider>,
    cache: Arc<TokenCache>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    baseline: ScopeSet,
}

impl TokenBroker {
    pub fn new(provider: Arc<dyn AuthProvider>, cache: Arc<TokenCache>, clock: Arc<dyn Clock>) -> Self {
        Self {
            provider,
            cache,
            clock,
            ttl: DEFAULT_TOKEN_TTL,
            baseline: ScopeSet::baseline(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn cache(&self) -> &Arc<TokenCache> {
        &self.cache
    }

    pub async fn get_access_token(&self, required: &ScopeSet) -> Result<String, AuthorizationError> {
        let needed = self.baseline.union(required);
        let now = self.clock.now();
        if let Some(token) = self.cache.fresh_token(&needed, now, self.ttl) {
            tracing::debug!(scopes = needed.len(), "reusing cached access token");
            return Ok(token);
        }

        let credential = match self.provider.current_user() {
            Some(user) => self.provider.reauthorize(&user, &needed).await?,
            None => self.provider.sign_in(&needed).await?,
        };
        let token = credential
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthorizationError::MissingToken)?;

        tracing::info!(scopes = %needed, "obtained new access token");
        self.cache.store(TokenCacheEntry {
            token: token.clone(),
            obtained_at: now,
            scopes: needed,
        });
        Ok(token)
    }
}

#[async_trait]
impl TokenSource for TokenBroker {
    async fn access_token(&self, required: &ScopeSet) -> Result<String, AuthorizationError> {
        self.get_access_token(required).await
    }
}
