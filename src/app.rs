//! 应用组装：由配置与授权提供方构建桥接层与 Dashboard
//!
//! 桥接层与 Dashboard 共享同一个 Agent 会话、同一个令牌代理（及其缓存）和同一组 Google 客户端。

use std::sync::Arc;

use crate::actions::ActionDispatcher;
use crate::auth::{AuthProvider, SystemClock, TokenBroker, TokenCache};
use crate::bridge::Bridge;
use crate::config::AppConfig;
use crate::dashboard::Dashboard;
use crate::google::GoogleWorkspace;
use crate::runtime::{AgentRuntime, HttpAgentRuntime, SessionManager};

/// 预构建的应用组件，可在整个 UI 会话中共享
pub struct AppComponents {
    pub bridge: Arc<Bridge>,
    pub dashboard: Arc<Dashboard>,
    pub broker: Arc<TokenBroker>,
    pub sessions: Arc<SessionManager>,
}

/// 使用 HTTP Agent 运行时构建组件
pub fn build_components(
    cfg: &AppConfig,
    provider: Arc<dyn AuthProvider>,
) -> Result<AppComponents, reqwest::Error> {
    let http = cfg.http.build_client()?;
    let runtime = Arc::new(HttpAgentRuntime::new(http.clone(), &cfg.agent));
    let workspace = Arc::new(GoogleWorkspace::new(http, &cfg.google));
    Ok(assemble(cfg, provider, runtime, workspace))
}

/// 以给定的运行时与 Google 客户端组装（测试中注入 mock）
pub fn assemble(
    cfg: &AppConfig,
    provider: Arc<dyn AuthProvider>,
    runtime: Arc<dyn AgentRuntime>,
    workspace: Arc<GoogleWorkspace>,
) -> AppComponents {
    let broker = Arc::new(
        TokenBroker::new(provider, Arc::new(TokenCache::new()), Arc::new(SystemClock))
            .with_ttl(cfg.google.token_ttl()),
    );
    let sessions = Arc::new(SessionManager::new(runtime));
    let dispatcher = Arc::new(ActionDispatcher::new(broker.clone(), workspace.clone()));

    AppComponents {
        bridge: Arc::new(Bridge::new(sessions.clone(), dispatcher)),
        dashboard: Arc::new(Dashboard::new(broker.clone(), workspace, sessions.clone())),
        broker,
        sessions,
    }
}
