//! 会话管理：每个 UI 会话首次使用时创建一次 Agent 会话，之后复用

use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::core::SessionCreationError;
use crate::runtime::client::AgentRuntime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub app_name: String,
    pub user_id: String,
}

/// 持有运行时与惰性创建的会话；并发的首次调用共享同一次创建
pub struct SessionManager {
    runtime: Arc<dyn AgentRuntime>,
    session: OnceCell<Session>,
}

impl SessionManager {
    pub fn new(runtime: Arc<dyn AgentRuntime>) -> Self {
        Self {
            runtime,
            session: OnceCell::new(),
        }
    }

    pub fn runtime(&self) -> &Arc<dyn AgentRuntime> {
        &self.runtime
    }

    /// 返回会话 id；失败不缓存，下一次调用会重新创建
    pub async fn ensure_session(&self) -> Result<String, SessionCreationError> {
        let session = self
            .session
            .get_or_try_init(|| async {
                let id = self.runtime.create_session().await?;
                tracing::info!(session_id = %id, app = self.runtime.app_name(), "agent session created");
                Ok::<_, SessionCreationError>(Session {
                    id,
                    app_name: self.runtime.app_name().to_string(),
                    user_id: self.runtime.user_id().to_string(),
                })
            })
            .await?;
        Ok(session.id.clone())
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.get()
    }
}
