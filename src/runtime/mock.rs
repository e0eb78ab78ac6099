//! 脚本化的 Agent 运行时（用于测试，无需外部服务）
//!
//! 按顺序返回预设回复；脚本耗尽后回显最后一轮的第一段文本。记录每一轮提交的 parts。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::{AgentRuntimeError, SessionCreationError};
use crate::runtime::client::AgentRuntime;
use crate::runtime::response::{AgentEvent, AgentResponse};

pub struct ScriptedAgentRuntime {
    replies: Mutex<VecDeque<Result<AgentResponse, AgentRuntimeError>>>,
    turns: Mutex<Vec<Vec<String>>>,
    sessions_created: AtomicUsize,
    failing_sessions: AtomicUsize,
}

impl Default for ScriptedAgentRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedAgentRuntime {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            turns: Mutex::new(Vec::new()),
            sessions_created: AtomicUsize::new(0),
            failing_sessions: AtomicUsize::new(0),
        }
    }

    /// 追加一条 Agent 文本回复（包装为单个事件）
    pub fn reply(self, text: &str) -> Self {
        self.respond(AgentResponse::Events(vec![AgentEvent::agent("email_agent", text)]))
    }

    pub fn respond(self, response: AgentResponse) -> Self {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(Ok(response));
        }
        self
    }

    pub fn fail_run(self, status: u16, body: &str) -> Self {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(Err(AgentRuntimeError::Status {
                status,
                body: body.to_string(),
            }));
        }
        self
    }

    /// 前 n 次创建会话返回错误
    pub fn failing_session_creation(self, n: usize) -> Self {
        self.failing_sessions.store(n, Ordering::SeqCst);
        self
    }

    pub fn sessions_created(&self) -> usize {
        self.sessions_created.load(Ordering::SeqCst)
    }

    pub fn turns(&self) -> Vec<Vec<String>> {
        self.turns.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AgentRuntime for ScriptedAgentRuntime {
    fn app_name(&self) -> &str {
        "email_agent"
    }

    fn user_id(&self) -> &str {
        "test-user"
    }

    async fn create_session(&self) -> Result<String, SessionCreationError> {
        tokio::task::yield_now().await;
        let failing = self.failing_sessions.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_sessions.store(failing - 1, Ordering::SeqCst);
            return Err(SessionCreationError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        let n = self.sessions_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("session-{n}"))
    }

    async fn run(&self, _session_id: &str, parts: &[String]) -> Result<AgentResponse, AgentRuntimeError> {
        if let Ok(mut turns) = self.turns.lock() {
            turns.push(parts.to_vec());
        }
        let next = self.replies.lock().ok().and_then(|mut q| q.pop_front());
        match next {
            Some(reply) => reply,
            None => Ok(AgentResponse::Text(parts.first().cloned().unwrap_or_default())),
        }
    }
}
