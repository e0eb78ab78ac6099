//! 桥接层：把用户提示词交给 Agent，执行其回复中的动作，再把结果回传
//!
//! 每个提示词至多一次动作往返：续写回复中若再次出现动作对象，不会执行。

pub mod continuation;

pub use continuation::{continue_with_result, ACTION_RESULT_MARKER};

use std::sync::Arc;

use tracing::Instrument;

use crate::actions::{extract_action_object, ActionDispatcher, ActionResult};
use crate::core::BridgeError;
use crate::observability::preview;
use crate::runtime::{extract_reply_text, SessionManager};

/// 一次提交的结果：展示给用户的文本，以及执行过的动作结果（若有）
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeReply {
    pub text: String,
    pub action: Option<ActionResult>,
}

pub struct Bridge {
    sessions: Arc<SessionManager>,
    dispatcher: Arc<ActionDispatcher>,
}

impl Bridge {
    pub fn new(sessions: Arc<SessionManager>, dispatcher: Arc<ActionDispatcher>) -> Self {
        Self {
            sessions,
            dispatcher,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// 提交一个用户提示词；会话、对话调用与授权失败以 Err 返回
    pub async fn submit(&self, prompt: &str) -> Result<BridgeReply, BridgeError> {
        let span = tracing::info_span!("prompt", turn_id = %uuid::Uuid::new_v4());
        self.submit_inner(prompt).instrument(span).await
    }

    async fn submit_inner(&self, prompt: &str) -> Result<BridgeReply, BridgeError> {
        let session_id = self.sessions.ensure_session().await?;
        let runtime = self.sessions.runtime();
        tracing::info!(prompt = %preview(prompt, 80), "submitting prompt");

        let response = runtime.run(&session_id, &[prompt.to_string()]).await?;
        let text = extract_reply_text(&response);

        let Some(action) = extract_action_object(&text) else {
            return Ok(BridgeReply { text, action: None });
        };
        tracing::info!(action = %action.action, "agent requested action");

        let result = self.dispatcher.dispatch(&action).await?;
        let text = continue_with_result(runtime.as_ref(), &session_id, &result).await?;
        Ok(BridgeReply {
            text,
            action: Some(result),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::RecordingTokenSource;
    use crate::google::GoogleWorkspace;
    use crate::runtime::ScriptedAgentRuntime;
    use reqwest::Client;

    fn bridge(runtime: Arc<ScriptedAgentRuntime>, tokens: Arc<RecordingTokenSource>) -> Bridge {
        let workspace = Arc::new(GoogleWorkspace::with_base_url(Client::new(), "http://127.0.0.1:9"));
        Bridge::new(
            Arc::new(SessionManager::new(runtime)),
            Arc::new(ActionDispatcher::new(tokens, workspace)),
        )
    }

    #[tokio::test]
    async fn test_plain_reply_passes_through() {
        let runtime = Arc::new(ScriptedAgentRuntime::new().reply("Hello there"));
        let reply = bridge(runtime.clone(), Arc::new(RecordingTokenSource::granting()))
            .submit("hi")
            .await
            .unwrap();

        assert_eq!(reply.text, "Hello there");
        assert!(reply.action.is_none());
        assert_eq!(runtime.turns(), vec![vec!["hi".to_string()]]);
    }

    #[tokio::test]
    async fn test_invalid_action_round_trip_without_auth() {
        let runtime = Arc::new(
            ScriptedAgentRuntime::new()
                .reply("```json\n{\"action\":\"SEND_EMAIL\",\"subject\":\"x\",\"content\":\"y\"}\n```")
                .reply("Who should I send it to?")
                .reply("{\"action\":\"LIST_TASKS\"}"),
        );
        let tokens = Arc::new(RecordingTokenSource::granting());
        let reply = bridge(runtime.clone(), tokens.clone())
            .submit("email my boss")
            .await
            .unwrap();

        assert_eq!(reply.text, "Who should I send it to?");
        let action = reply.action.unwrap();
        assert!(!action.ok);
        assert_eq!(action.action, "SEND_EMAIL");
        assert_eq!(tokens.request_count(), 0);
        assert_eq!(runtime.turns().len(), 2);
    }

    #[tokio::test]
    async fn test_continuation_action_is_not_executed() {
        let runtime = Arc::new(
            ScriptedAgentRuntime::new()
                .reply("{\"action\":\"FLY\"}")
                .reply("{\"action\":\"LIST_TASKS\"}"),
        );
        let tokens = Arc::new(RecordingTokenSource::granting());
        let reply = bridge(runtime.clone(), tokens.clone()).submit("go").await.unwrap();

        assert_eq!(reply.text, "{\"action\":\"LIST_TASKS\"}");
        assert_eq!(runtime.turns().len(), 2);
        assert_eq!(tokens.request_count(), 0);
    }

    #[tokio::test]
    async fn test_authorization_error_surfaces() {
        let runtime = Arc::new(ScriptedAgentRuntime::new().reply("{\"action\":\"LIST_DRIVE_FILES\"}"));
        let err = bridge(runtime.clone(), Arc::new(RecordingTokenSource::denying()))
            .submit("show my files")
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::Authorization(_)));
        assert_eq!(runtime.turns().len(), 1);
    }

    #[tokio::test]
    async fn test_session_failure_surfaces() {
        let runtime = Arc::new(ScriptedAgentRuntime::new().failing_session_creation(1));
        let err = bridge(runtime.clone(), Arc::new(RecordingTokenSource::granting()))
            .submit("hi")
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::Session(_)));
        assert!(runtime.turns().is_empty());
    }

    #[tokio::test]
    async fn test_runtime_failure_surfaces() {
        let runtime = Arc::new(ScriptedAgentRuntime::new().fail_run(500, "agent crashed"));
        let err = bridge(runtime, Arc::new(RecordingTokenSource::granting()))
            .submit("hi")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Agent run failed: 500 agent crashed");
    }
}
