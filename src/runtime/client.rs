//! Agent 运行时客户端抽象
//!
//! AgentRuntime：创建会话、提交一轮用户消息（run）。HttpAgentRuntime 对接 ADK 风格的 HTTP 服务。

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::AgentSection;
use crate::core::{AgentRuntimeError, SessionCreationError};
use crate::runtime::response::AgentResponse;

/// 运行时抽象；测试中由 ScriptedAgentRuntime 实现
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    fn app_name(&self) -> &str;

    fn user_id(&self) -> &str;

    /// 创建会话，返回会话 id
    async fn create_session(&self) -> Result<String, SessionCreationError>;

    /// 提交一轮 user 消息，parts 依次作为文本片段
    async fn run(&self, session_id: &str, parts: &[String]) -> Result<AgentResponse, AgentRuntimeError>;
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct NewMessage<'a> {
    role: &'static str,
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    app_name: &'a str,
    user_id: &'a str,
    session_id: &'a str,
    new_message: NewMessage<'a>,
    streaming: bool,
}

#[derive(Debug, Deserialize)]
struct CreatedSession {
    id: Option<String>,
}

pub struct HttpAgentRuntime {
    http: Client,
    base_url: String,
    invoke_url: String,
    app_name: String,
    user_id: String,
}

impl HttpAgentRuntime {
    pub fn new(http: Client, cfg: &AgentSection) -> Self {
        Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            invoke_url: cfg.invoke_url(),
            app_name: cfg.app_name.clone(),
            user_id: cfg.user_id.clone(),
        }
    }

    fn sessions_url(&self) -> String {
        format!(
            "{}/apps/{}/users/{}/sessions",
            self.base_url, self.app_name, self.user_id
        )
    }
}

#[async_trait]
impl AgentRuntime for HttpAgentRuntime {
    fn app_name(&self) -> &str {
        &self.app_name
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn create_session(&self) -> Result<String, SessionCreationError> {
        let resp = self
            .http
            .post(self.sessions_url())
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| SessionCreationError::Transport(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| SessionCreationError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(SessionCreationError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let created: CreatedSession =
            serde_json::from_str(&body).map_err(|_| SessionCreationError::MissingId)?;
        created
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or(SessionCreationError::MissingId)
    }

    async fn run(&self, session_id: &str, parts: &[String]) -> Result<AgentResponse, AgentRuntimeError> {
        let request = RunRequest {
            app_name: &self.app_name,
            user_id: &self.user_id,
            session_id,
            new_message: NewMessage {
                role: "user",
                parts: parts.iter().map(|p| TextPart { text: p }).collect(),
            },
            streaming: false,
        };
        let resp = self
            .http
            .post(&self.invoke_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentRuntimeError::Transport(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AgentRuntimeError::Transport(e.to_string()))?;
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "agent run failed");
            return Err(AgentRuntimeError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(AgentResponse::from_body(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::response::extract_reply_text;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn runtime(server: &MockServer) -> HttpAgentRuntime {
        let cfg = AgentSection {
            base_url: server.uri(),
            app_name: "email_agent".to_string(),
            user_id: "u1".to_string(),
            ..AgentSection::default()
        };
        HttpAgentRuntime::new(Client::new(), &cfg)
    }

    #[tokio::test]
    async fn test_create_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/apps/email_agent/users/u1/sessions"))
            .and(body_json(json!({})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "s-42" })))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(runtime(&server).create_session().await.unwrap(), "s-42");
    }

    #[tokio::test]
    async fn test_create_session_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        let err = runtime(&server).create_session().await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to create agent session: 500 boom");

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 7 })))
            .mount(&server)
            .await;
        let err = runtime(&server).create_session().await.unwrap_err();
        assert!(matches!(err, SessionCreationError::MissingId));
    }

    #[tokio::test]
    async fn test_create_session_blank_id_is_missing() {
        for id in ["", "   "] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": id })))
                .expect(1)
                .mount(&server)
                .await;
            let err = runtime(&server).create_session().await.unwrap_err();
            assert!(matches!(err, SessionCreationError::MissingId), "{id:?}");
        }
    }

    #[tokio::test]
    async fn test_run_sends_turn_and_decodes_events() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/run"))
            .and(body_json(json!({
                "app_name": "email_agent",
                "user_id": "u1",
                "session_id": "s1",
                "new_message": { "role": "user", "parts": [{ "text": "ACTION_RESULT" }, { "text": "{}" }] },
                "streaming": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "author": "email_agent", "content": { "parts": [{ "text": "done" }] } }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let resp = runtime(&server)
            .run("s1", &["ACTION_RESULT".to_string(), "{}".to_string()])
            .await
            .unwrap();
        assert_eq!(extract_reply_text(&resp), "done");
    }

    #[tokio::test]
    async fn test_run_failure_embeds_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/run"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such app"))
            .mount(&server)
            .await;

        let err = runtime(&server).run("s1", &["hi".to_string()]).await.unwrap_err();
        assert_eq!(err.to_string(), "Agent run failed: 404 no such app");
    }
}
