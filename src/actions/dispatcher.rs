//! 动作分发器
//!
//! 单步流程：校验 → 授权 → 执行 → 打包。未知动作与参数错误不申请授权，直接打包为失败结果；
//! 授权失败作为硬错误返回调用方；服务调用失败打包为失败结果。每次分发输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};

use crate::actions::parser::ActionObject;
use crate::actions::request::ActionRequest;
use crate::actions::result::ActionResult;
use crate::auth::TokenSource;
use crate::core::{ActionValidationError, AuthorizationError, ServiceCallError};
use crate::google::GoogleWorkspace;
use crate::observability::preview;

pub struct ActionDispatcher {
    tokens: Arc<dyn TokenSource>,
    workspace: Arc<GoogleWorkspace>,
}

impl ActionDispatcher {
    pub fn new(tokens: Arc<dyn TokenSource>, workspace: Arc<GoogleWorkspace>) -> Self {
        Self { tokens, workspace }
    }

    /// 分发一个动作对象；只有授权失败会以 Err 返回
    pub async fn dispatch(&self, obj: &ActionObject) -> Result<ActionResult, AuthorizationError> {
        let start = Instant::now();
        let outcome = self.dispatch_inner(obj).await;

        let (ok, label) = match &outcome {
            Ok((result, label)) => (result.ok, *label),
            Err(_) => (false, "unauthorized"),
        };
        let audit = json!({
            "event": "action_audit",
            "action": obj.action,
            "ok": ok,
            "outcome": label,
            "duration_ms": start.elapsed().as_millis() as u64,
            "params_preview": preview(&Value::Object(obj.params.clone()).to_string(), 200),
        });
        tracing::info!(audit = %audit.to_string(), "action");

        outcome.map(|(result, _)| result)
    }

    async fn dispatch_inner(
        &self,
        obj: &ActionObject,
    ) -> Result<(ActionResult, &'static str), AuthorizationError> {
        let request = match ActionRequest::try_from(obj) {
            Ok(request) => request,
            Err(e @ ActionValidationError::UnknownAction(_)) => {
                return Ok((ActionResult::failure(obj.action.clone(), e), "unknown_action"));
            }
            Err(e) => return Ok((ActionResult::failure(obj.action.trim(), e), "invalid_params")),
        };

        let kind = request.kind();
        let token = self.tokens.access_token(&kind.required_scopes()).await?;

        match self.execute(&token, request).await {
            Ok(payload) => Ok((ActionResult::success(kind.as_str(), payload), "ok")),
            Err(e) => {
                tracing::warn!(action = %kind, error = %e, "action failed");
                Ok((ActionResult::failure(kind.as_str(), e), "service_error"))
            }
        }
    }

    /// 用已授权的令牌执行请求，返回成功 payload
    pub async fn execute(&self, token: &str, request: ActionRequest) -> Result<Value, ServiceCallError> {
        let ws = &self.workspace;
        let payload = match request {
            ActionRequest::ReadEmails { filter, max_results } => {
                let emails = ws.mail.list_messages(token, filter, max_results).await?;
                json!({ "filter": filter.as_str(), "count": emails.len(), "emails": emails })
            }
            ActionRequest::SendEmail {
                recipient,
                subject,
                content,
            } => {
                let sent = ws.mail.send(token, &recipient, &subject, &content).await?;
                json!({ "id": sent.id, "threadId": sent.thread_id })
            }
            ActionRequest::ReplyEmail {
                thread_id,
                message_id,
                content,
            } => {
                let sent = ws
                    .mail
                    .reply(token, &thread_id, message_id.as_deref(), &content)
                    .await?;
                json!({ "id": sent.id, "threadId": sent.thread_id })
            }
            ActionRequest::CreateEvent(event) => {
                let created = ws.calendar.create_event(token, &event).await?;
                let mut payload = json!({ "id": created.id });
                if let Some(link) = created.html_link {
                    payload["htmlLink"] = Value::String(link);
                }
                payload
            }
            ActionRequest::DeleteEvent { event_id } => {
                ws.calendar.delete_event(token, &event_id).await?;
                json!({ "eventId": event_id })
            }
            ActionRequest::ListEvents(query) => {
                let events = ws.calendar.list_events(token, &query).await?;
                json!({ "count": events.len(), "events": events })
            }
            ActionRequest::ListDriveFiles { page_size } => {
                let files = ws.drive.list_files(token, page_size).await?;
                json!({ "count": files.len(), "files": files })
            }
            ActionRequest::ListTasks(query) => {
                let tasks = ws.tasks.list_tasks(token, &query).await?;
                json!({ "count": tasks.len(), "tasks": tasks })
            }
            ActionRequest::CreateTask(task) => {
                let task = ws.tasks.create_task(token, &task).await?;
                json!({ "task": task })
            }
            ActionRequest::CompleteTask { task_id } => {
                let task = ws.tasks.complete_task(token, &task_id).await?;
                json!({ "task": task })
            }
            ActionRequest::DeleteTask { task_id } => {
                ws.tasks.delete_task(token, &task_id).await?;
                json!({ "taskId": task_id })
            }
        };
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::scopes::{self, ScopeSet};
    use crate::auth::RecordingTokenSource;
    use reqwest::Client;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dispatcher(server: &MockServer, tokens: Arc<RecordingTokenSource>) -> ActionDispatcher {
        ActionDispatcher::new(
            tokens,
            Arc::new(GoogleWorkspace::with_base_url(Client::new(), &server.uri())),
        )
    }

    #[tokio::test]
    async fn test_unknown_action_skips_authorization() {
        let server = MockServer::start().await;
        let tokens = Arc::new(RecordingTokenSource::granting());
        let result = dispatcher(&server, tokens.clone())
            .dispatch(&ActionObject::new("FLY", json!({})))
            .await
            .unwrap();

        assert_eq!(
            result.to_json(),
            json!({ "ok": false, "action": "FLY", "error": "Unknown action: FLY" })
        );
        assert_eq!(tokens.request_count(), 0);
    }

    #[tokio::test]
    async fn test_send_email_without_recipient_is_packaged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gmail/v1/users/me/messages/send"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let tokens = Arc::new(RecordingTokenSource::granting());

        let result = dispatcher(&server, tokens.clone())
            .dispatch(&ActionObject::new(
                "SEND_EMAIL",
                json!({ "subject": "Hi", "content": "Hello" }),
            ))
            .await
            .unwrap();

        assert!(!result.ok);
        assert_eq!(result.action, "SEND_EMAIL");
        assert!(result.error.unwrap().contains("recipient"));
        assert_eq!(tokens.request_count(), 0);
    }

    #[tokio::test]
    async fn test_read_unread_emails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .and(query_param("q", "is:unread"))
            .and(query_param("maxResults", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messages": [{ "id": "m1", "threadId": "t1" }]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages/m1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "m1",
                "threadId": "t1",
                "snippet": "lunch?",
                "payload": { "headers": [{ "name": "Subject", "value": "Lunch" }] }
            })))
            .mount(&server)
            .await;
        let tokens = Arc::new(RecordingTokenSource::granting());

        let result = dispatcher(&server, tokens.clone())
            .dispatch(&ActionObject::new("READ_EMAILS", json!({ "filter": "unread" })))
            .await
            .unwrap();

        assert!(result.ok);
        assert_eq!(result.get("filter"), Some(&json!("unread")));
        assert_eq!(result.get("count"), Some(&json!(1)));
        assert_eq!(result.payload["emails"][0]["subject"], json!("Lunch"));

        let requested = tokens.requests();
        assert_eq!(requested.len(), 1);
        let expected: ScopeSet = [scopes::GMAIL_READONLY].into_iter().collect();
        assert_eq!(requested[0], expected);
    }

    #[tokio::test]
    async fn test_authorization_failure_is_hard() {
        let server = MockServer::start().await;
        let tokens = Arc::new(RecordingTokenSource::denying());
        let err = dispatcher(&server, tokens.clone())
            .dispatch(&ActionObject::new("LIST_TASKS", json!({})))
            .await
            .unwrap_err();

        assert_eq!(err, AuthorizationError::MissingToken);
        assert_eq!(tokens.request_count(), 1);
    }

    #[tokio::test]
    async fn test_service_failure_is_packaged() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/calendar/v3/calendars/primary/events/ev9"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;
        let tokens = Arc::new(RecordingTokenSource::granting());

        let result = dispatcher(&server, tokens)
            .dispatch(&ActionObject::new("DELETE_EVENT", json!({ "eventId": "ev9" })))
            .await
            .unwrap();

        assert_eq!(
            result.to_json(),
            json!({ "ok": false, "action": "DELETE_EVENT", "error": "Calendar delete failed 404: Not Found" })
        );
    }

    #[tokio::test]
    async fn test_create_event_and_delete_task_payloads() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendar/v3/calendars/primary/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "ev1" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tasks/v1/users/@me/lists"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [{ "id": "L", "title": "My Tasks" }] })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/tasks/v1/lists/L/tasks/t7"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        let d = dispatcher(&server, Arc::new(RecordingTokenSource::granting()));

        let created = d
            .dispatch(&ActionObject::new(
                "CREATE_EVENT",
                json!({ "title": "Sync", "start": "2024-10-01T10:00:00Z", "end": "2024-10-01T11:00:00Z" }),
            ))
            .await
            .unwrap();
        assert_eq!(created.to_json(), json!({ "ok": true, "action": "CREATE_EVENT", "id": "ev1" }));

        let deleted = d
            .dispatch(&ActionObject::new("DELETE_TASK", json!({ "taskId": "t7" })))
            .await
            .unwrap();
        assert_eq!(deleted.to_json(), json!({ "ok": true, "action": "DELETE_TASK", "taskId": "t7" }));
    }

    #[tokio::test]
    async fn test_delete_event_id_cannot_escape_its_path_segment() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/calendar/v3/calendars/primary/events/keep%2F..%2Fvictim%3Fx"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/calendar/v3/calendars/primary/events/victim"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;
        let d = dispatcher(&server, Arc::new(RecordingTokenSource::granting()));

        let deleted = d
            .dispatch(&ActionObject::new("DELETE_EVENT", json!({ "eventId": "keep/../victim?x" })))
            .await
            .unwrap();
        assert!(deleted.ok);

        let rejected = d
            .dispatch(&ActionObject::new("DELETE_EVENT", json!({ "eventId": ".." })))
            .await
            .unwrap();
        assert_eq!(
            rejected.to_json(),
            json!({
                "ok": false,
                "action": "DELETE_EVENT",
                "error": "Calendar delete rejected id \"..\": not a valid resource id"
            })
        );
    }
}
