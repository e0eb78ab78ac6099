//! Google Tasks 客户端
//!
//! 每次 list / create / complete / delete 前先解析默认任务列表：
//! 标题包含 "my tasks"（大小写不敏感）的优先，否则取第一个；一个都没有则报错。

use chrono::{SecondsFormat, Utc};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::core::ServiceCallError;
use crate::google::http::{resource_url, send_empty, send_json, CallSite};

const LIST_LISTS: CallSite = CallSite::new("Tasks", "list-lists");
const LIST: CallSite = CallSite::new("Tasks", "list");
const CREATE: CallSite = CallSite::new("Tasks", "create");
const COMPLETE: CallSite = CallSite::new("Tasks", "complete");
const DELETE: CallSite = CallSite::new("Tasks", "delete");

pub const DEFAULT_MAX_RESULTS: u32 = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskList {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskItem {
    #[serde(default)]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// needsAction | completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskQuery {
    pub show_completed: Option<bool>,
    pub max_results: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub due: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Items<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

/// 从任务列表中挑选默认列表
pub fn pick_default_list(lists: &[TaskList]) -> Option<&TaskList> {
    lists
        .iter()
        .find(|l| l.title.to_lowercase().contains("my tasks"))
        .or_else(|| lists.first())
}

pub struct TasksClient {
    http: Client,
    base_url: String,
}

impl TasksClient {
    /// base_url 形如 `https://tasks.googleapis.com/tasks/v1`
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn default_list_id(&self, token: &str) -> Result<String, ServiceCallError> {
        let lists: Items<TaskList> = send_json(
            self.http.get(format!("{}/users/@me/lists", self.base_url)),
            token,
            LIST_LISTS,
        )
        .await?;
        pick_default_list(&lists.items)
            .map(|l| l.id.clone())
            .ok_or(ServiceCallError::NoTaskLists)
    }

    /// `lists/{list}/tasks[/{task}]`，列表 id 与任务 id 各占一个路径段
    fn tasks_url(&self, list_id: &str, task_id: Option<&str>, site: CallSite) -> Result<Url, ServiceCallError> {
        match task_id {
            Some(task_id) => resource_url(&self.base_url, &["lists", list_id, "tasks", task_id], site),
            None => resource_url(&self.base_url, &["lists", list_id, "tasks"], site),
        }
    }

    pub async fn list_tasks(&self, token: &str, query: &TaskQuery) -> Result<Vec<TaskItem>, ServiceCallError> {
        let list_id = self.default_list_id(token).await?;
        let max = query.max_results.unwrap_or(DEFAULT_MAX_RESULTS).to_string();
        let mut params = vec![
            ("showDeleted", "false"),
            ("showHidden", "false"),
            ("maxResults", max.as_str()),
        ];
        if query.show_completed == Some(false) {
            params.push(("showCompleted", "false"));
        }
        let tasks: Items<TaskItem> = send_json(
            self.http.get(self.tasks_url(&list_id, None, LIST)?).query(&params),
            token,
            LIST,
        )
        .await?;
        Ok(tasks.items)
    }

    pub async fn create_task(&self, token: &str, task: &NewTask) -> Result<TaskItem, ServiceCallError> {
        let list_id = self.default_list_id(token).await?;
        let mut body = Map::new();
        body.insert("title".to_string(), Value::String(task.title.clone()));
        if let Some(due) = task.due.as_ref().filter(|d| !d.is_empty()) {
            body.insert("due".to_string(), Value::String(due.clone()));
        }
        if let Some(notes) = task.notes.as_ref().filter(|n| !n.is_empty()) {
            body.insert("notes".to_string(), Value::String(notes.clone()));
        }
        send_json(
            self.http.post(self.tasks_url(&list_id, None, CREATE)?).json(&body),
            token,
            CREATE,
        )
        .await
    }

    /// 标记完成：status=completed，completed=当前时间
    pub async fn complete_task(&self, token: &str, task_id: &str) -> Result<TaskItem, ServiceCallError> {
        let list_id = self.default_list_id(token).await?;
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        send_json(
            self.http
                .patch(self.tasks_url(&list_id, Some(task_id), COMPLETE)?)
                .json(&json!({ "status": "completed", "completed": now })),
            token,
            COMPLETE,
        )
        .await
    }

    pub async fn delete_task(&self, token: &str, task_id: &str) -> Result<(), ServiceCallError> {
        let list_id = self.default_list_id(token).await?;
        send_empty(
            self.http.delete(self.tasks_url(&list_id, Some(task_id), DELETE)?),
            token,
            DELETE,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> TasksClient {
        TasksClient::new(Client::new(), format!("{}/tasks/v1", server.uri()))
    }

    async fn mount_lists(server: &MockServer, lists: Value) {
        Mock::given(method("GET"))
            .and(path("/tasks/v1/users/@me/lists"))
            .respond_with(ResponseTemplate::new(200).set_body_json(lists))
            .mount(server)
            .await;
    }

    #[test]
    fn test_pick_default_list_prefers_my_tasks() {
        let lists = vec![
            TaskList { id: "a".into(), title: "Groceries".into() },
            TaskList { id: "b".into(), title: "My Tasks".into() },
        ];
        assert_eq!(pick_default_list(&lists).unwrap().id, "b");
        assert_eq!(pick_default_list(&lists[..1]).unwrap().id, "a");
        assert!(pick_default_list(&[]).is_none());
    }

    #[tokio::test]
    async fn test_list_tasks_hides_completed() {
        let server = MockServer::start().await;
        mount_lists(&server, json!({ "items": [{ "id": "L1", "title": "My Tasks" }] })).await;
        Mock::given(method("GET"))
            .and(path("/tasks/v1/lists/L1/tasks"))
            .and(query_param("showCompleted", "false"))
            .and(query_param("maxResults", "10"))
            .and(query_param("showDeleted", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{ "id": "t1", "title": "Pay rent", "status": "needsAction" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tasks = client(&server)
            .list_tasks("tok", &TaskQuery { show_completed: Some(false), max_results: None })
            .await
            .unwrap();
        assert_eq!(tasks[0].title.as_deref(), Some("Pay rent"));
    }

    #[tokio::test]
    async fn test_complete_task_patches_status() {
        let server = MockServer::start().await;
        mount_lists(&server, json!({ "items": [{ "id": "L1", "title": "Inbox" }] })).await;
        Mock::given(method("PATCH"))
            .and(path("/tasks/v1/lists/L1/tasks/t1"))
            .and(body_partial_json(json!({ "status": "completed" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "t1", "status": "completed" })))
            .expect(1)
            .mount(&server)
            .await;

        let task = client(&server).complete_task("tok", "t1").await.unwrap();
        assert_eq!(task.status.as_deref(), Some("completed"));

        let requests = server.received_requests().await.unwrap();
        let patch = requests.iter().find(|r| r.method.as_str() == "PATCH").unwrap();
        let body: Value = serde_json::from_slice(&patch.body).unwrap();
        let completed = body["completed"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(completed).is_ok());
    }

    #[tokio::test]
    async fn test_no_task_lists_is_an_error() {
        let server = MockServer::start().await;
        mount_lists(&server, json!({})).await;

        let err = client(&server)
            .create_task("tok", &NewTask { title: "x".into(), ..NewTask::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceCallError::NoTaskLists));
    }

    #[tokio::test]
    async fn test_list_and_task_ids_are_single_segments() {
        let server = MockServer::start().await;
        mount_lists(&server, json!({ "items": [{ "id": "L/1", "title": "My Tasks" }] })).await;
        Mock::given(method("DELETE"))
            .and(path("/tasks/v1/lists/L%2F1/tasks/t1%2F..%2F..%2Fx%3Fy"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).delete_task("tok", "t1/../../x?y").await.unwrap();

        let err = client(&server).complete_task("tok", "..").await.unwrap_err();
        assert!(matches!(err, ServiceCallError::InvalidId { ref id, .. } if id == ".."));
    }
}
