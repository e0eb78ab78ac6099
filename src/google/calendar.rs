//! Google Calendar 客户端（仅 primary 日历）

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::ServiceCallError;
use crate::google::http::{resource_url, send_empty, send_json, CallSite};

const CREATE: CallSite = CallSite::new("Calendar", "create");
const DELETE: CallSite = CallSite::new("Calendar", "delete");
const LIST: CallSite = CallSite::new("Calendar", "list");

/// 新建事件参数（start / end 为 RFC3339）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewEvent {
    pub title: String,
    pub start: String,
    pub end: String,
    pub description: Option<String>,
    pub attendees: Vec<String>,
}

impl NewEvent {
    fn to_body(&self) -> Value {
        let mut event = json!({
            "summary": self.title,
            "description": self.description.clone().unwrap_or_default(),
            "start": { "dateTime": self.start },
            "end": { "dateTime": self.end },
        });
        if !self.attendees.is_empty() {
            event["attendees"] = self
                .attendees
                .iter()
                .map(|email| json!({ "email": email }))
                .collect();
        }
        event
    }
}

/// 列表查询参数，全部可选
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventQuery {
    pub time_min: Option<String>,
    pub time_max: Option<String>,
    pub q: Option<String>,
    pub max_results: Option<u32>,
}

/// 全天事件用 date，其余用 dateTime
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl EventTime {
    pub fn display(&self) -> &str {
        self.date_time.as_deref().or(self.date.as_deref()).unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    #[serde(default)]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<EventTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<EventTime>,
}

#[derive(Debug, Default, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<CalendarEvent>,
}

pub struct CalendarClient {
    http: Client,
    events_url: String,
}

impl CalendarClient {
    /// base_url 形如 `https://www.googleapis.com/calendar/v3`
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http,
            events_url: format!("{}/calendars/primary/events", base_url.trim_end_matches('/')),
        }
    }

    pub async fn create_event(&self, token: &str, event: &NewEvent) -> Result<CalendarEvent, ServiceCallError> {
        send_json(
            self.http.post(&self.events_url).json(&event.to_body()),
            token,
            CREATE,
        )
        .await
    }

    pub async fn delete_event(&self, token: &str, event_id: &str) -> Result<(), ServiceCallError> {
        let url = resource_url(&self.events_url, &[event_id], DELETE)?;
        send_empty(
            self.http.delete(url),
            token,
            DELETE,
        )
        .await
    }

    /// 展开重复事件并按开始时间排序
    pub async fn list_events(&self, token: &str, query: &EventQuery) -> Result<Vec<CalendarEvent>, ServiceCallError> {
        let mut params: Vec<(&str, String)> = vec![
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ];
        if let Some(t) = &query.time_min {
            params.push(("timeMin", t.clone()));
        }
        if let Some(t) = &query.time_max {
            params.push(("timeMax", t.clone()));
        }
        if let Some(n) = query.max_results {
            params.push(("maxResults", n.to_string()));
        }
        if let Some(q) = query.q.as_ref().filter(|q| !q.is_empty()) {
            params.push(("q", q.clone()));
        }
        let list: EventList = send_json(self.http.get(&self.events_url).query(&params), token, LIST).await?;
        Ok(list.items)
    }
}
