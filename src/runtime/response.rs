//! Agent 运行时回复的解码与文本提取
//!
//! run 接口的响应形态不固定：事件数组、纯字符串或旧版对象。先解码为 AgentResponse，再按形态取出回复文本。

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EventPart {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EventContent {
    #[serde(default)]
    pub parts: Vec<EventPart>,
}

/// 运行时产生的单个事件
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AgentEvent {
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub content: Option<EventContent>,
}

impl AgentEvent {
    pub fn agent(author: &str, text: &str) -> Self {
        Self {
            author: Some(author.to_string()),
            content: Some(EventContent {
                parts: vec![EventPart { text: Some(text.to_string()) }],
            }),
        }
    }

    /// 无 author 的事件不算 Agent 产生
    fn is_agent_authored(&self) -> bool {
        matches!(self.author.as_deref(), Some(a) if a != "user")
    }

    fn first_text(&self) -> Option<&str> {
        self.content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .find(|t| !t.trim().is_empty())
    }
}

/// run 接口响应的几种形态
#[derive(Debug, Clone, PartialEq)]
pub enum AgentResponse {
    Events(Vec<AgentEvent>),
    Text(String),
    Legacy(Map<String, Value>),
    Empty,
}

impl From<Value> for AgentResponse {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => Self::Events(
                items
                    .into_iter()
                    .map(|v| serde_json::from_value(v).unwrap_or_default())
                    .collect(),
            ),
            Value::String(s) => Self::Text(s),
            Value::Object(map) => Self::Legacy(map),
            _ => Self::Empty,
        }
    }
}

impl AgentResponse {
    /// 响应体文本解码；非 JSON 视为纯文本回复
    pub fn from_body(body: &str) -> Self {
        if body.trim().is_empty() {
            return Self::Empty;
        }
        match serde_json::from_str::<Value>(body) {
            Ok(v) => v.into(),
            Err(_) => Self::Text(body.to_string()),
        }
    }
}

fn text_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |v, key| v.get(*key))?
        .as_str()
}

fn last_message_text(value: &Value) -> Option<&str> {
    let last = value.get("messages")?.as_array()?.last()?;
    last.as_str().or_else(|| text_at(last, &["content", "text"]))
}

fn output_text(v: &Value) -> Option<&str> {
    text_at(v, &["output", "text"])
}

fn output_content_text(v: &Value) -> Option<&str> {
    text_at(v, &["output", "content", "text"])
}

fn message_content_text(v: &Value) -> Option<&str> {
    text_at(v, &["message", "content", "text"])
}

fn bare_text(v: &Value) -> Option<&str> {
    text_at(v, &["text"])
}

type LegacyMatcher = fn(&Value) -> Option<&str>;

/// 旧版对象形态，按顺序匹配，第一个命中者胜出
const LEGACY_MATCHERS: [LegacyMatcher; 5] = [
    output_text,
    output_content_text,
    message_content_text,
    last_message_text,
    bare_text,
];

/// 取出 Agent 的回复文本，没有则返回空串
pub fn extract_reply_text(response: &AgentResponse) -> String {
    match response {
        AgentResponse::Events(events) => events
            .iter()
            .rev()
            .filter(|e| e.is_agent_authored())
            .find_map(AgentEvent::first_text)
            .or_else(|| events.iter().rev().find_map(AgentEvent::first_text))
            .unwrap_or_default()
            .to_string(),
        AgentResponse::Text(s) => s.clone(),
        AgentResponse::Legacy(map) => {
            let value = Value::Object(map.clone());
            LEGACY_MATCHERS
                .iter()
                .find_map(|m| m(&value))
                .unwrap_or_default()
                .to_string()
        }
        AgentResponse::Empty => String::new(),
    }
}
