//! 从 Agent 回复文本中提取动作对象
//!
//! 容忍代码块包裹（```json ... ```）与前后说明文字；只有含字符串 action 字段的 JSON 对象才算动作。
//! 解析失败一律视为「没有动作」。

use serde_json::{Map, Value};

use crate::core::ParseError;

/// 未经校验的动作对象：action 名 + 原始参数
#[derive(Debug, Clone, PartialEq)]
pub struct ActionObject {
    pub action: String,
    pub params: Map<String, Value>,
}

impl ActionObject {
    pub fn new(action: impl Into<String>, params: Value) -> Self {
        let params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            action: action.into(),
            params,
        }
    }
}

/// 去掉首尾的 ``` 围栏（含语言标记行）
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let body = match trimmed.find('\n') {
        Some(newline) => &trimmed[newline + 1..],
        None => &trimmed[3..],
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn parse_object(candidate: &str) -> Result<ActionObject, ParseError> {
    let value: Value =
        serde_json::from_str(candidate).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
    let Value::Object(mut map) = value else {
        return Err(ParseError::NoObject);
    };
    let action = match map.remove("action") {
        Some(Value::String(action)) => action,
        _ => return Err(ParseError::MissingAction),
    };
    Ok(ActionObject { action, params: map })
}

/// 先尝试整体解析，再尝试第一个 `{` 到最后一个 `}` 的子串
pub fn parse_action_object(text: &str) -> Result<ActionObject, ParseError> {
    let body = strip_code_fence(text);
    if body.starts_with('{') && body.ends_with('}') {
        if let Ok(obj) = parse_object(body) {
            return Ok(obj);
        }
    }
    let (Some(start), Some(end)) = (body.find('{'), body.rfind('}')) else {
        return Err(ParseError::NoObject);
    };
    if end < start {
        return Err(ParseError::NoObject);
    }
    parse_object(&body[start..=end])
}

pub fn extract_action_object(text: &str) -> Option<ActionObject> {
    match parse_action_object(text) {
        Ok(obj) => Some(obj),
        Err(e) => {
            tracing::debug!(reason = %e, "no action in agent reply");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fenced_json_action() {
        let text = "```json\n{\"action\": \"READ_EMAILS\", \"filter\": \"unread\"}\n```";
        let obj = extract_action_object(text).unwrap();
        assert_eq!(obj.action, "READ_EMAILS");
        assert_eq!(obj.params.get("filter"), Some(&json!("unread")));
        assert!(!obj.params.contains_key("action"));
    }

    #[test]
    fn test_fence_without_language_tag() {
        let obj = extract_action_object("```\n{\"action\":\"LIST_TASKS\"}\n```").unwrap();
        assert_eq!(obj.action, "LIST_TASKS");
    }

    #[test]
    fn test_object_embedded_in_prose() {
        let text = "Sure, I'll do that. {\"action\": \"DELETE_TASK\", \"taskId\": \"t1\"} Done.";
        let obj = extract_action_object(text).unwrap();
        assert_eq!(obj.action, "DELETE_TASK");
        assert_eq!(obj.params.get("taskId"), Some(&json!("t1")));
    }

    #[test]
    fn test_no_action_cases() {
        assert_eq!(parse_action_object("Just a reply."), Err(ParseError::NoObject));
        assert_eq!(parse_action_object("{\"filter\":\"all\"}"), Err(ParseError::MissingAction));
        assert_eq!(parse_action_object("{\"action\": 3}"), Err(ParseError::MissingAction));
        assert!(matches!(parse_action_object("{not json}"), Err(ParseError::InvalidJson(_))));
        assert_eq!(parse_action_object("} backwards {"), Err(ParseError::NoObject));
        assert!(extract_action_object("```json\n{\"filter\":\"all\"}\n```").is_none());
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("  plain  "), "plain");
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```{}```"), "{}");
    }
}
