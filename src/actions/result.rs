//! 动作执行结果：始终可序列化为 JSON 并回传给 Agent
//!
//! 成功：`{ "ok": true, "action": ..., <payload 字段> }`；失败：`{ "ok": false, "action": ..., "error": ... }`。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub ok: bool,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl ActionResult {
    /// payload 为对象时其字段平铺到顶层；其它值忽略
    pub fn success(action: impl Into<String>, payload: Value) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            ok: true,
            action: action.into(),
            error: None,
            payload,
        }
    }

    pub fn failure(action: impl Into<String>, error: impl ToString) -> Self {
        Self {
            ok: false,
            action: action.into(),
            error: Some(error.to_string()),
            payload: Map::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            serde_json::json!({ "ok": self.ok, "action": self.action, "error": self.error })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_payload_is_flattened() {
        let result = ActionResult::success("DELETE_TASK", json!({ "taskId": "t1" }));
        assert_eq!(
            result.to_json(),
            json!({ "ok": true, "action": "DELETE_TASK", "taskId": "t1" })
        );
    }

    #[test]
    fn test_failure_shape() {
        let result = ActionResult::failure("SEND_EMAIL", "Missing required parameter: recipient");
        assert_eq!(
            result.to_json(),
            json!({ "ok": false, "action": "SEND_EMAIL", "error": "Missing required parameter: recipient" })
        );
    }

    #[test]
    fn test_deserialize_keeps_extra_fields() {
        let result: ActionResult =
            serde_json::from_value(json!({ "ok": true, "action": "LIST_TASKS", "count": 2 })).unwrap();
        assert_eq!(result.get("count"), Some(&json!(2)));
        assert!(result.error.is_none());
    }
}
