//! 桥接层错误类型
//!
//! 只有会话、对话调用与授权失败会冒泡到 UI；动作校验与服务调用失败在分发器边界被转为 ActionResult 数据，
//! ParseError 仅表示「回复里没有动作」。

use thiserror::Error;

/// 创建 Agent 会话失败（当前提示词的致命错误）
#[derive(Error, Debug)]
pub enum SessionCreationError {
    #[error("Failed to create agent session: {status} {body}")]
    Status { status: u16, body: String },

    #[error("Failed to create agent session: response has no session id")]
    MissingId,

    #[error("Failed to create agent session: {0}")]
    Transport(String),
}

/// 对话调用（run）失败
#[derive(Error, Debug)]
pub enum AgentRuntimeError {
    #[error("Agent run failed: {status} {body}")]
    Status { status: u16, body: String },

    #[error("Agent run request failed: {0}")]
    Transport(String),
}

/// 无法获得所需范围的访问令牌（触发该动作的致命错误）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthorizationError {
    #[error("Failed to obtain Google access token. Please complete the consent step and try again.")]
    MissingToken,

    #[error("Authorization failed: {0}")]
    Provider(String),
}

/// 动作参数校验失败：打包回对话，由 Agent 解释或修正
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionValidationError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Google REST 调用失败；非 2xx 时携带状态码与响应体原文
#[derive(Error, Debug)]
pub enum ServiceCallError {
    #[error("{service} {operation} failed {status}: {body}")]
    Status {
        service: &'static str,
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} {operation} request failed: {message}")]
    Transport {
        service: &'static str,
        operation: &'static str,
        message: String,
    },

    #[error("{service} {operation} returned an unexpected response: {message}")]
    Decode {
        service: &'static str,
        operation: &'static str,
        message: String,
    },

    #[error("{service} {operation} rejected id {id:?}: not a valid resource id")]
    InvalidId {
        service: &'static str,
        operation: &'static str,
        id: String,
    },

    #[error("No Google Task lists found for user")]
    NoTaskLists,
}

/// 从 Agent 文本中提取动作 JSON 失败（非致命：等价于「没有动作」）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("no JSON object in text")]
    NoObject,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("JSON object has no string \"action\" field")]
    MissingAction,
}

/// 提交一次用户提示词时可能冒泡到 UI 的错误
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error(transparent)]
    Session(#[from] SessionCreationError),

    #[error(transparent)]
    Runtime(#[from] AgentRuntimeError),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
}

/// Dashboard 单项操作（打开邮件、起草 / 发送回复）的错误
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error(transparent)]
    Service(#[from] ServiceCallError),

    #[error(transparent)]
    Session(#[from] SessionCreationError),

    #[error(transparent)]
    Runtime(#[from] AgentRuntimeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_embeds_status_and_body() {
        let err = ServiceCallError::Status {
            service: "Gmail",
            operation: "send",
            status: 403,
            body: "insufficient scopes".to_string(),
        };
        assert_eq!(err.to_string(), "Gmail send failed 403: insufficient scopes");
    }

    #[test]
    fn test_unknown_action_message() {
        let err = ActionValidationError::UnknownAction("FLY".to_string());
        assert_eq!(err.to_string(), "Unknown action: FLY");
    }

    #[test]
    fn test_bridge_error_is_transparent() {
        let err: BridgeError = AuthorizationError::Provider("popup closed".to_string()).into();
        assert_eq!(err.to_string(), "Authorization failed: popup closed");
    }
}
