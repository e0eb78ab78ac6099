//! 把动作结果回传给 Agent，取回它的后续回复

use crate::actions::ActionResult;
use crate::core::AgentRuntimeError;
use crate::runtime::{extract_reply_text, AgentRuntime};

/// 结果回合的第一段文本，Agent 据此识别这是动作执行结果
pub const ACTION_RESULT_MARKER: &str = "ACTION_RESULT";

/// 发送两段式 user 回合（标记 + 结果 JSON），返回解析后的回复文本
pub async fn continue_with_result(
    runtime: &dyn AgentRuntime,
    session_id: &str,
    result: &ActionResult,
) -> Result<String, AgentRuntimeError> {
    let parts = [ACTION_RESULT_MARKER.to_string(), result.to_json().to_string()];
    let response = runtime.run(session_id, &parts).await?;
    Ok(extract_reply_text(&response))
}
