//! Agent 运行时层：会话、对话调用与回复解析

pub mod client;
pub mod mock;
pub mod response;
pub mod session;

pub use client::{AgentRuntime, HttpAgentRuntime};
pub use mock::ScriptedAgentRuntime;
pub use response::{extract_reply_text, AgentEvent, AgentResponse};
pub use session::{Session, SessionManager};
