//! 动作层：从 Agent 回复中提取动作、校验为类型化请求、授权并执行

pub mod dispatcher;
pub mod parser;
pub mod request;
pub mod result;

pub use dispatcher::ActionDispatcher;
pub use parser::{extract_action_object, parse_action_object, ActionObject};
pub use request::{ActionKind, ActionRequest};
pub use result::ActionResult;
