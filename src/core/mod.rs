//! 核心层：桥接各层共用的错误类型

pub mod error;

pub use error::{
    ActionValidationError, AgentRuntimeError, AuthorizationError, BridgeError, DashboardError,
    ParseError, ServiceCallError, SessionCreationError,
};
