//! Butler - Google Workspace 智能助理的动作执行桥
//!
//! 模块划分：
//! - **actions**: 从 Agent 回复中提取动作、校验、授权并执行
//! - **app**: 由配置组装桥接层与 Dashboard
//! - **auth**: OAuth 范围、令牌代理（缓存 + 可注入时钟）、授权提供方
//! - **bridge**: 提示词 → Agent → 动作 → 结果回传的单次往返
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 各层错误类型
//! - **dashboard**: 邮件 / 日程 / 云盘 / 待办概览
//! - **google**: Gmail、Calendar、Drive、Tasks REST 客户端
//! - **observability**: tracing 初始化与日志预览
//! - **runtime**: Agent 运行时客户端、会话与回复解析

pub mod actions;
pub mod app;
pub mod auth;
pub mod bridge;
pub mod config;
pub mod core;
pub mod dashboard;
pub mod google;
pub mod observability;
pub mod runtime;
