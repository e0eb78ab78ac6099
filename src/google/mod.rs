//! Google Workspace 服务客户端：Gmail / Calendar / Drive / Tasks
//!
//! 每个客户端把领域参数翻译成 REST 调用，把响应翻译成领域摘要；令牌由调用方按动作所需范围获取后传入。

pub mod calendar;
pub mod drive;
pub mod http;
pub mod mail;
pub mod mime;
pub mod tasks;

pub use calendar::{CalendarClient, CalendarEvent, EventQuery, NewEvent};
pub use drive::{DriveClient, DriveFile};
pub use mail::{EmailFilter, MailClient, MessageSummary, SentMessage};
pub use tasks::{NewTask, TaskItem, TaskQuery, TasksClient};

use reqwest::Client;

use crate::config::GoogleSection;

/// 四个服务客户端的集合，共享同一个 reqwest Client
pub struct GoogleWorkspace {
    pub mail: MailClient,
    pub calendar: CalendarClient,
    pub drive: DriveClient,
    pub tasks: TasksClient,
}

impl GoogleWorkspace {
    pub fn new(http: Client, cfg: &GoogleSection) -> Self {
        Self {
            mail: MailClient::new(http.clone(), cfg.gmail_base_url.clone()),
            calendar: CalendarClient::new(http.clone(), cfg.calendar_base_url.clone()),
            drive: DriveClient::new(http.clone(), cfg.drive_base_url.clone()),
            tasks: TasksClient::new(http, cfg.tasks_base_url.clone()),
        }
    }

    /// 所有服务指向同一个根地址（测试中指向 mock server）
    pub fn with_base_url(http: Client, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let cfg = GoogleSection {
            gmail_base_url: format!("{base}/gmail/v1/users/me"),
            calendar_base_url: format!("{base}/calendar/v3"),
            drive_base_url: format!("{base}/drive/v3"),
            tasks_base_url: format!("{base}/tasks/v1"),
            ..GoogleSection::default()
        };
        Self::new(http, &cfg)
    }
}
