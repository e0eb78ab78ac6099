//! 动作种类与类型化动作请求
//!
//! ActionKind 为封闭枚举，每种动作声明所需的 OAuth 范围；ActionRequest 由 ActionObject 校验得到，
//! 参数缺失、为空或类型不符时返回 ActionValidationError。数值 / 布尔参数也接受字符串形式。

use std::fmt;

use serde_json::{Map, Value};

use crate::actions::parser::ActionObject;
use crate::auth::scopes::{self, ScopeSet};
use crate::core::ActionValidationError;
use crate::google::{EmailFilter, EventQuery, NewEvent, NewTask, TaskQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    ReadEmails,
    SendEmail,
    ReplyEmail,
    CreateEvent,
    DeleteEvent,
    ListEvents,
    ListDriveFiles,
    ListTasks,
    CreateTask,
    CompleteTask,
    DeleteTask,
}

impl ActionKind {
    pub const ALL: [ActionKind; 11] = [
        Self::ReadEmails,
        Self::SendEmail,
        Self::ReplyEmail,
        Self::CreateEvent,
        Self::DeleteEvent,
        Self::ListEvents,
        Self::ListDriveFiles,
        Self::ListTasks,
        Self::CreateTask,
        Self::CompleteTask,
        Self::DeleteTask,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadEmails => "READ_EMAILS",
            Self::SendEmail => "SEND_EMAIL",
            Self::ReplyEmail => "REPLY_EMAIL",
            Self::CreateEvent => "CREATE_EVENT",
            Self::DeleteEvent => "DELETE_EVENT",
            Self::ListEvents => "LIST_EVENTS",
            Self::ListDriveFiles => "LIST_DRIVE_FILES",
            Self::ListTasks => "LIST_TASKS",
            Self::CreateTask => "CREATE_TASK",
            Self::CompleteTask => "COMPLETE_TASK",
            Self::DeleteTask => "DELETE_TASK",
        }
    }

    /// 执行该动作所需的范围（不含基线范围）
    pub fn required_scopes(&self) -> ScopeSet {
        let needed: &[&str] = match self {
            Self::ReadEmails => &[scopes::GMAIL_READONLY],
            Self::SendEmail | Self::ReplyEmail => &[scopes::GMAIL_SEND, scopes::GMAIL_READONLY],
            Self::CreateEvent | Self::DeleteEvent | Self::ListEvents => &[scopes::CALENDAR_EVENTS],
            Self::ListDriveFiles => &[scopes::DRIVE_METADATA_READONLY],
            Self::ListTasks | Self::CreateTask | Self::CompleteTask | Self::DeleteTask => &[scopes::TASKS],
        };
        needed.iter().copied().collect()
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 经过校验的动作请求
#[derive(Debug, Clone, PartialEq)]
pub enum ActionRequest {
    ReadEmails {
        filter: EmailFilter,
        max_results: Option<u32>,
    },
    SendEmail {
        recipient: String,
        subject: String,
        content: String,
    },
    ReplyEmail {
        thread_id: String,
        message_id: Option<String>,
        content: String,
    },
    CreateEvent(NewEvent),
    DeleteEvent {
        event_id: String,
    },
    ListEvents(EventQuery),
    ListDriveFiles {
        page_size: u32,
    },
    ListTasks(TaskQuery),
    CreateTask(NewTask),
    CompleteTask {
        task_id: String,
    },
    DeleteTask {
        task_id: String,
    },
}

impl ActionRequest {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::ReadEmails { .. } => ActionKind::ReadEmails,
            Self::SendEmail { .. } => ActionKind::SendEmail,
            Self::ReplyEmail { .. } => ActionKind::ReplyEmail,
            Self::CreateEvent(_) => ActionKind::CreateEvent,
            Self::DeleteEvent { .. } => ActionKind::DeleteEvent,
            Self::ListEvents(_) => ActionKind::ListEvents,
            Self::ListDriveFiles { .. } => ActionKind::ListDriveFiles,
            Self::ListTasks(_) => ActionKind::ListTasks,
            Self::CreateTask(_) => ActionKind::CreateTask,
            Self::CompleteTask { .. } => ActionKind::CompleteTask,
            Self::DeleteTask { .. } => ActionKind::DeleteTask,
        }
    }

    /// 按已知种类校验参数
    pub fn from_params(kind: ActionKind, params: &Map<String, Value>) -> Result<Self, ActionValidationError> {
        let p = Params(params);
        let request = match kind {
            ActionKind::ReadEmails => {
                let raw = p.required_str("filter")?;
                let filter = EmailFilter::parse(&raw).ok_or_else(|| ActionValidationError::InvalidParameter {
                    name: "filter",
                    reason: format!("expected one of most_recent, unread, all; got {raw:?}"),
                })?;
                Self::ReadEmails {
                    filter,
                    max_results: p.optional_u32("maxResults")?,
                }
            }
            ActionKind::SendEmail => Self::SendEmail {
                recipient: p.required_str("recipient")?,
                subject: p.required_str("subject")?,
                content: p.required_str("content")?,
            },
            ActionKind::ReplyEmail => Self::ReplyEmail {
                thread_id: p.required_str("threadId")?,
                message_id: p.optional_str("messageId")?,
                content: p.required_str("content")?,
            },
            ActionKind::CreateEvent => Self::CreateEvent(NewEvent {
                title: p.required_str("title")?,
                start: p.required_str("start")?,
                end: p.required_str("end")?,
                description: p.optional_str("description")?,
                attendees: p.string_list("attendees")?,
            }),
            ActionKind::DeleteEvent => Self::DeleteEvent {
                event_id: p.required_str("eventId")?,
            },
            ActionKind::ListEvents => Self::ListEvents(EventQuery {
                time_min: p.optional_str("timeMin")?,
                time_max: p.optional_str("timeMax")?,
                q: p.optional_str("q")?,
                max_results: p.optional_u32("maxResults")?,
            }),
            ActionKind::ListDriveFiles => Self::ListDriveFiles {
                page_size: p
                    .optional_u32("pageSize")?
                    .unwrap_or(crate::google::drive::DEFAULT_PAGE_SIZE),
            },
            ActionKind::ListTasks => Self::ListTasks(TaskQuery {
                show_completed: p.optional_bool("showCompleted")?,
                max_results: p.optional_u32("maxResults")?,
            }),
            ActionKind::CreateTask => Self::CreateTask(NewTask {
                title: p.required_str("title")?,
                due: p.optional_str("due")?,
                notes: p.optional_str("notes")?,
            }),
            ActionKind::CompleteTask => Self::CompleteTask {
                task_id: p.required_str("taskId")?,
            },
            ActionKind::DeleteTask => Self::DeleteTask {
                task_id: p.required_str("taskId")?,
            },
        };
        Ok(request)
    }
}

impl TryFrom<&ActionObject> for ActionRequest {
    type Error = ActionValidationError;

    fn try_from(obj: &ActionObject) -> Result<Self, Self::Error> {
        let kind = ActionKind::parse(&obj.action)
            .ok_or_else(|| ActionValidationError::UnknownAction(obj.action.clone()))?;
        Self::from_params(kind, &obj.params)
    }
}

/// 宽松的参数读取：空白字符串等同缺失
struct Params<'a>(&'a Map<String, Value>);

fn invalid(name: &'static str, reason: &str) -> ActionValidationError {
    ActionValidationError::InvalidParameter {
        name,
        reason: reason.to_string(),
    }
}

impl Params<'_> {
    fn present(&self, name: &str) -> Option<&Value> {
        match self.0.get(name)? {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            v => Some(v),
        }
    }

    fn required_str(&self, name: &'static str) -> Result<String, ActionValidationError> {
        self.optional_str(name)?
            .ok_or(ActionValidationError::MissingParameter(name))
    }

    fn optional_str(&self, name: &'static str) -> Result<Option<String>, ActionValidationError> {
        match self.present(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
            Some(_) => Err(invalid(name, "expected a string")),
        }
    }

    fn optional_u32(&self, name: &'static str) -> Result<Option<u32>, ActionValidationError> {
        let parsed = match self.present(name) {
            None => return Ok(None),
            Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Some(Value::String(s)) => s.trim().parse::<u32>().ok(),
            Some(_) => None,
        };
        parsed
            .map(Some)
            .ok_or_else(|| invalid(name, "expected a non-negative integer"))
    }

    fn optional_bool(&self, name: &'static str) -> Result<Option<bool>, ActionValidationError> {
        match self.present(name) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(invalid(name, "expected true or false")),
            },
            Some(_) => Err(invalid(name, "expected true or false")),
        }
    }

    /// 字符串数组，或逗号分隔的字符串
    fn string_list(&self, name: &'static str) -> Result<Vec<String>, ActionValidationError> {
        let items: Vec<String> = match self.present(name) {
            None => return Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<_>>()
                .ok_or_else(|| invalid(name, "expected a list of strings"))?,
            Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
            Some(_) => return Err(invalid(name, "expected a list of strings")),
        };
        Ok(items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    }
}
