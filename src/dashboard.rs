//! Dashboard：一次授权后并发拉取邮件、日程、云盘文件与待办的概览
//!
//! 四个数据源各自成败独立记录；授权失败则整次刷新失败。重要邮件由 Agent 排序，失败时退回按日期排序。

use std::cmp::Reverse;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde_json::Value;

use crate::actions::parser::strip_code_fence;
use crate::auth::scopes::{self, ScopeSet};
use crate::auth::TokenSource;
use crate::core::{AuthorizationError, DashboardError};
use crate::google::{
    CalendarEvent, DriveFile, EmailFilter, EventQuery, GoogleWorkspace, MessageSummary, SentMessage,
    TaskItem, TaskQuery,
};
use crate::runtime::{extract_reply_text, SessionManager};

const EMAIL_LIMIT: u32 = 20;
const EVENT_LIMIT: u32 = 10;
const FILE_LIMIT: u32 = 10;
const TASK_LIMIT: u32 = 10;
/// 重要邮件展示条数
pub const IMPORTANT_LIMIT: usize = 5;

/// 各数据源的结果；Err 为展示用的错误信息
#[derive(Debug)]
pub struct DashboardSnapshot {
    pub emails: Result<Vec<MessageSummary>, String>,
    pub events: Result<Vec<CalendarEvent>, String>,
    pub files: Result<Vec<DriveFile>, String>,
    pub tasks: Result<Vec<TaskItem>, String>,
}

pub struct Dashboard {
    tokens: Arc<dyn TokenSource>,
    workspace: Arc<GoogleWorkspace>,
    sessions: Arc<SessionManager>,
}

impl Dashboard {
    pub fn new(
        tokens: Arc<dyn TokenSource>,
        workspace: Arc<GoogleWorkspace>,
        sessions: Arc<SessionManager>,
    ) -> Self {
        Self {
            tokens,
            workspace,
            sessions,
        }
    }

    pub async fn refresh(&self) -> Result<DashboardSnapshot, AuthorizationError> {
        let required: ScopeSet = [
            scopes::GMAIL_READONLY,
            scopes::CALENDAR_EVENTS,
            scopes::DRIVE_METADATA_READONLY,
            scopes::TASKS,
        ]
        .into_iter()
        .collect();
        let token = self.tokens.access_token(&required).await?;
        let ws = &self.workspace;

        let events_query = EventQuery {
            time_min: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
            max_results: Some(EVENT_LIMIT),
            ..EventQuery::default()
        };
        let tasks_query = TaskQuery {
            show_completed: Some(false),
            max_results: Some(TASK_LIMIT),
        };
        let (emails, events, files, tasks) = tokio::join!(
            ws.mail.list_messages(&token, EmailFilter::All, Some(EMAIL_LIMIT)),
            ws.calendar.list_events(&token, &events_query),
            ws.drive.list_files(&token, FILE_LIMIT),
            ws.tasks.list_tasks(&token, &tasks_query),
        );

        let snapshot = DashboardSnapshot {
            emails: emails.map_err(|e| e.to_string()),
            events: events.map_err(|e| e.to_string()),
            files: files.map_err(|e| e.to_string()),
            tasks: tasks.map_err(|e| e.to_string()),
        };
        tracing::info!(
            emails = snapshot.emails.is_ok(),
            events = snapshot.events.is_ok(),
            files = snapshot.files.is_ok(),
            tasks = snapshot.tasks.is_ok(),
            "dashboard refreshed"
        );
        Ok(snapshot)
    }

    /// 由 Agent 挑选最重要的邮件；任何失败都退回按日期取最新几封
    pub async fn important_emails(&self, emails: &[MessageSummary]) -> Vec<MessageSummary> {
        let newest = newest_first(emails);
        let fallback = || newest.iter().take(IMPORTANT_LIMIT).cloned().collect::<Vec<_>>();
        if newest.is_empty() {
            return Vec::new();
        }

        let reply = match self.ask_agent(ranking_prompt(&newest)).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "email ranking failed, using date order");
                return fallback();
            }
        };
        let ranked = parse_ranked_ids(&reply)
            .map(|ids| pick_by_ids(&newest, &ids))
            .unwrap_or_default();
        if ranked.is_empty() {
            tracing::debug!("agent ranking unusable, using date order");
            fallback()
        } else {
            ranked
        }
    }

    pub async fn open_email(&self, message_id: &str) -> Result<String, DashboardError> {
        let required: ScopeSet = [scopes::GMAIL_READONLY].into_iter().collect();
        let token = self.tokens.access_token(&required).await?;
        Ok(self.workspace.mail.read_body(&token, message_id).await?)
    }

    /// 读取正文并请 Agent 起草简短、专业的回复
    pub async fn draft_reply(&self, email: &MessageSummary) -> Result<String, DashboardError> {
        let body = self.open_email(&email.id).await?;
        let prompt = format!(
            "Write a short, professional reply to the email below. Return only the reply body, no subject line and no JSON.\n\nFrom: {}\nSubject: {}\n\n{}",
            email.from.as_deref().unwrap_or("(unknown)"),
            email.subject.as_deref().unwrap_or("(no subject)"),
            body
        );
        Ok(self.ask_agent(prompt).await?.trim().to_string())
    }

    pub async fn send_reply(
        &self,
        email: &MessageSummary,
        draft: &str,
    ) -> Result<SentMessage, DashboardError> {
        let required: ScopeSet = [scopes::GMAIL_SEND, scopes::GMAIL_READONLY].into_iter().collect();
        let token = self.tokens.access_token(&required).await?;
        Ok(self
            .workspace
            .mail
            .reply(&token, &email.thread_id, Some(&email.id), draft)
            .await?)
    }

    async fn ask_agent(&self, prompt: String) -> Result<String, DashboardError> {
        let session_id = self.sessions.ensure_session().await?;
        let response = self.sessions.runtime().run(&session_id, &[prompt]).await?;
        Ok(extract_reply_text(&response))
    }
}

/// Gmail 的 Date 头可能带 `(UTC)` 之类的注释
fn parse_email_date(date: &str) -> Option<DateTime<FixedOffset>> {
    let date = match date.find('(') {
        Some(i) => date[..i].trim(),
        None => date.trim(),
    };
    DateTime::parse_from_rfc2822(date).ok()
}

/// 按日期倒序取最新的若干封；无法解析日期的排在最后
fn newest_first(emails: &[MessageSummary]) -> Vec<MessageSummary> {
    let mut sorted = emails.to_vec();
    sorted.sort_by_key(|e| Reverse(e.date.as_deref().and_then(parse_email_date)));
    sorted.truncate(EMAIL_LIMIT as usize);
    sorted
}

fn ranking_prompt(emails: &[MessageSummary]) -> String {
    let mut prompt = String::from(
        "Rank these emails by importance to the user. Return ONLY a JSON array of ids, most important first.\n\n",
    );
    for e in emails {
        let _ = writeln!(
            prompt,
            "id={} | from={} | subject={} | date={} | snippet={}",
            e.id,
            e.from.as_deref().unwrap_or(""),
            e.subject.as_deref().unwrap_or(""),
            e.date.as_deref().unwrap_or(""),
            e.snippet.as_deref().unwrap_or("")
        );
    }
    prompt
}

/// 取回复中的 JSON 数组，只保留字符串元素；数字、null 等混入的项被跳过
fn parse_ranked_ids(reply: &str) -> Option<Vec<String>> {
    let body = strip_code_fence(reply);
    let start = body.find('[')?;
    let end = body.rfind(']')?;
    if end < start {
        return None;
    }
    let items: Vec<Value> = serde_json::from_str(&body[start..=end]).ok()?;
    Some(
        items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(id) => Some(id),
                _ => None,
            })
            .collect(),
    )
}

fn pick_by_ids(emails: &[MessageSummary], ids: &[String]) -> Vec<MessageSummary> {
    let mut picked: Vec<MessageSummary> = Vec::new();
    for id in ids {
        if picked.len() == IMPORTANT_LIMIT {
            break;
        }
        if picked.iter().any(|p| &p.id == id) {
            continue;
        }
        if let Some(email) = emails.iter().find(|e| &e.id == id) {
            picked.push(email.clone());
        }
    }
    picked
}

impl DashboardSnapshot {
    /// 控制台展示
    pub fn render(&self, important: &[MessageSummary]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "== Important emails ==");
        match &self.emails {
            Ok(_) if important.is_empty() => {
                let _ = writeln!(out, "  (none)");
            }
            Ok(_) => {
                for e in important {
                    let _ = writeln!(
                        out,
                        "  [{}] {} | {}",
                        e.id,
                        e.from.as_deref().unwrap_or("?"),
                        e.subject.as_deref().unwrap_or("(no subject)")
                    );
                }
            }
            Err(e) => {
                let _ = writeln!(out, "  error: {e}");
            }
        }

        let _ = writeln!(out, "== Upcoming events ==");
        render_section(&mut out, &self.events, |ev| {
            format!(
                "{} | {}",
                ev.start.as_ref().map(|t| t.display()).unwrap_or(""),
                ev.summary.as_deref().unwrap_or("(untitled)")
            )
        });
        let _ = writeln!(out, "== Recent files ==");
        render_section(&mut out, &self.files, |f| {
            format!("{} | {}", f.name, f.modified_time.as_deref().unwrap_or(""))
        });
        let _ = writeln!(out, "== Open tasks ==");
        render_section(&mut out, &self.tasks, |t| {
            format!(
                "{}{}",
                t.title.as_deref().unwrap_or("(untitled)"),
                t.due.as_deref().map(|d| format!(" (due {d})")).unwrap_or_default()
            )
        });
        out
    }
}

fn render_section<T>(out: &mut String, items: &Result<Vec<T>, String>, line: impl Fn(&T) -> String) {
    match items {
        Ok(items) if items.is_empty() => {
            let _ = writeln!(out, "  (none)");
        }
        Ok(items) => {
            for item in items {
                let _ = writeln!(out, "  {}", line(item));
            }
        }
        Err(e) => {
            let _ = writeln!(out, "  error: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::RecordingTokenSource;
    use crate::runtime::ScriptedAgentRuntime;
    use reqwest::Client;
    use serde_json::json;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn email(id: &str, date: &str) -> MessageSummary {
        MessageSummary {
            id: id.to_string(),
            thread_id: format!("t-{id}"),
            date: Some(date.to_string()),
            subject: Some(format!("subject {id}")),
            ..MessageSummary::default()
        }
    }

    fn dashboard(
        base_url: &str,
        tokens: Arc<RecordingTokenSource>,
        runtime: Arc<ScriptedAgentRuntime>,
    ) -> Dashboard {
        Dashboard::new(
            tokens,
            Arc::new(GoogleWorkspace::with_base_url(Client::new(), base_url)),
            Arc::new(SessionManager::new(runtime)),
        )
    }

    #[test]
    fn test_newest_first_handles_comments_and_garbage() {
        let emails = vec![
            email("old", "Mon, 30 Sep 2024 08:00:00 +0000"),
            email("bad", "yesterday"),
            email("new", "Tue, 1 Oct 2024 09:00:00 +0000 (UTC)"),
        ];
        let ids: Vec<_> = newest_first(&emails).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["new", "old", "bad"]);
    }

    #[test]
    fn test_parse_ranked_ids() {
        assert_eq!(
            parse_ranked_ids("```json\n[\"b\", \"a\"]\n```"),
            Some(vec!["b".to_string(), "a".to_string()])
        );
        assert_eq!(parse_ranked_ids("no list here"), None);
    }

    #[test]
    fn test_parse_ranked_ids_skips_non_string_entries() {
        assert_eq!(
            parse_ranked_ids("Most important: [\"b\", 3, null, {\"id\": \"c\"}, \"a\"]"),
            Some(vec!["b".to_string(), "a".to_string()])
        );
        assert_eq!(parse_ranked_ids("[1, 2]"), Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_important_emails_uses_agent_ranking() {
        let runtime = Arc::new(ScriptedAgentRuntime::new().reply("[\"b\", \"zzz\", \"b\", \"a\"]"));
        let d = dashboard("http://127.0.0.1:9", Arc::new(RecordingTokenSource::granting()), runtime.clone());
        let emails = vec![
            email("a", "Tue, 1 Oct 2024 09:00:00 +0000"),
            email("b", "Mon, 30 Sep 2024 08:00:00 +0000"),
        ];

        let ids: Vec<_> = d.important_emails(&emails).await.into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!(runtime.turns()[0][0].contains("Return ONLY a JSON array of ids"));
    }

    #[tokio::test]
    async fn test_important_emails_keeps_ranking_with_mixed_entries() {
        let runtime = Arc::new(ScriptedAgentRuntime::new().reply("[\"b\", 7, null, \"a\"]"));
        let d = dashboard("http://127.0.0.1:9", Arc::new(RecordingTokenSource::granting()), runtime);
        let emails = vec![
            email("a", "Tue, 1 Oct 2024 09:00:00 +0000"),
            email("b", "Mon, 30 Sep 2024 08:00:00 +0000"),
            email("c", "Wed, 2 Oct 2024 09:00:00 +0000"),
        ];

        let ids: Vec<_> = d.important_emails(&emails).await.into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_important_emails_falls_back_to_date_order() {
        let runtime = Arc::new(ScriptedAgentRuntime::new().fail_run(500, "down"));
        let d = dashboard("http://127.0.0.1:9", Arc::new(RecordingTokenSource::granting()), runtime);
        let emails: Vec<_> = (1..=7)
            .map(|day| email(&format!("m{day}"), &format!("{day} Oct 2024 10:00:00 +0000")))
            .collect();

        let ids: Vec<_> = d.important_emails(&emails).await.into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["m7", "m6", "m5", "m4", "m3"]);
    }

    #[tokio::test]
    async fn test_refresh_tracks_each_source() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/calendar/v3/calendars/primary/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [{ "id": "e1" }] })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .respond_with(ResponseTemplate::new(403).set_body_string("drive disabled"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex("^/tasks/v1/users/@me/lists$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
            .mount(&server)
            .await;
        let tokens = Arc::new(RecordingTokenSource::granting());

        let snapshot = dashboard(&server.uri(), tokens.clone(), Arc::new(ScriptedAgentRuntime::new()))
            .refresh()
            .await
            .unwrap();

        assert_eq!(snapshot.emails.as_ref().map(Vec::len), Ok(0));
        assert_eq!(snapshot.events.as_ref().map(Vec::len), Ok(1));
        assert_eq!(snapshot.files.as_ref().unwrap_err(), "Drive list failed 403: drive disabled");
        assert_eq!(
            snapshot.tasks.as_ref().unwrap_err(),
            "No Google Task lists found for user"
        );

        let requests = tokens.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].len(), 4);

        let rendered = snapshot.render(&[]);
        assert!(rendered.contains("error: Drive list failed 403"));
    }

    #[tokio::test]
    async fn test_refresh_fails_without_authorization() {
        let d = dashboard(
            "http://127.0.0.1:9",
            Arc::new(RecordingTokenSource::denying()),
            Arc::new(ScriptedAgentRuntime::new()),
        );
        assert!(d.refresh().await.is_err());
    }

    #[tokio::test]
    async fn test_draft_and_send_reply() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages/m1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "m1",
                "snippet": "Can we meet Friday?",
                "payload": { "headers": [{ "name": "From", "value": "Ada <ada@x.com>" }] }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/gmail/v1/users/me/messages/send"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "r1", "threadId": "t-m1" })))
            .expect(1)
            .mount(&server)
            .await;
        let runtime = Arc::new(ScriptedAgentRuntime::new().reply("  Friday works for me.  "));
        let tokens = Arc::new(RecordingTokenSource::granting());
        let d = dashboard(&server.uri(), tokens.clone(), runtime.clone());
        let summary = email("m1", "Tue, 1 Oct 2024 09:00:00 +0000");

        let draft = d.draft_reply(&summary).await.unwrap();
        assert_eq!(draft, "Friday works for me.");
        assert!(runtime.turns()[0][0].contains("Can we meet Friday?"));

        let sent = d.send_reply(&summary, &draft).await.unwrap();
        assert_eq!(sent.id, "r1");
        assert!(tokens.requests()[1].contains(scopes::GMAIL_SEND));
    }
}
