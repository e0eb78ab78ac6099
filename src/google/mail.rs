//! Gmail 客户端
//!
//! list_messages：先按过滤条件列出消息 ID，再并发拉取每封邮件的元数据（From / Subject / Date / snippet / labels）；
//! 单封元数据失败时降级为只含 id / threadId 的摘要。发送与回复构造 raw MIME 并 URL-safe base64 编码。

use futures_util::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::core::ServiceCallError;
use crate::google::http::{resource_url, send_json, CallSite};
use crate::google::mime::{
    base64url_encode, build_raw_message, extract_address, extract_plain_text, header, MessagePart,
};

const LIST: CallSite = CallSite::new("Gmail", "list");
const METADATA: CallSite = CallSite::new("Gmail", "metadata");
const READ_BODY: CallSite = CallSite::new("Gmail", "read body");
const SEND: CallSite = CallSite::new("Gmail", "send");
const REPLY: CallSite = CallSite::new("Gmail", "reply");
const THREAD: CallSite = CallSite::new("Gmail", "thread");

/// 回复时无法确定收件人的占位地址
pub const UNDISCLOSED_RECIPIENTS: &str = "undisclosed-recipients:;";

/// 读取邮件的过滤方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailFilter {
    MostRecent,
    Unread,
    All,
}

impl EmailFilter {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "most_recent" => Some(Self::MostRecent),
            "unread" => Some(Self::Unread),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MostRecent => "most_recent",
            Self::Unread => "unread",
            Self::All => "all",
        }
    }

    fn default_max_results(&self) -> u32 {
        match self {
            Self::MostRecent => 1,
            Self::Unread | Self::All => 5,
        }
    }
}

/// 邮件摘要
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    pub id: String,
    pub thread_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default)]
    pub label_ids: Vec<String>,
}

/// send 接口返回的消息 id 与会话 id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    #[serde(default)]
    pub id: String,
    pub thread_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageRef {
    id: String,
    #[serde(default)]
    thread_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessage {
    id: Option<String>,
    thread_id: Option<String>,
    snippet: Option<String>,
    #[serde(default)]
    label_ids: Vec<String>,
    payload: Option<MessagePart>,
}

impl GmailMessage {
    fn headers(&self) -> &[crate::google::mime::Header] {
        self.payload.as_ref().map(|p| p.headers.as_slice()).unwrap_or(&[])
    }
}

#[derive(Debug, Default, Deserialize)]
struct Thread {
    #[serde(default)]
    messages: Vec<GmailMessage>,
}

pub struct MailClient {
    http: Client,
    base_url: String,
}

impl MailClient {
    /// base_url 形如 `https://gmail.googleapis.com/gmail/v1/users/me`
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// 列出收件箱邮件并并发补全元数据
    pub async fn list_messages(
        &self,
        token: &str,
        filter: EmailFilter,
        max_results: Option<u32>,
    ) -> Result<Vec<MessageSummary>, ServiceCallError> {
        let max = max_results.unwrap_or_else(|| filter.default_max_results()).to_string();
        let mut query = vec![
            ("labelIds", "INBOX"),
            ("includeSpamTrash", "false"),
            ("maxResults", max.as_str()),
        ];
        if filter == EmailFilter::Unread {
            query.push(("q", "is:unread"));
        }
        let list: MessageList = send_json(
            self.http
                .get(format!("{}/messages", self.base_url))
                .query(&query),
            token,
            LIST,
        )
        .await?;

        tracing::debug!(count = list.messages.len(), filter = filter.as_str(), "gmail list");
        let fetches = list
            .messages
            .into_iter()
            .map(|m| self.fetch_summary(token, m));
        Ok(join_all(fetches).await)
    }

    /// format=metadata，只取指定的头
    async fn metadata(&self, token: &str, message_id: &str, headers: &[&str]) -> Result<GmailMessage, ServiceCallError> {
        let url = resource_url(&self.base_url, &["messages", message_id], METADATA)?;
        let mut params = vec![("format", "metadata")];
        params.extend(headers.iter().map(|h| ("metadataHeaders", *h)));
        send_json(self.http.get(url).query(&params), token, METADATA).await
    }

    async fn fetch_summary(&self, token: &str, m: MessageRef) -> MessageSummary {
        let fetched = self.metadata(token, &m.id, &["From", "Subject", "Date"]).await;
        match fetched {
            Ok(msg) => MessageSummary {
                from: header(msg.headers(), "From").map(String::from),
                subject: header(msg.headers(), "Subject").map(String::from),
                date: header(msg.headers(), "Date").map(String::from),
                id: msg.id.clone().unwrap_or(m.id),
                thread_id: msg.thread_id.clone().unwrap_or(m.thread_id),
                snippet: msg.snippet,
                label_ids: msg.label_ids,
            },
            Err(e) => {
                tracing::warn!(id = %m.id, error = %e, "gmail metadata fetch failed");
                MessageSummary {
                    id: m.id,
                    thread_id: m.thread_id,
                    ..MessageSummary::default()
                }
            }
        }
    }

    /// 读取完整正文（format=full），无纯文本时退回 snippet
    pub async fn read_body(&self, token: &str, message_id: &str) -> Result<String, ServiceCallError> {
        let url = resource_url(&self.base_url, &["messages", message_id], READ_BODY)?;
        let msg: GmailMessage = send_json(
            self.http.get(url).query(&[("format", "full")]),
            token,
            READ_BODY,
        )
        .await?;
        let text = msg.payload.as_ref().map(extract_plain_text).unwrap_or_default();
        if text.is_empty() {
            Ok(msg.snippet.unwrap_or_default())
        } else {
            Ok(text)
        }
    }

    pub async fn send(
        &self,
        token: &str,
        recipient: &str,
        subject: &str,
        content: &str,
    ) -> Result<SentMessage, ServiceCallError> {
        let raw = base64url_encode(build_raw_message(recipient, subject, content));
        send_json(
            self.http
                .post(format!("{}/messages/send", self.base_url))
                .json(&json!({ "raw": raw })),
            token,
            SEND,
        )
        .await
    }

    /// 回复会话：收件人取原邮件 From（若给了 message_id），否则取会话最后一封的 From
    pub async fn reply(
        &self,
        token: &str,
        thread_id: &str,
        message_id: Option<&str>,
        content: &str,
    ) -> Result<SentMessage, ServiceCallError> {
        let mut to = None;
        if let Some(id) = message_id {
            to = self.sender_of_message(token, id).await;
        }
        if to.is_none() {
            to = self.sender_of_thread(token, thread_id).await;
        }
        let to = to.unwrap_or_else(|| UNDISCLOSED_RECIPIENTS.to_string());

        let raw = base64url_encode(build_raw_message(&to, "Re:", content));
        send_json(
            self.http
                .post(format!("{}/messages/send", self.base_url))
                .json(&json!({ "raw": raw, "threadId": thread_id })),
            token,
            REPLY,
        )
        .await
    }

    async fn sender_of_message(&self, token: &str, message_id: &str) -> Option<String> {
        let msg = self.metadata(token, message_id, &["From", "Message-Id"]).await.ok()?;
        header(msg.headers(), "From").map(extract_address)
    }

    async fn sender_of_thread(&self, token: &str, thread_id: &str) -> Option<String> {
        let url = resource_url(&self.base_url, &["threads", thread_id], THREAD).ok()?;
        let thread: Thread = send_json(self.http.get(url), token, THREAD).await.ok()?;
        let last = thread.messages.last()?;
        header(last.headers(), "From").map(extract_address)
    }
}
