//! Gmail 消息编解码
//!
//! - raw 消息：To / Subject / MIME-Version / Content-Type + 空行 + 正文（CRLF），URL-safe base64 无填充
//! - 读取正文：递归遍历 MIME part 树，优先 text/plain 叶子
//! - 解码时补齐 `=` 填充后按 URL-safe 字母表解码

use std::sync::OnceLock;

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use regex::Regex;
use serde::Deserialize;

/// 邮件头（name / value）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartBody {
    pub data: Option<String>,
}

/// Gmail `payload` 节点（MIME part 树）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    pub mime_type: Option<String>,
    #[serde(default)]
    pub headers: Vec<Header>,
    pub body: Option<PartBody>,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl MessagePart {
    fn is_plain_text(&self) -> bool {
        self.mime_type.as_deref() == Some("text/plain")
    }

    fn data(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|b| b.data.as_deref())
            .filter(|d| !d.is_empty())
    }
}

pub fn base64url_encode(input: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(input)
}

/// URL-safe base64 解码，缺失的 `=` 填充会先补齐
pub fn base64url_decode(input: &str) -> Option<Vec<u8>> {
    let trimmed = input.trim().trim_end_matches('=');
    let pad = (4 - trimmed.len() % 4) % 4;
    let mut padded = String::with_capacity(trimmed.len() + pad);
    padded.push_str(trimmed);
    padded.extend(std::iter::repeat('=').take(pad));
    URL_SAFE.decode(padded).ok()
}

/// 解码为文本；非 UTF-8 字节以替换字符保留
pub fn base64url_decode_to_string(input: &str) -> String {
    base64url_decode(input)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// 构建 text/plain 的 RFC 822 原始消息
pub fn build_raw_message(to: &str, subject: &str, body: &str) -> String {
    format!(
        "To: {to}\r\nSubject: {subject}\r\nMIME-Version: 1.0\r\nContent-Type: text/plain; charset=\"UTF-8\"\r\n\r\n{body}"
    )
}

/// 按名称（大小写不敏感）查找邮件头
pub fn header<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

/// 从 `Name <addr@x.com>` 中取出尖括号内地址；没有尖括号则原样返回
pub fn extract_address(from: &str) -> String {
    static ADDRESS: OnceLock<Option<Regex>> = OnceLock::new();
    let re = ADDRESS.get_or_init(|| Regex::new(r"<([^>]+)>").ok());
    re.as_ref()
        .and_then(|re| re.captures(from))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| from.to_string())
}

/// 从 MIME 树中提取纯文本正文：
/// 自身是 text/plain → 直接子节点中的 text/plain → 递归子节点 → 自身 body
pub fn extract_plain_text(part: &MessagePart) -> String {
    if part.is_plain_text() {
        if let Some(data) = part.data() {
            return base64url_decode_to_string(data);
        }
    }
    if let Some(data) = part.parts.iter().filter(|p| p.is_plain_text()).find_map(|p| p.data()) {
        return base64url_decode_to_string(data);
    }
    for child in &part.parts {
        let text = extract_plain_text(child);
        if !text.is_empty() {
            return text;
        }
    }
    part.data().map(base64url_decode_to_string).unwrap_or_default()
}
