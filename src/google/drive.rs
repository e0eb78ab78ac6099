//! Google Drive 客户端：只读元数据，按修改时间倒序列出最近文件

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::ServiceCallError;
use crate::google::http::{send_json, CallSite};

const LIST: CallSite = CallSite::new("Drive", "list");

/// 只请求需要的字段
const FILE_FIELDS: &str = "files(id,name,mimeType,modifiedTime,owners(displayName))";

pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOwner {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owners: Vec<FileOwner>,
}

#[derive(Debug, Default, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

pub struct DriveClient {
    http: Client,
    files_url: String,
}

impl DriveClient {
    /// base_url 形如 `https://www.googleapis.com/drive/v3`
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http,
            files_url: format!("{}/files", base_url.trim_end_matches('/')),
        }
    }

    pub async fn list_files(&self, token: &str, page_size: u32) -> Result<Vec<DriveFile>, ServiceCallError> {
        let page_size = page_size.to_string();
        let list: FileList = send_json(
            self.http.get(&self.files_url).query(&[
                ("pageSize", page_size.as_str()),
                ("orderBy", "modifiedTime desc"),
                ("fields", FILE_FIELDS),
            ]),
            token,
            LIST,
        )
        .await?;
        Ok(list.files)
    }
}
