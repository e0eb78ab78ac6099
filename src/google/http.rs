//! Google REST 调用的公共部分
//!
//! 所有请求带 Bearer 令牌；非 2xx 视为该次调用失败：读取响应体文本，连同状态码一起放入 ServiceCallError。
//! 路径中的 id 一律作为单个路径段编码（`/`、`?`、`#` 等被转义），不能改变请求的目标资源。

use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;

use crate::core::ServiceCallError;

/// 调用点：服务名 + 操作名，用于错误信息与日志
#[derive(Debug, Clone, Copy)]
pub struct CallSite {
    pub service: &'static str,
    pub operation: &'static str,
}

impl CallSite {
    pub const fn new(service: &'static str, operation: &'static str) -> Self {
        Self { service, operation }
    }

    fn transport(self, err: reqwest::Error) -> ServiceCallError {
        ServiceCallError::Transport {
            service: self.service,
            operation: self.operation,
            message: err.to_string(),
        }
    }

    fn decode(self, message: impl Into<String>) -> ServiceCallError {
        ServiceCallError::Decode {
            service: self.service,
            operation: self.operation,
            message: message.into(),
        }
    }
}

/// 在 base 后逐段追加路径；每段各自百分号编码。空段与 `.` / `..` 会被拒绝
pub fn resource_url(base: &str, segments: &[&str], site: CallSite) -> Result<Url, ServiceCallError> {
    if let Some(bad) = segments.iter().find(|s| matches!(s.trim(), "" | "." | "..")) {
        return Err(ServiceCallError::InvalidId {
            service: site.service,
            operation: site.operation,
            id: bad.to_string(),
        });
    }
    let mut url = Url::parse(base).map_err(|e| site.decode(format!("invalid base url {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| site.decode(format!("base url cannot take path segments: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn send_checked(
    request: RequestBuilder,
    token: &str,
    site: CallSite,
) -> Result<Response, ServiceCallError> {
    let resp = request
        .bearer_auth(token)
        .send()
        .await
        .map_err(|e| site.transport(e))?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        tracing::warn!(
            service = site.service,
            operation = site.operation,
            status = status.as_u16(),
            "google call failed"
        );
        return Err(ServiceCallError::Status {
            service: site.service,
            operation: site.operation,
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}

/// 发送请求并把 JSON 响应体解码为 T
pub async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    token: &str,
    site: CallSite,
) -> Result<T, ServiceCallError> {
    let resp = send_checked(request, token, site).await?;
    let text = resp.text().await.map_err(|e| site.transport(e))?;
    let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
    serde_json::from_str(text).map_err(|e| site.decode(e.to_string()))
}

/// 发送请求，只关心是否成功（如 DELETE 的 204）
pub async fn send_empty(
    request: RequestBuilder,
    token: &str,
    site: CallSite,
) -> Result<(), ServiceCallError> {
    send_checked(request, token, site).await.map(|_| ())
}
