//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `BUTLER__*` 覆盖（双下划线表示嵌套，如 `BUTLER__AGENT__BASE_URL=http://localhost:8000`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub google: GoogleSection,
    #[serde(default)]
    pub http: HttpSection,
}

/// [agent] 段：外部 Agent 运行时（ADK 兼容 HTTP API）
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    #[serde(default = "default_agent_base_url")]
    pub base_url: String,
    /// 运行时中注册的 agent 名（同时作为 app_name 发送）
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_user_id")]
    pub user_id: String,
    /// 对话调用路径，可含 `:agent` 占位符
    #[serde(default = "default_invoke_path")]
    pub invoke_path: String,
}

fn default_agent_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_app_name() -> String {
    "email_agent".to_string()
}

fn default_user_id() -> String {
    "butler-dev".to_string()
}

fn default_invoke_path() -> String {
    "/run".to_string()
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            base_url: default_agent_base_url(),
            app_name: default_app_name(),
            user_id: default_user_id(),
            invoke_path: default_invoke_path(),
        }
    }
}

impl AgentSection {
    /// 完整的对话调用 URL（替换 `:agent` 占位符）
    pub fn invoke_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.invoke_path.replace(":agent", &self.app_name)
        )
    }
}

/// [google] 段：OAuth 授权与各 REST 服务地址
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleSection {
    /// OAuth 客户端 ID（控制台授权流程需要）
    pub client_id: Option<String>,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    /// 增量授权时的账号提示（通常为邮箱）
    pub login_hint: Option<String>,
    /// 直接提供的访问令牌；设置后跳过交互式授权
    pub access_token: Option<String>,
    /// 令牌缓存有效期（秒），默认 45 分钟
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_gmail_base_url")]
    pub gmail_base_url: String,
    #[serde(default = "default_calendar_base_url")]
    pub calendar_base_url: String,
    #[serde(default = "default_drive_base_url")]
    pub drive_base_url: String,
    #[serde(default = "default_tasks_base_url")]
    pub tasks_base_url: String,
}

fn default_redirect_uri() -> String {
    "http://localhost:8080/oauth/callback".to_string()
}

fn default_token_ttl_secs() -> u64 {
    45 * 60
}

fn default_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

fn default_gmail_base_url() -> String {
    "https://gmail.googleapis.com/gmail/v1/users/me".to_string()
}

fn default_calendar_base_url() -> String {
    "https://www.googleapis.com/calendar/v3".to_string()
}

fn default_drive_base_url() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}

fn default_tasks_base_url() -> String {
    "https://tasks.googleapis.com/tasks/v1".to_string()
}

impl Default for GoogleSection {
    fn default() -> Self {
        Self {
            client_id: None,
            redirect_uri: default_redirect_uri(),
            login_hint: None,
            access_token: None,
            token_ttl_secs: default_token_ttl_secs(),
            auth_url: default_auth_url(),
            gmail_base_url: default_gmail_base_url(),
            calendar_base_url: default_calendar_base_url(),
            drive_base_url: default_drive_base_url(),
            tasks_base_url: default_tasks_base_url(),
        }
    }
}

impl GoogleSection {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }
}

/// [http] 段：共享 reqwest Client 的参数；默认不设超时，由网络栈决定
#[derive(Debug, Clone, Deserialize)]
pub struct HttpSection {
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_user_agent() -> String {
    concat!("butler/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            user_agent: default_user_agent(),
        }
    }
}

impl HttpSection {
    /// 构建所有服务共享的 HTTP 客户端
    pub fn build_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        let mut builder = reqwest::Client::builder().user_agent(self.user_agent.clone());
        if let Some(secs) = self.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        builder.build()
    }
}

/// 从 config 目录加载配置，环境变量 BUTLER__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 BUTLER__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("BUTLER")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
