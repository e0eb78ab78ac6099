//! Butler - Google Workspace 智能助理（控制台前端）
//!
//! 入口：初始化日志、加载配置、组装桥接层与 Dashboard，然后逐行读取用户输入。
//! `/dashboard` 刷新概览，`/open N` 查看第 N 封重要邮件，`/reply N` 起草并确认发送回复，`/quit` 退出；
//! 其余输入作为提示词交给 Agent。

use std::sync::Arc;

use anyhow::Context;
use butler::{
    app::{build_components, AppComponents},
    auth::{shared_stdin, AuthProvider, ConsoleConsentProvider, SharedStdin, StaticTokenProvider},
    config::load_config,
    google::MessageSummary,
    observability,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).context("Failed to load config")?;
    let stdin = shared_stdin();

    let provider: Arc<dyn AuthProvider> = match cfg.google.access_token.as_deref() {
        Some(token) if !token.trim().is_empty() => {
            tracing::info!("using configured Google access token");
            Arc::new(StaticTokenProvider::new(token.trim()))
        }
        _ => Arc::new(ConsoleConsentProvider::new(&cfg.google, stdin.clone())),
    };
    let app = build_components(&cfg, provider).context("Failed to build HTTP client")?;

    println!("Butler ready. Agent: {} ({})", cfg.agent.app_name, cfg.agent.base_url);
    println!("Commands: /dashboard, /open N, /reply N, /quit");

    let mut important: Vec<MessageSummary> = Vec::new();
    loop {
        print_prompt();
        let Some(line) = read_line(&stdin).await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input.split_once(' ').unwrap_or((input, "")) {
            ("/quit", _) | ("/exit", _) => break,
            ("/dashboard", _) => show_dashboard(&app, &mut important).await,
            ("/open", n) => match pick(&important, n) {
                Some(email) => match app.dashboard.open_email(&email.id).await {
                    Ok(body) => println!("{body}"),
                    Err(e) => println!("Error: {e}"),
                },
                None => println!("Run /dashboard first, then choose 1..{}", important.len().max(1)),
            },
            ("/reply", n) => match pick(&important, n).cloned() {
                Some(email) => reply_flow(&app, &stdin, &email).await?,
                None => println!("Run /dashboard first, then choose 1..{}", important.len().max(1)),
            },
            _ => match app.bridge.submit(input).await {
                Ok(reply) => {
                    if let Some(action) = &reply.action {
                        tracing::debug!(action = %action.action, ok = action.ok, "action executed");
                    }
                    println!("{}", reply.text);
                }
                Err(e) => println!("Error: {e}"),
            },
        }
    }

    println!("Bye.");
    Ok(())
}

fn print_prompt() {
    use std::io::Write;
    print!("> ");
    let _ = std::io::stdout().flush();
}

async fn read_line(stdin: &SharedStdin) -> anyhow::Result<Option<String>> {
    stdin
        .lock()
        .await
        .next_line()
        .await
        .context("Failed to read stdin")
}

fn pick<'a>(important: &'a [MessageSummary], n: &str) -> Option<&'a MessageSummary> {
    let idx: usize = n.trim().parse().ok()?;
    important.get(idx.checked_sub(1)?)
}

async fn show_dashboard(app: &AppComponents, important: &mut Vec<MessageSummary>) {
    let snapshot = match app.dashboard.refresh().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            println!("Error: {e}");
            return;
        }
    };
    *important = match &snapshot.emails {
        Ok(emails) => app.dashboard.important_emails(emails).await,
        Err(_) => Vec::new(),
    };
    print!("{}", snapshot.render(important));
}

async fn reply_flow(app: &AppComponents, stdin: &SharedStdin, email: &MessageSummary) -> anyhow::Result<()> {
    let draft = match app.dashboard.draft_reply(email).await {
        Ok(draft) => draft,
        Err(e) => {
            println!("Error: {e}");
            return Ok(());
        }
    };
    println!("--- Draft ---\n{draft}\n-------------");
    print!("Send this reply? [y/N] ");
    let _ = std::io::Write::flush(&mut std::io::stdout());
    let answer = read_line(stdin).await?.unwrap_or_default();
    if !answer.trim().eq_ignore_ascii_case("y") {
        println!("Not sent.");
        return Ok(());
    }
    match app.dashboard.send_reply(email, &draft).await {
        Ok(sent) => println!("Reply sent (id {}).", sent.id),
        Err(e) => println!("Error: {e}"),
    }
    Ok(())
}
