//! Hive - 多智能体编排系统
//!
//! 入口：初始化日志、加载配置、装配 LLM 与 Copilot 连接器，运行控制台轮循环
//! （每读入一行即一轮：分类 → 执行 → 合成 → 打印回复）。

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use hive::config::{load_config, AppConfig};
use hive::core::Orchestrator;
use hive::llm::create_llm_from_config;
use hive::m365::{CopilotConnector, GraphCopilotClient, MockCopilotConnector};
use hive::state::ConversationStateManager;

const WELCOME: &str = "Welcome! I'm a multi-agent orchestrator that can help with \
Microsoft 365 data (emails, calendar, files, people) and general knowledge. Ask me anything!";

const HELP: &str = "\
Available Commands:
- Ask questions about your M365 data (emails, calendar, files, people)
- Ask general knowledge questions
- /help - Show this help message
- /quit - Exit

Example Queries:
- \"What meetings do I have tomorrow?\"
- \"Summarize my recent emails\"
- \"What is Docker?\"
- \"What meetings do I have and what is Kubernetes?\" (multi-intent)";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hive::observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let state = Arc::new(ConversationStateManager::new());
    let llm = create_llm_from_config(&cfg);
    let copilot: Arc<dyn CopilotConnector> = match std::env::var("GRAPH_ACCESS_TOKEN")
        .ok()
        .filter(|t| !t.is_empty())
    {
        Some(token) => {
            tracing::info!(base_url = %cfg.graph.base_url, "Using Graph Copilot connector");
            Arc::new(GraphCopilotClient::new(
                cfg.graph.base_url.clone(),
                token,
                cfg.graph.time_zone.clone(),
                state.clone(),
            ))
        }
        None => {
            tracing::warn!("GRAPH_ACCESS_TOKEN not set, using Mock Copilot connector");
            Arc::new(MockCopilotConnector)
        }
    };

    let orchestrator = Orchestrator::new(llm, copilot, cfg.orchestration.clone());

    // 会话状态定期清理
    {
        let state = state.clone();
        let max_idle = cfg.state.session_timeout_secs;
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(max_idle.max(60)));
        tokio::spawn(async move {
            loop {
                ticker.tick().await;
                let removed = state.cleanup_expired(max_idle).await;
                if removed > 0 {
                    tracing::debug!(removed, "Cleaned up expired conversation state");
                }
            }
        });
    }

    println!("{}", WELCOME);
    println!("Type /help for examples, /quit to exit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("stdin read failed")? {
        let input = line.trim();
        match input {
            "/quit" | "/exit" => break,
            "/help" => println!("{}", HELP),
            _ => {
                let reply = orchestrator.handle_turn("console", input).await;
                println!("{}", reply);
            }
        }
    }

    Ok(())
}
