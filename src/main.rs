//! J.A.R.V.I.S. 命令行入口
//!
//! 初始化日志、加载配置、装配 DialogueController，然后逐行读取标准输入直到 exit / quit / EOF。
//! 可选参数：配置文件路径。

use std::path::PathBuf;

use anyhow::Context;
use jarvis::config::load_config;
use jarvis::{build_controller, observability};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const BANNER: &str = "J.A.R.V.I.S. is at your service sir! Type 'exit' or 'quit' to end the session.";

fn is_exit(line: &str) -> bool {
    matches!(line.trim().to_lowercase().as_str(), "exit" | "quit")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;
    let mut controller = build_controller(&cfg).context("Failed to build assistant")?;

    println!("{BANNER}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"Enter your query: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        if is_exit(&line) {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let response = controller.answer(line.trim()).await;
        println!("\nResponse: {response}\n\n");
    }

    let (prompt, completion, total) = controller.context().llm.token_usage();
    tracing::info!(prompt, completion, total, "session ended");
    Ok(())
}
