//! Triage - 命令行入口
//!
//! 读取配置、组装引擎，然后在 stdin 上运行一个简单的对话循环：
//! - 普通输入：一轮文本
//! - `/image <path> [text]`：上传图像（可附带文本）
//! - `/yes`、`/no [comments]`：回复人工复核
//! - `/new`：开新会话；`/quit`：退出

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use triage::config::load_config;
use triage::core::ArtifactReaper;
use triage::observability;
use triage::{
    EngineBuilder, TurnRequest, TurnResponse, TurnStatus, ValidationDecision, ValidationRequest,
};

fn print_response(response: &TurnResponse) {
    println!();
    println!("{}", response.response_text);
    if let Some(image) = &response.result_image_ref {
        println!("[result image: {image}]");
    }
    println!(
        "  ({:?} via {})",
        response.status,
        response.agent_trace.join(" -> ")
    );
    if response.status == TurnStatus::AwaitingValidation {
        println!("  reply with /yes or /no [comments]");
    }
    println!();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init("info");

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path).context("Failed to load config")?;

    let shutdown = CancellationToken::new();
    let reaper = config
        .cleanup
        .enabled
        .then(|| ArtifactReaper::from_config(&config.cleanup).spawn(shutdown.clone()));

    let builder = EngineBuilder::new(config);
    let llm = builder.build_llm();
    let service = builder
        .with_llm(llm.clone())
        .build()
        .context("Failed to build engine")?;

    let mut thread_id = uuid::Uuid::new_v4().to_string();
    println!("Medical triage assistant. Thread {thread_id}. Type /quit to exit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        let result = match command {
            "/quit" => break,
            "/new" => {
                thread_id = uuid::Uuid::new_v4().to_string();
                println!("New thread {thread_id}");
                continue;
            }
            "/image" if !rest.is_empty() => {
                let (image, text) = rest.split_once(' ').unwrap_or((rest, ""));
                service
                    .submit_turn(TurnRequest {
                        text: Some(text.trim().to_string()).filter(|t| !t.is_empty()),
                        image_ref: Some(image.to_string()),
                        thread_id: Some(thread_id.clone()),
                    })
                    .await
            }
            "/yes" | "/no" => {
                let decision = if command == "/yes" {
                    ValidationDecision::Yes
                } else {
                    ValidationDecision::No
                };
                service
                    .submit_validation(ValidationRequest {
                        decision,
                        comments: Some(rest.to_string()).filter(|c| !c.is_empty()),
                        thread_id: thread_id.clone(),
                    })
                    .await
            }
            _ => {
                service
                    .submit_turn(TurnRequest::text(line).in_thread(thread_id.clone()))
                    .await
            }
        };

        match result {
            Ok(response) => print_response(&response),
            Err(e) if e.is_fatal() => return Err(e).context("Turn failed"),
            Err(e) => eprintln!("error: {e}"),
        }
    }

    shutdown.cancel();
    if let Some(handle) = reaper {
        let _ = handle.await;
    }
    observability::report_token_usage(llm.as_ref());
    Ok(())
}
