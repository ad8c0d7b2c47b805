//! 可观测性：tracing 初始化与用量汇总

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::llm::LlmClient;

/// 初始化日志；RUST_LOG 优先，否则使用 default_level。重复调用无副作用
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init();
}

/// 输出 LLM token 累计用量
pub fn report_token_usage(llm: &dyn LlmClient) {
    let (prompt, completion, total) = llm.token_usage();
    if total > 0 {
        tracing::info!(
            "Token usage: prompt={} completion={} total={}",
            prompt,
            completion,
            total
        );
    }
}
