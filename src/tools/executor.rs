//! 工具执行器
//!
//! 按请求顺序逐个执行工具调用（不重排、不去重、不并行）。查找失败、参数错误、超时、
//! 工具报错都只影响这一次调用，记录在对应的 ToolResult 里；每次调用输出一条 JSON 审计日志。

use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::core::ToolError;
use crate::llm::{ToolCall, ToolSpec};
use crate::tools::ToolRegistry;

/// 一次工具调用的结果
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub call: ToolCall,
    pub output: String,
    pub error: Option<ToolError>,
}

impl ToolResult {
    pub fn ok(call: ToolCall, output: impl Into<String>) -> Self {
        Self {
            call,
            output: output.into(),
            error: None,
        }
    }

    pub fn failed(call: ToolCall, error: ToolError) -> Self {
        Self {
            call,
            output: String::new(),
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// 交给 Refiner 的行内文本；失败与成功在这里才统一成文本
    pub fn render(&self) -> String {
        match &self.error {
            None => format!("[{}]\n{}", self.call.name, self.output),
            Some(e) => format!("[{}]\nError: {}", self.call.name, e),
        }
    }
}

pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.registry.specs()
    }

    /// 执行单个调用；从不返回 Err，失败写入 ToolResult::error
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let start = Instant::now();
        let result = match self.registry.resolve(&call.name) {
            Ok(tool) => match timeout(self.timeout, tool.execute(call.arguments.clone())).await {
                Ok(r) => r,
                Err(_) => Err(ToolError::Timeout(call.name.clone())),
            },
            Err(e) => Err(e),
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(ToolError::NotFound(_)) => "not_found",
            Err(ToolError::Timeout(_)) => "timeout",
            Err(_) => "error",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": call.name,
            "ok": result.is_ok(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&call.arguments),
        });
        tracing::info!(audit = %audit, "tool");

        match result {
            Ok(output) => ToolResult::ok(call.clone(), output),
            Err(e) => {
                tracing::warn!(tool = %call.name, "tool call failed: {}", e);
                ToolResult::failed(call.clone(), e)
            }
        }
    }

    /// 逐个执行，结果顺序与 calls 一致
    pub async fn execute_all(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.execute(call).await);
        }
        results
    }
}

fn args_preview(args: &serde_json::Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Tool, ToolKind};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct Echo(ToolKind);

    #[async_trait]
    impl Tool for Echo {
        fn kind(&self) -> ToolKind {
            self.0
        }

        fn description(&self) -> &str {
            "echo"
        }

        async fn execute(&self, args: Value) -> Result<String, ToolError> {
            match args.get("text").and_then(Value::as_str) {
                Some("boom") => Err(ToolError::Failed("exploded".into())),
                Some(t) => Ok(t.to_string()),
                None => Ok("(empty)".to_string()),
            }
        }
    }

    struct Slow;

    #[async_trait]
    impl Tool for Slow {
        fn kind(&self) -> ToolKind {
            ToolKind::WebSearch
        }

        fn description(&self) -> &str {
            "sleeps"
        }

        async fn execute(&self, _args: Value) -> Result<String, ToolError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".into())
        }
    }

    fn executor() -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(Echo(ToolKind::MailUnread)).unwrap();
        registry.register(Echo(ToolKind::CalendarUpcoming)).unwrap();
        ToolExecutor::new(registry, 5)
    }

    #[tokio::test]
    async fn test_order_preserved_and_failures_isolated() {
        let exec = executor();
        let calls = vec![
            ToolCall::new("calendar_upcoming", json!({"text": "one"})),
            ToolCall::new("teleport", json!({})),
            ToolCall::new("mail.unread", json!({"text": "boom"})),
            ToolCall::new("mail_unread", json!({"text": "two"})),
            ToolCall::new("mail_unread", json!({"text": "two"})),
        ];
        let results = exec.execute_all(&calls).await;
        assert_eq!(results.len(), 5);
        for (r, c) in results.iter().zip(&calls) {
            assert_eq!(&r.call, c);
        }
        assert_eq!(results[0].output, "one");
        assert_eq!(results[1].error, Some(ToolError::NotFound("teleport".into())));
        assert_eq!(results[2].error, Some(ToolError::Failed("exploded".into())));
        assert!(results[3].is_ok() && results[4].is_ok());
        assert_eq!(results[1].render(), "[teleport]\nError: Tool not found: teleport");
    }

    #[tokio::test]
    async fn test_timeout() {
        let mut registry = ToolRegistry::new();
        registry.register(Slow).unwrap();
        let exec = ToolExecutor {
            registry,
            timeout: Duration::from_millis(20),
        };
        let r = exec.execute(&ToolCall::new("web_search", json!({}))).await;
        assert_eq!(r.error, Some(ToolError::Timeout("web_search".into())));
    }
}
