//! 对话层：上下文、Prompt 组装、结果精炼与单轮控制器

pub mod context;
pub mod controller;
pub mod prompt;
pub mod refiner;

pub use context::AgentContext;
pub use controller::{DialogueController, TurnOutcome};
pub use prompt::{build_prompt, DEFAULT_SYSTEM_PROMPT};
pub use refiner::ResponseRefiner;
