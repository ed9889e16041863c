//! 工具层：封闭的 ToolKind 集合、启动时构建的分发表、顺序执行器与各工具实现

pub mod calendar;
pub mod drive;
pub mod executor;
pub mod mail;
pub mod registry;
pub mod schema;
pub mod web;

pub use calendar::{
    CalendarCreateTool, CalendarDeleteTool, CalendarSearchTool, CalendarTools,
    CalendarUpcomingTool,
};
pub use drive::DriveSearchTool;
pub use executor::{ToolExecutor, ToolResult};
pub use mail::{MailSearchTool, MailSendTool, MailUnreadTool};
pub use registry::{Tool, ToolKind, ToolRegistry};
pub use web::WebSearchTool;
