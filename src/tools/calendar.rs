//! calendar.search / calendar.upcoming / calendar.create / calendar.delete
//!
//! create 的起止时间是自然语言，按给定时区解析为确定时刻；end 缺省为 start + 1 小时。
//! delete 按摘要做不区分大小写的子串匹配，删除时间窗口内最早的一个匹配事件；
//! 有多个匹配时只删第一个，并在结果中注明。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::ToolError;
use crate::services::{
    parse_natural_datetime, parse_timezone, CalendarEvent, CalendarService, DateParseError,
    NewEvent,
};
use crate::tools::schema::{parse_args, schema_of};
use crate::tools::{Tool, ToolKind};

const SERVICE: &str = "Google Calendar";
const NO_EVENTS: &str = "No events found.";
/// delete 时向日历拉取的候选事件上限
const DELETE_CANDIDATES: usize = 50;

/// 日历工具共享的服务句柄、默认参数与时钟
#[derive(Clone)]
pub struct CalendarTools {
    service: Option<Arc<dyn CalendarService>>,
    default_limit: usize,
    days_ahead: i64,
    default_timezone: String,
    now: Option<DateTime<Utc>>,
}

impl CalendarTools {
    pub fn new(
        service: Option<Arc<dyn CalendarService>>,
        default_limit: usize,
        days_ahead: i64,
        default_timezone: impl Into<String>,
    ) -> Self {
        Self {
            service,
            default_limit,
            days_ahead,
            default_timezone: default_timezone.into(),
            now: None,
        }
    }

    /// 固定"当前时间"（相对日期与搜索窗口都以它为准）
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    fn service(&self) -> Result<&Arc<dyn CalendarService>, ToolError> {
        self.service
            .as_ref()
            .ok_or(ToolError::ServiceUnavailable(SERVICE))
    }

    fn window(&self, days_ahead: Option<i64>) -> (DateTime<Utc>, DateTime<Utc>) {
        let now = self.now();
        let days = days_ahead.unwrap_or(self.days_ahead).max(0);
        (now, now + Duration::days(days))
    }

    pub fn search(&self) -> CalendarSearchTool {
        CalendarSearchTool(self.clone())
    }

    pub fn upcoming(&self) -> CalendarUpcomingTool {
        CalendarUpcomingTool(self.clone())
    }

    pub fn create(&self) -> CalendarCreateTool {
        CalendarCreateTool(self.clone())
    }

    pub fn delete(&self) -> CalendarDeleteTool {
        CalendarDeleteTool(self.clone())
    }
}

fn format_event(e: &CalendarEvent) -> String {
    let mut line = format!("- {} | {} (id: {})", e.start, e.summary, e.id);
    if let Some(loc) = e.location.as_deref().filter(|l| !l.is_empty()) {
        line.push_str(&format!(" @ {loc}"));
    }
    line
}

fn format_events(events: &[CalendarEvent]) -> String {
    if events.is_empty() {
        return NO_EVENTS.to_string();
    }
    events.iter().map(format_event).collect::<Vec<_>>().join("\n")
}

fn date_error(kind: ToolKind, e: DateParseError) -> ToolError {
    ToolError::InvalidArguments {
        tool: kind.name().to_string(),
        reason: e.to_string(),
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SearchArgs {
    /// Text to match against events
    query: String,
    #[serde(default)]
    limit: Option<usize>,
    /// How many days ahead to search (default 30)
    #[serde(default)]
    days_ahead: Option<i64>,
}

pub struct CalendarSearchTool(CalendarTools);

#[async_trait]
impl Tool for CalendarSearchTool {
    fn kind(&self) -> ToolKind {
        ToolKind::CalendarSearch
    }

    fn description(&self) -> &str {
        "Search the user's upcoming calendar events (from now until days_ahead days later) matching a text query."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<SearchArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: SearchArgs = parse_args(self.kind(), args)?;
        let service = self.0.service()?;
        let (from, to) = self.0.window(args.days_ahead);
        let limit = args.limit.unwrap_or(self.0.default_limit);
        let events = service.search(&args.query, limit, from, to).await?;
        Ok(format_events(&events))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct UpcomingArgs {
    /// Number of events to return
    #[serde(default)]
    limit: Option<usize>,
}

pub struct CalendarUpcomingTool(CalendarTools);

#[async_trait]
impl Tool for CalendarUpcomingTool {
    fn kind(&self) -> ToolKind {
        ToolKind::CalendarUpcoming
    }

    fn description(&self) -> &str {
        "List the user's next calendar events ordered by start time."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<UpcomingArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: UpcomingArgs = parse_args(self.kind(), args)?;
        let service = self.0.service()?;
        let events = service
            .upcoming(args.limit.unwrap_or(self.0.default_limit))
            .await?;
        Ok(format_events(&events))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct CreateArgs {
    /// Event title
    summary: String,
    /// Start time in natural language, e.g. "8th Sep 2025 at 23:30" or "tomorrow 9am"
    start: String,
    /// End time in natural language; defaults to one hour after start
    #[serde(default)]
    end: Option<String>,
    /// IANA timezone name, e.g. "Asia/Kolkata"
    #[serde(default)]
    timezone: Option<String>,
}

pub struct CalendarCreateTool(CalendarTools);

#[async_trait]
impl Tool for CalendarCreateTool {
    fn kind(&self) -> ToolKind {
        ToolKind::CalendarCreate
    }

    fn description(&self) -> &str {
        "Create a calendar event. Start and end may be natural language; end defaults to one hour after start."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<CreateArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let kind = self.kind();
        let args: CreateArgs = parse_args(kind, args)?;
        let tz_name = args
            .timezone
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.0.default_timezone);
        let tz = parse_timezone(tz_name).map_err(|e| date_error(kind, e))?;
        let now = self.0.now().with_timezone(&tz);

        let start = parse_natural_datetime(&args.start, tz, now).map_err(|e| date_error(kind, e))?;
        let end = match args.end.as_deref().filter(|e| !e.trim().is_empty()) {
            Some(end) => parse_natural_datetime(end, tz, now).map_err(|e| date_error(kind, e))?,
            None => start + Duration::hours(1),
        };
        if end <= start {
            return Err(ToolError::InvalidArguments {
                tool: kind.name().to_string(),
                reason: "end must be after start".to_string(),
            });
        }

        let service = self.0.service()?;
        let event = NewEvent {
            summary: args.summary,
            start,
            end,
        };
        let created = service.create(&event).await?;
        Ok(format!(
            "Event '{}' created: {} to {} ({}) (id: {})",
            event.summary,
            start.to_rfc3339_opts(SecondsFormat::Secs, false),
            end.to_rfc3339_opts(SecondsFormat::Secs, false),
            tz.name(),
            created.id
        ))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct DeleteArgs {
    /// Summary (title) of the event to delete
    summary: String,
    /// How many days ahead to look for the event (default 30)
    #[serde(default)]
    days_ahead: Option<i64>,
}

pub struct CalendarDeleteTool(CalendarTools);

#[async_trait]
impl Tool for CalendarDeleteTool {
    fn kind(&self) -> ToolKind {
        ToolKind::CalendarDelete
    }

    fn description(&self) -> &str {
        "Delete the first upcoming calendar event whose title contains the given summary."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<DeleteArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: DeleteArgs = parse_args(self.kind(), args)?;
        let needle = args.summary.trim().to_lowercase();
        if needle.is_empty() {
            return Err(ToolError::InvalidArguments {
                tool: self.kind().name().to_string(),
                reason: "summary is empty".to_string(),
            });
        }
        let service = self.0.service()?;
        let (from, to) = self.0.window(args.days_ahead);
        let candidates = service
            .search(&args.summary, DELETE_CANDIDATES, from, to)
            .await?;
        let matches: Vec<&CalendarEvent> = candidates
            .iter()
            .filter(|e| e.summary.to_lowercase().contains(&needle))
            .collect();

        let Some(first) = matches.first() else {
            return Err(ToolError::Failed(format!(
                "No event matching '{}' found in the next {} days",
                args.summary,
                (to - from).num_days()
            )));
        };
        service.delete(&first.id).await?;

        let mut out = format!("Deleted event '{}' at {} (id: {})", first.summary, first.start, first.id);
        if matches.len() > 1 {
            tracing::warn!(
                summary = %args.summary,
                matches = matches.len(),
                "several events matched, deleted the earliest"
            );
            out.push_str(&format!(
                "\nNote: {} other event(s) also matched '{}' and were left untouched.",
                matches.len() - 1,
                args.summary
            ));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ServiceError;
    use chrono::TimeZone;
    use chrono_tz::Tz;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeCalendar {
        events: Vec<CalendarEvent>,
        created: Mutex<Vec<NewEvent>>,
        deleted: Mutex<Vec<String>>,
        searches: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
    }

    #[async_trait]
    impl CalendarService for FakeCalendar {
        async fn upcoming(&self, limit: usize) -> Result<Vec<CalendarEvent>, ServiceError> {
            Ok(self.events.iter().take(limit).cloned().collect())
        }

        async fn search(
            &self,
            _query: &str,
            limit: usize,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> Result<Vec<CalendarEvent>, ServiceError> {
            self.searches.lock().unwrap().push((from, to));
            Ok(self.events.iter().take(limit).cloned().collect())
        }

        async fn create(&self, event: &NewEvent) -> Result<CalendarEvent, ServiceError> {
            self.created.lock().unwrap().push(event.clone());
            Ok(event_named("new-1", &event.summary))
        }

        async fn delete(&self, event_id: &str) -> Result<(), ServiceError> {
            self.deleted.lock().unwrap().push(event_id.to_string());
            Ok(())
        }
    }

    fn event_named(id: &str, summary: &str) -> CalendarEvent {
        CalendarEvent {
            id: id.into(),
            summary: summary.into(),
            start: "2025-09-10T10:00:00Z".into(),
            end: None,
            location: None,
            description: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, 6, 0, 0).unwrap()
    }

    fn tools(fake: Arc<FakeCalendar>) -> CalendarTools {
        CalendarTools::new(Some(fake), 10, 30, "UTC").with_now(now())
    }

    #[tokio::test]
    async fn test_create_defaults_end_to_one_hour() {
        let fake = Arc::new(FakeCalendar::default());
        let tool = tools(fake.clone()).create();
        let out = tool
            .execute(json!({
                "summary": "Suit diagnostics",
                "start": "8th Sep 2025 at 23:30",
                "timezone": "Asia/Kolkata"
            }))
            .await
            .unwrap();

        let created = fake.created.lock().unwrap();
        let event = &created[0];
        let kolkata: Tz = "Asia/Kolkata".parse().unwrap();
        assert_eq!(event.start, kolkata.with_ymd_and_hms(2025, 9, 8, 23, 30, 0).unwrap());
        assert_eq!(event.end - event.start, Duration::hours(1));
        assert_eq!(event.end.timezone(), kolkata);
        assert_eq!(event.start.timezone(), kolkata);
        assert!(out.contains("2025-09-08T23:30:00+05:30 to 2025-09-09T00:30:00+05:30 (Asia/Kolkata)"));
    }

    #[tokio::test]
    async fn test_create_with_explicit_end_and_default_timezone() {
        let fake = Arc::new(FakeCalendar::default());
        let tool = tools(fake.clone()).create();
        tool.execute(json!({"summary": "Lab", "start": "tomorrow 9am", "end": "tomorrow 11:30"}))
            .await
            .unwrap();
        let event = fake.created.lock().unwrap()[0].clone();
        assert_eq!(event.start.to_rfc3339(), "2025-09-02T09:00:00+00:00");
        assert_eq!(event.end - event.start, Duration::minutes(150));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_dates() {
        let fake = Arc::new(FakeCalendar::default());
        let tool = tools(fake.clone()).create();
        for args in [
            json!({"summary": "x", "start": "sometime soon"}),
            json!({"summary": "x", "start": "8th Sep 2025"}),
            json!({"summary": "x", "start": "8th Sep 2025 at 23:30", "timezone": "Mars/Base"}),
            json!({"summary": "x", "start": "8th Sep 2025 at 23:30", "end": "8th Sep 2025 at 22:00"}),
        ] {
            let err = tool.execute(args).await.unwrap_err();
            assert!(matches!(err, ToolError::InvalidArguments { .. }), "{err}");
        }
        assert!(fake.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_uses_window() {
        let fake = Arc::new(FakeCalendar {
            events: vec![event_named("e1", "Board meeting")],
            ..Default::default()
        });
        let out = tools(fake.clone())
            .search()
            .execute(json!({"query": "board", "days_ahead": 7}))
            .await
            .unwrap();
        assert_eq!(out, "- 2025-09-10T10:00:00Z | Board meeting (id: e1)");
        let (from, to) = fake.searches.lock().unwrap()[0];
        assert_eq!(from, now());
        assert_eq!(to - from, Duration::days(7));
    }

    #[tokio::test]
    async fn test_delete_first_match_case_insensitive() {
        let fake = Arc::new(FakeCalendar {
            events: vec![
                event_named("e0", "Lunch"),
                event_named("e1", "Board Meeting"),
                event_named("e2", "board meeting follow-up"),
            ],
            ..Default::default()
        });
        let out = tools(fake.clone())
            .delete()
            .execute(json!({"summary": "board meeting"}))
            .await
            .unwrap();
        assert_eq!(fake.deleted.lock().unwrap().as_slice(), ["e1".to_string()]);
        assert!(out.starts_with("Deleted event 'Board Meeting'"));
        assert!(out.contains("1 other event(s) also matched"));
    }

    #[tokio::test]
    async fn test_delete_without_match() {
        let fake = Arc::new(FakeCalendar {
            events: vec![event_named("e0", "Lunch")],
            ..Default::default()
        });
        let err = tools(fake.clone())
            .delete()
            .execute(json!({"summary": "gala"}))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ToolError::Failed("No event matching 'gala' found in the next 30 days".into())
        );
        assert!(fake.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable() {
        let tools = CalendarTools::new(None, 10, 30, "UTC");
        assert_eq!(
            tools.upcoming().execute(json!({})).await,
            Err(ToolError::ServiceUnavailable("Google Calendar"))
        );
    }
}
