//! Google Calendar（REST v3，primary 日历）
//!
//! 列表查询统一使用 singleEvents=true + orderBy=startTime，因此返回结果按开始时间升序。

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::services::{GoogleApi, ServiceError};

const EVENTS_URL: &str = "https://www.googleapis.com/calendar/v3/calendars/primary/events";
const NO_TITLE: &str = "(No Title)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub summary: String,
    /// dateTime（RFC 3339）或全天事件的 date
    pub start: String,
    pub end: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

/// 待创建的事件：起止时间已解析为带时区的确定时刻
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub summary: String,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl NewEvent {
    pub fn timezone(&self) -> Tz {
        self.start.timezone()
    }

    fn to_request_body(&self) -> serde_json::Value {
        let tz = self.timezone().name();
        json!({
            "summary": self.summary,
            "start": {
                "dateTime": self.start.to_rfc3339_opts(SecondsFormat::Secs, false),
                "timeZone": tz
            },
            "end": {
                "dateTime": self.end.to_rfc3339_opts(SecondsFormat::Secs, false),
                "timeZone": tz
            },
        })
    }
}

#[async_trait]
pub trait CalendarService: Send + Sync {
    /// 从 now 起的下 limit 个事件
    async fn upcoming(&self, limit: usize) -> Result<Vec<CalendarEvent>, ServiceError>;

    /// [from, to] 窗口内匹配 query 的事件
    async fn search(
        &self,
        query: &str,
        limit: usize,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, ServiceError>;

    async fn create(&self, event: &NewEvent) -> Result<CalendarEvent, ServiceError>;

    async fn delete(&self, event_id: &str) -> Result<(), ServiceError>;
}

#[derive(Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<RawEvent>,
}

#[derive(Deserialize)]
struct RawEvent {
    id: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    start: Option<EventTime>,
    #[serde(default)]
    end: Option<EventTime>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    #[serde(default)]
    date_time: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

impl EventTime {
    fn value(self) -> Option<String> {
        self.date_time.or(self.date)
    }
}

impl From<RawEvent> for CalendarEvent {
    fn from(e: RawEvent) -> Self {
        CalendarEvent {
            id: e.id,
            summary: e
                .summary
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| NO_TITLE.to_string()),
            start: e.start.and_then(EventTime::value).unwrap_or_default(),
            end: e.end.and_then(EventTime::value),
            location: e.location,
            description: e.description,
        }
    }
}

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub struct GoogleCalendarClient {
    api: GoogleApi,
}

impl GoogleCalendarClient {
    pub fn new(api: GoogleApi) -> Self {
        Self { api }
    }

    async fn list(&self, params: &[(&str, String)]) -> Result<Vec<CalendarEvent>, ServiceError> {
        let mut query: Vec<(&str, String)> = vec![
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ];
        query.extend(params.iter().cloned());
        let list: EventList = self.api.get_json(EVENTS_URL, &query).await?;
        Ok(list.items.into_iter().map(CalendarEvent::from).collect())
    }
}

#[async_trait]
impl CalendarService for GoogleCalendarClient {
    async fn upcoming(&self, limit: usize) -> Result<Vec<CalendarEvent>, ServiceError> {
        self.list(&[
            ("timeMin", rfc3339(Utc::now())),
            ("maxResults", limit.max(1).to_string()),
        ])
        .await
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, ServiceError> {
        self.list(&[
            ("q", query.to_string()),
            ("timeMin", rfc3339(from)),
            ("timeMax", rfc3339(to)),
            ("maxResults", limit.max(1).to_string()),
        ])
        .await
    }

    async fn create(&self, event: &NewEvent) -> Result<CalendarEvent, ServiceError> {
        let created: RawEvent = self.api.post_json(EVENTS_URL, &event.to_request_body()).await?;
        tracing::info!(id = %created.id, "calendar event created");
        Ok(created.into())
    }

    async fn delete(&self, event_id: &str) -> Result<(), ServiceError> {
        self.api.delete(&format!("{EVENTS_URL}/{event_id}")).await?;
        tracing::info!(id = %event_id, "calendar event deleted");
        Ok(())
    }
}
