//! 自然语言时间解析（calendar.create 使用）
//!
//! 支持 "8th Sep 2025 at 23:30"、"September 8, 2025 11:30 pm"、"2025-09-08 23:30"、
//! "tomorrow at 9am"、RFC 3339 等写法。只给日期不给时间、无法识别、或因夏令时切换
//! 而不唯一/不存在的本地时刻一律报错，不做猜测。

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DateParseError {
    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("could not understand date/time '{0}'")]
    Unrecognized(String),

    #[error("'{0}' has a date but no time of day")]
    MissingTime(String),

    #[error("'{0}' is ambiguous in timezone {1}")]
    Ambiguous(String, String),

    #[error("'{0}' does not exist in timezone {1}")]
    NonExistent(String, String),
}

const DATETIME_FORMATS: &[&str] = &[
    "%d %b %Y %H:%M",
    "%d %b %Y %H:%M:%S",
    "%d %b %Y %I:%M %p",
    "%b %d %Y %H:%M",
    "%b %d %Y %I:%M %p",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y %I:%M %p",
];

const DATE_FORMATS: &[&str] = &["%d %b %Y", "%b %d %Y", "%Y-%m-%d", "%d/%m/%Y"];

const TIME_FORMATS: &[&str] = &["%H:%M", "%H:%M:%S", "%I:%M %p"];

const FILLER_WORDS: &[&str] = &["at", "of", "on"];

/// "8th" -> "8"
fn strip_ordinal(word: &str) -> Option<&str> {
    let lower = word.to_ascii_lowercase();
    let digits = ["st", "nd", "rd", "th"]
        .iter()
        .find_map(|suffix| lower.strip_suffix(suffix))?;
    let n = digits.len();
    ((1..=2).contains(&n) && digits.bytes().all(|b| b.is_ascii_digit())).then(|| &word[..n])
}

fn is_clock(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit() || b == b':')
}

/// 规范化：去掉序数词后缀、逗号与 at/of/on，"9pm" / "9 p.m." -> "9:00 pm"，合并空白。
/// chrono 解析 12 小时制时要求有分钟，所以裸小时补 ":00"。
fn normalize(input: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    for raw in input.replace(',', " ").split_whitespace() {
        let word = raw.trim_end_matches('.');
        let compact = word.replace('.', "").to_ascii_lowercase();
        if FILLER_WORDS.contains(&compact.as_str()) {
            continue;
        }
        if let Some(day) = strip_ordinal(word) {
            out.push(day.to_string());
            continue;
        }
        let meridiem = ["am", "pm"].into_iter().find(|m| compact.ends_with(m));
        match meridiem {
            Some(m) if compact == m => {
                if let Some(prev) = out.last_mut().filter(|p| is_clock(p) && !p.contains(':')) {
                    prev.push_str(":00");
                }
                out.push(m.to_string());
            }
            Some(m) if is_clock(&compact[..compact.len() - 2]) => {
                let clock = &compact[..compact.len() - 2];
                if clock.contains(':') {
                    out.push(clock.to_string());
                } else {
                    out.push(format!("{clock}:00"));
                }
                out.push(m.to_string());
            }
            _ => out.push(word.to_string()),
        }
    }
    out.join(" ")
}

/// 解析 IANA 时区名（如 "Asia/Kolkata"、"UTC"）
pub fn parse_timezone(name: &str) -> Result<Tz, DateParseError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| DateParseError::UnknownTimezone(name.to_string()))
}

/// "today 9 pm" / "tomorrow 10:30" / "day after tomorrow 8 am"
fn parse_relative(normalized: &str, today: NaiveDate) -> Option<Result<NaiveDateTime, ()>> {
    let lower = normalized.to_lowercase();
    let (days, rest) = if let Some(rest) = lower.strip_prefix("day after tomorrow") {
        (2, rest)
    } else if let Some(rest) = lower.strip_prefix("tomorrow") {
        (1, rest)
    } else if let Some(rest) = lower.strip_prefix("today") {
        (0, rest)
    } else if let Some(rest) = lower.strip_prefix("tonight") {
        (0, rest)
    } else {
        return None;
    };
    let date = today + Duration::days(days);
    let rest = rest.trim();
    Some(
        TIME_FORMATS
            .iter()
            .find_map(|f| NaiveTime::parse_from_str(rest, f).ok())
            .map(|t| date.and_time(t))
            .ok_or(()),
    )
}

/// 把自然语言时间解析为 tz 中的确定时刻；now 用于 today/tomorrow 等相对写法
pub fn parse_natural_datetime(
    input: &str,
    tz: Tz,
    now: DateTime<Tz>,
) -> Result<DateTime<Tz>, DateParseError> {
    let trimmed = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&tz));
    }

    let normalized = normalize(trimmed);
    let naive = match parse_relative(&normalized, now.date_naive()) {
        Some(Ok(naive)) => naive,
        Some(Err(())) => return Err(DateParseError::MissingTime(input.to_string())),
        None => match DATETIME_FORMATS
            .iter()
            .find_map(|f| NaiveDateTime::parse_from_str(&normalized, f).ok())
        {
            Some(naive) => naive,
            None if DATE_FORMATS
                .iter()
                .any(|f| NaiveDate::parse_from_str(&normalized, f).is_ok()) =>
            {
                return Err(DateParseError::MissingTime(input.to_string()))
            }
            None => return Err(DateParseError::Unrecognized(input.to_string())),
        },
    };

    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt),
        LocalResult::Ambiguous(_, _) => Err(DateParseError::Ambiguous(
            input.to_string(),
            tz.name().to_string(),
        )),
        LocalResult::None => Err(DateParseError::NonExistent(
            input.to_string(),
            tz.name().to_string(),
        )),
    }
}
