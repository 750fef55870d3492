//! Candidate validator: turns loose classifier JSON into checked `EventCandidate`s.

use crate::core::extractor::{normalize_time, FALLBACK_TITLE};
use crate::domain::model::{Category, ClassificationReport, EventCandidate, Priority};
use crate::utils::error::{IngestError, Result};
use chrono::{NaiveDate, NaiveTime};
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_DESCRIPTION: &str = "No description provided";
pub const MAX_TITLE_CHARS: usize = 200;

#[derive(Debug, Clone, Default)]
pub struct CandidateValidator {
    default_reminder_minutes: Option<u32>,
}

impl CandidateValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// hasReminder 為 true 但沒給分鐘數時使用的預設值
    pub fn with_default_reminder(mut self, minutes: Option<u32>) -> Self {
        self.default_reminder_minutes = minutes.filter(|m| *m > 0);
        self
    }

    /// 單一事件驗證失敗只會記在 rejections，不影響其他事件
    pub fn validate_report(&self, raw: &Value) -> ClassificationReport {
        let declared = raw
            .get("hasEvents")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let analysis = raw
            .get("analysis")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let mut events = Vec::new();
        let mut rejections = Vec::new();

        let items = raw
            .get("events")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        for (index, item) in items.iter().enumerate() {
            match self.validate_event(item) {
                Ok(candidate) => events.push(candidate),
                Err(e) => {
                    debug!("🚫 Rejected event #{}: {}", index + 1, e);
                    rejections.push(format!("Event {}: {}", index + 1, e));
                }
            }
        }

        ClassificationReport {
            has_events: declared && !events.is_empty(),
            events,
            analysis,
            rejections,
        }
    }

    pub fn validate_event(&self, raw: &Value) -> Result<EventCandidate> {
        if !raw.is_object() {
            return Err(IngestError::ValidationError {
                message: "event entry is not an object".to_string(),
            });
        }

        let start_date = raw
            .get("startDate")
            .and_then(parse_date)
            .ok_or_else(|| IngestError::ValidationError {
                message: format!(
                    "missing or invalid startDate: {}",
                    raw.get("startDate").unwrap_or(&Value::Null)
                ),
            })?;
        // 沒有結束日期視為當天結束
        let end_date = raw
            .get("endDate")
            .and_then(parse_date)
            .map(|end| end.max(start_date))
            .unwrap_or(start_date);

        let mut start_time = raw.get("startTime").and_then(parse_time);
        let mut end_time = raw.get("endTime").and_then(parse_time);
        let is_all_day = raw
            .get("isAllDay")
            .and_then(Value::as_bool)
            .unwrap_or(start_time.is_none());
        if is_all_day {
            start_time = None;
            end_time = None;
        }

        let category = raw
            .get("category")
            .and_then(Value::as_str)
            .and_then(Category::parse)
            .unwrap_or(Category::Other);
        let priority = raw
            .get("priority")
            .and_then(Value::as_str)
            .and_then(Priority::parse)
            .unwrap_or(Priority::Medium);

        let has_reminder = raw
            .get("hasReminder")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let reminder_minutes = if has_reminder {
            raw.get("reminderMinutes")
                .and_then(parse_minutes)
                .or(self.default_reminder_minutes)
        } else {
            None
        };

        let child_name_hint = ["childNameHint", "childName"]
            .iter()
            .filter_map(|key| raw.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .find(|hint| !hint.is_empty())
            .map(str::to_string);

        Ok(EventCandidate {
            title: clean_title(raw.get("title").and_then(Value::as_str)),
            description: raw
                .get("description")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .unwrap_or(DEFAULT_DESCRIPTION)
                .to_string(),
            start_date,
            end_date: Some(end_date),
            start_time,
            end_time,
            is_all_day,
            category,
            priority,
            has_reminder,
            reminder_minutes,
            child_name_hint,
            color: category.color().to_string(),
        })
    }
}

fn clean_title(raw: Option<&str>) -> String {
    let trimmed = raw.map(str::trim).unwrap_or("");
    if trimmed.is_empty() {
        return FALLBACK_TITLE.to_string();
    }
    trimmed.chars().take(MAX_TITLE_CHARS).collect()
}

/// `YYYY-MM-DD`，或 ISO 日期時間的日期部分
fn parse_date(value: &Value) -> Option<NaiveDate> {
    let text = value.as_str()?.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }

    let prefix = text.get(..10)?;
    let rest = text.get(10..)?;
    if rest.starts_with('T') || rest.starts_with(' ') {
        NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
    } else {
        None
    }
}

fn parse_time(value: &Value) -> Option<NaiveTime> {
    value.as_str().and_then(normalize_time)
}

fn parse_minutes(value: &Value) -> Option<u32> {
    let minutes = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    u32::try_from(minutes).ok().filter(|m| *m > 0)
}
