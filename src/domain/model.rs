use crate::utils::error::{IngestError, Result};
use crate::utils::validation::{validate_non_empty_string, Validate};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type Id = i64;

/// 事件分類，宣告順序即關鍵字表的掃描順序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    SchoolEvent,
    AssignmentDue,
    Exam,
    ParentMeeting,
    Extracurricular,
    Appointment,
    Birthday,
    Holiday,
    Reminder,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::SchoolEvent,
        Category::AssignmentDue,
        Category::Exam,
        Category::ParentMeeting,
        Category::Extracurricular,
        Category::Appointment,
        Category::Birthday,
        Category::Holiday,
        Category::Reminder,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::SchoolEvent => "SCHOOL_EVENT",
            Category::AssignmentDue => "ASSIGNMENT_DUE",
            Category::Exam => "EXAM",
            Category::ParentMeeting => "PARENT_MEETING",
            Category::Extracurricular => "EXTRACURRICULAR",
            Category::Appointment => "APPOINTMENT",
            Category::Birthday => "BIRTHDAY",
            Category::Holiday => "HOLIDAY",
            Category::Reminder => "REMINDER",
            Category::Other => "OTHER",
        }
    }

    /// 寬鬆解析：忽略大小寫，空白與連字號視為底線
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = normalize_enum_label(value);
        Self::ALL
            .iter()
            .copied()
            .find(|category| category.as_str() == normalized)
    }

    /// 日曆顯示顏色
    pub fn color(&self) -> &'static str {
        match self {
            Category::SchoolEvent => "#4285F4",
            Category::AssignmentDue => "#EA4335",
            Category::Exam => "#FBBC05",
            Category::ParentMeeting => "#34A853",
            Category::Extracurricular => "#FF6D01",
            Category::Appointment => "#46BDC6",
            Category::Birthday => "#E91E63",
            Category::Holiday => "#9C27B0",
            Category::Reminder => "#795548",
            Category::Other => "#9E9E9E",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Urgent,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Urgent,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Urgent => "URGENT",
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = normalize_enum_label(value);
        Self::ALL
            .iter()
            .copied()
            .find(|priority| priority.as_str() == normalized)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize_enum_label(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}

/// `HH:MM` 格式的時間序列化
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%H:%M";

    pub fn serialize<S>(value: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(time) => serializer.serialize_str(&time.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            Some(s) => NaiveTime::parse_from_str(&s, FORMAT)
                .or_else(|_| NaiveTime::parse_from_str(&s, "%H:%M:%S"))
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCandidate {
    pub title: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(with = "hhmm", default)]
    pub start_time: Option<NaiveTime>,
    #[serde(with = "hhmm", default)]
    pub end_time: Option<NaiveTime>,
    pub is_all_day: bool,
    pub category: Category,
    pub priority: Priority,
    pub has_reminder: bool,
    pub reminder_minutes: Option<u32>,
    pub child_name_hint: Option<String>,
    #[serde(default)]
    pub color: String,
}

impl EventCandidate {
    pub fn start_time_label(&self) -> Option<String> {
        self.start_time
            .map(|time| time.format(hhmm::FORMAT).to_string())
    }

    pub fn end_time_label(&self) -> Option<String> {
        self.end_time.map(|time| time.format(hhmm::FORMAT).to_string())
    }

    /// 事件涵蓋的最後一天
    pub fn last_day(&self) -> NaiveDate {
        self.end_date.unwrap_or(self.start_date).max(self.start_date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Child {
    pub id: Id,
    pub name: String,
    pub parent_id: Id,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedEvent {
    pub id: Id,
    pub parent_id: Id,
    pub child_id: Option<Id>,
    #[serde(flatten)]
    pub event: EventCandidate,
}

/// 建立事件時傳給 record store 的內容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub parent_id: Id,
    pub child_id: Option<Id>,
    pub event: EventCandidate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub parent_id: Id,
    pub title: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub child_id: Option<Id>,
    pub overlapping_days: Option<(NaiveDate, NaiveDate)>,
}

impl EventFilter {
    pub fn owned_by(parent_id: Id) -> Self {
        Self {
            parent_id,
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn on(mut self, start_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self
    }

    pub fn for_child(mut self, child_id: Id) -> Self {
        self.child_id = Some(child_id);
        self
    }

    /// 只保留日期範圍與 [from, to] 有交集的事件
    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.overlapping_days = Some((from, to));
        self
    }

    pub fn matches(&self, record: &PersistedEvent) -> bool {
        if record.parent_id != self.parent_id {
            return false;
        }
        if let Some(title) = &self.title {
            if &record.event.title != title {
                return false;
            }
        }
        if let Some(start_date) = self.start_date {
            if record.event.start_date != start_date {
                return false;
            }
        }
        if let Some(child_id) = self.child_id {
            if record.child_id != Some(child_id) {
                return false;
            }
        }
        if let Some((from, to)) = self.overlapping_days {
            if record.event.start_date > to || record.event.last_day() < from {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Text,
    Photo,
}

/// 待分析的原始內容，只存在於單次請求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawContent {
    pub kind: ContentKind,
    pub text: String,
    pub mime_hint: Option<String>,
    pub image: Option<ImagePayload>,
}

impl RawContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: ContentKind::Text,
            text: text.into(),
            mime_hint: None,
            image: None,
        }
    }

    pub fn html(text: impl Into<String>) -> Self {
        Self {
            mime_hint: Some("text/html".to_string()),
            ..Self::text(text)
        }
    }

    /// 照片分析；圖片缺失時會在驗證階段被拒絕
    pub fn photo(image: Option<ImagePayload>, caption: impl Into<String>) -> Self {
        Self {
            kind: ContentKind::Photo,
            text: caption.into(),
            mime_hint: image.as_ref().map(|i| i.mime_type.clone()),
            image,
        }
    }

    /// `--html` 或 `text/html` 提示才會走 HTML 清理
    pub fn is_html(&self) -> bool {
        self.mime_hint
            .as_deref()
            .map(|hint| hint.trim().to_ascii_lowercase().starts_with("text/html"))
            .unwrap_or(false)
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

impl Validate for RawContent {
    fn validate(&self) -> Result<()> {
        match self.kind {
            ContentKind::Photo => match &self.image {
                Some(image) if !image.bytes.is_empty() => {
                    validate_non_empty_string("image.mime_type", &image.mime_type)
                }
                _ => Err(IngestError::MissingInputError {
                    field: "image".to_string(),
                }),
            },
            ContentKind::Text => {
                if self.has_text() {
                    Ok(())
                } else {
                    Err(IngestError::MissingInputError {
                        field: "text".to_string(),
                    })
                }
            }
        }
    }
}

/// 已驗證身分的呼叫者
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: Id,
    pub children: Vec<Child>,
}

impl RequestContext {
    pub fn new(user_id: Id, children: Vec<Child>) -> Self {
        Self { user_id, children }
    }

    pub fn child_names(&self) -> Vec<String> {
        self.children.iter().map(|c| c.name.clone()).collect()
    }
}

/// 驗證後的分類結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationReport {
    pub has_events: bool,
    pub events: Vec<EventCandidate>,
    pub analysis: String,
    pub rejections: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEvent {
    pub candidate: EventCandidate,
    pub child_id: Option<Id>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformResult {
    pub has_events: bool,
    pub analysis: String,
    pub planned: Vec<PlannedEvent>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventConflict {
    pub event_id: Id,
    pub conflicting_event_ids: Vec<Id>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    pub has_events: bool,
    pub events_created: usize,
    pub events: Vec<PersistedEvent>,
    pub skipped: usize,
    pub analysis: String,
    pub errors: Vec<String>,
    pub conflicts: Vec<EventConflict>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarCell {
    pub date: NaiveDate,
    pub is_current_month: bool,
    pub is_previous_month: bool,
    pub is_next_month: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_candidate() -> EventCandidate {
        EventCandidate {
            title: "Math Homework Due".to_string(),
            description: "Worksheet 4".to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, 3, 16).unwrap(),
            end_date: None,
            start_time: NaiveTime::from_hms_opt(17, 0, 0),
            end_time: None,
            is_all_day: false,
            category: Category::AssignmentDue,
            priority: Priority::Medium,
            has_reminder: false,
            reminder_minutes: None,
            child_name_hint: None,
            color: Category::AssignmentDue.color().to_string(),
        }
    }

    #[test]
    fn test_category_parse_is_lenient() {
        assert_eq!(Category::parse("assignment due"), Some(Category::AssignmentDue));
        assert_eq!(Category::parse("parent-meeting"), Some(Category::ParentMeeting));
        assert_eq!(Category::parse(" EXAM "), Some(Category::Exam));
        assert_eq!(Category::parse("sports"), None);
        assert_eq!(Priority::parse("urgent"), Some(Priority::Urgent));
    }

    #[test]
    fn test_candidate_serializes_with_camel_case_and_hhmm() {
        let json = serde_json::to_value(sample_candidate()).unwrap();
        assert_eq!(json["startDate"], "2025-03-16");
        assert_eq!(json["startTime"], "17:00");
        assert_eq!(json["endTime"], serde_json::Value::Null);
        assert_eq!(json["category"], "ASSIGNMENT_DUE");
        assert_eq!(json["priority"], "MEDIUM");
    }

    #[test]
    fn test_persisted_event_flattens_candidate() {
        let record = PersistedEvent {
            id: 7,
            parent_id: 1,
            child_id: Some(2),
            event: sample_candidate(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["childId"], 2);
        assert_eq!(json["title"], "Math Homework Due");

        let back: PersistedEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_event_filter_matches_dedup_fields() {
        let record = PersistedEvent {
            id: 1,
            parent_id: 10,
            child_id: Some(3),
            event: sample_candidate(),
        };
        let date = NaiveDate::from_ymd_opt(2025, 3, 16).unwrap();

        let filter = EventFilter::owned_by(10)
            .with_title("Math Homework Due")
            .on(date);
        assert!(filter.matches(&record));
        assert!(filter.clone().for_child(3).matches(&record));
        assert!(!filter.clone().for_child(4).matches(&record));
        assert!(!EventFilter::owned_by(11).matches(&record));
    }

    #[test]
    fn test_photo_without_image_fails_validation() {
        let content = RawContent::photo(None, "");
        assert!(matches!(
            content.validate(),
            Err(IngestError::MissingInputError { .. })
        ));

        let content = RawContent::photo(
            Some(ImagePayload {
                bytes: vec![0xFF, 0xD8],
                mime_type: "image/jpeg".to_string(),
            }),
            "",
        );
        assert!(content.validate().is_ok());
        assert!(RawContent::text("   ").validate().is_err());
    }

    #[test]
    fn test_only_html_hint_marks_markup() {
        assert!(RawContent::html("<p>hi</p>").is_html());
        assert!(!RawContent::text("<p>hi</p>").is_html());
        assert!(!RawContent::photo(None, "caption").is_html());
    }
}
