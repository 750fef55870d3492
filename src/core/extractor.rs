//! Rule-based entity extractor.
//!
//! Pulls dates, times, category, priority, a title and a few reminder/child
//! hints out of normalized text using regex patterns and ordered keyword
//! tables. Deterministic, so it also serves as the offline classifier.

use crate::domain::model::{Category, EventCandidate, Priority};
use chrono::{Datelike, Days, NaiveDate, NaiveTime, Weekday};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

pub const FALLBACK_TITLE: &str = "Family Event";

const MAX_TITLE_LINE_CHARS: usize = 100;
const MAX_DESCRIPTION_CHARS: usize = 500;

const MONTHS_LONG: &str =
    "january|february|march|april|may|june|july|august|september|october|november|december";
const MONTHS_SHORT: &str = "jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec";

#[derive(Debug, Clone, Copy)]
enum DateLayout {
    NumericMonthDayYear,
    NumericYearMonthDay,
    NamedMonthDayYear,
    DayNamedMonthYear,
    NamedMonthDay,
    DayNamedMonth,
}

struct DatePattern {
    regex: Regex,
    layout: DateLayout,
}

// 掃描順序固定：數字格式優先，接著完整月份名、縮寫，最後是沒有年份的月日
static DATE_PATTERNS: Lazy<Vec<DatePattern>> = Lazy::new(|| {
    let build = |pattern: String, layout| DatePattern {
        regex: Regex::new(&pattern).expect("valid date regex"),
        layout,
    };
    vec![
        build(
            r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b".to_string(),
            DateLayout::NumericMonthDayYear,
        ),
        build(
            r"\b(\d{4})[/-](\d{1,2})[/-](\d{1,2})\b".to_string(),
            DateLayout::NumericYearMonthDay,
        ),
        build(
            format!(r"(?i)\b({MONTHS_LONG})\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})\b"),
            DateLayout::NamedMonthDayYear,
        ),
        build(
            format!(r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?({MONTHS_LONG}),?\s+(\d{{4}})\b"),
            DateLayout::DayNamedMonthYear,
        ),
        build(
            format!(r"(?i)\b({MONTHS_SHORT})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})\b"),
            DateLayout::NamedMonthDayYear,
        ),
        build(
            format!(r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+({MONTHS_SHORT})\.?,?\s+(\d{{4}})\b"),
            DateLayout::DayNamedMonthYear,
        ),
        build(
            format!(r"(?i)\b({MONTHS_LONG}|{MONTHS_SHORT})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?\b"),
            DateLayout::NamedMonthDay,
        ),
        build(
            format!(r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?({MONTHS_LONG}|{MONTHS_SHORT})\b"),
            DateLayout::DayNamedMonth,
        ),
    ]
});

static RELATIVE_DAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(today|tonight|tomorrow)\b").expect("valid regex"));

static RELATIVE_WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:(next|this|on)\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
    )
    .expect("valid regex")
});

#[derive(Debug, Clone, Copy)]
enum TimeLayout {
    WithSecondsMeridiem,
    Meridiem,
    AtPhrase,
    TwentyFourHour,
}

struct TimePattern {
    regex: Regex,
    layout: TimeLayout,
}

static TIME_PATTERNS: Lazy<Vec<TimePattern>> = Lazy::new(|| {
    let build = |pattern: &str, layout| TimePattern {
        regex: Regex::new(pattern).expect("valid time regex"),
        layout,
    };
    vec![
        build(
            r"(?i)\b(\d{1,2}):(\d{2}):(\d{2})\s*([ap])\.?\s?m\b\.?",
            TimeLayout::WithSecondsMeridiem,
        ),
        build(
            r"(?i)\b(\d{1,2}):(\d{2})\s*([ap])\.?\s?m\b\.?",
            TimeLayout::Meridiem,
        ),
        build(
            r"(?i)\bat\s+(\d{1,2})(?::(\d{2}))?\s*([ap])\.?\s?m\b\.?",
            TimeLayout::AtPhrase,
        ),
        build(r"\b([01]?\d|2[0-3]):([0-5]\d)\b", TimeLayout::TwentyFourHour),
    ]
});

static SUBJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(math|mathematics|algebra|geometry|science|biology|chemistry|physics|english|reading|writing|spelling|history|social studies|geography|spanish|french|chinese|art|music)\b",
    )
    .expect("valid regex")
});

static TEST_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\btests?\b").expect("valid regex"));

static EXAM_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bexams?\b").expect("valid regex"));

static FINAL_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bfinals?\b").expect("valid regex"));

static MIDTERM_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bmidterms?\b").expect("valid regex"));

static LABEL_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(?:subject|re|title)\s*:\s*(.+)$").expect("valid regex")
});

static REMINDER_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bremind(?:er|ers)?\b").expect("valid regex"));

static REMINDER_LEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,4})\s*(minutes?|mins?|hours?|hrs?|days?)\s+(?:before|prior|ahead|early)\b")
        .expect("valid regex")
});

/// 分類關鍵字表；依宣告順序掃描，第一個命中者勝出
pub const CATEGORY_KEYWORDS: [(Category, &[&str]); 10] = [
    (
        Category::SchoolEvent,
        &[
            "school event",
            "assembly",
            "field trip",
            "open house",
            "school play",
            "concert",
            "science fair",
            "picture day",
            "spirit week",
            "graduation",
            "back to school",
        ],
    ),
    (
        Category::AssignmentDue,
        &[
            "homework",
            "assignment",
            "project due",
            "due date",
            "essay",
            "worksheet",
            "book report",
        ],
    ),
    (
        Category::Exam,
        &["exam", "test", "quiz", "midterm", "finals"],
    ),
    (
        Category::ParentMeeting,
        &[
            "parent-teacher",
            "parent teacher",
            "parent meeting",
            "conference",
            "pta",
            "iep meeting",
        ],
    ),
    (
        Category::Extracurricular,
        &[
            "practice",
            "soccer",
            "basketball",
            "football",
            "baseball",
            "softball",
            "swim",
            "dance",
            "piano",
            "guitar",
            "recital",
            "rehearsal",
            "tournament",
            "scouts",
            "karate",
            "club",
            "lesson",
        ],
    ),
    (
        Category::Appointment,
        &[
            "appointment",
            "doctor",
            "dentist",
            "orthodontist",
            "pediatrician",
            "checkup",
            "check-up",
            "therapy",
            "vaccination",
        ],
    ),
    (Category::Birthday, &["birthday", "bday", "b-day"]),
    (
        Category::Holiday,
        &[
            "holiday",
            "no school",
            "school closed",
            "vacation",
            "spring break",
            "winter break",
            "thanksgiving",
            "christmas",
            "day off",
        ],
    ),
    (
        Category::Reminder,
        &[
            "reminder",
            "remember",
            "don't forget",
            "do not forget",
            "bring",
            "permission slip",
        ],
    ),
    (Category::Other, &[]),
];

pub const PRIORITY_KEYWORDS: [(Priority, &[&str]); 4] = [
    (
        Priority::Urgent,
        &["urgent", "asap", "immediately", "emergency", "critical", "right away"],
    ),
    (
        Priority::High,
        &["important", "required", "mandatory", "must", "deadline", "high priority"],
    ),
    (Priority::Medium, &["medium priority", "normal priority"]),
    (
        Priority::Low,
        &["optional", "fyi", "if you can", "when possible", "low priority", "no rush"],
    ),
];

/// 抽取結果，尚未經過 validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEntities {
    pub dates: Vec<NaiveDate>,
    pub times: Vec<NaiveTime>,
    pub category: Category,
    pub priority: Priority,
    pub title: String,
    pub has_reminder: bool,
    pub reminder_minutes: Option<u32>,
    pub child_name_hint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EntityExtractor {
    reference_date: NaiveDate,
    known_children: Vec<String>,
}

impl EntityExtractor {
    pub fn new(reference_date: NaiveDate) -> Self {
        Self {
            reference_date,
            known_children: Vec::new(),
        }
    }

    pub fn with_known_children(mut self, names: Vec<String>) -> Self {
        self.known_children = names;
        self
    }

    pub fn extract(&self, text: &str) -> ExtractedEntities {
        let mut dates = extract_dates(text, self.reference_date);
        if dates.is_empty() {
            if let Some(date) = resolve_relative_date(text, self.reference_date) {
                dates.push(date);
            }
        }

        let (has_reminder, reminder_minutes) = extract_reminder(text);

        ExtractedEntities {
            dates,
            times: extract_times(text),
            category: classify_category(text),
            priority: classify_priority(text),
            title: extract_title(text),
            has_reminder,
            reminder_minutes,
            child_name_hint: find_child_name(text, &self.known_children),
        }
    }

    /// 找得到日期才會產生候選事件
    pub fn to_candidate(&self, text: &str) -> Option<EventCandidate> {
        let entities = self.extract(text);
        let start_date = *entities.dates.first()?;
        let start_time = entities.times.first().copied();
        let end_time = match start_time {
            Some(start) => entities.times.get(1).copied().filter(|end| *end > start),
            None => None,
        };

        Some(EventCandidate {
            title: entities.title,
            description: truncate_chars(
                &text.lines().collect::<Vec<_>>().join(" "),
                MAX_DESCRIPTION_CHARS,
            ),
            start_date,
            end_date: None,
            start_time,
            end_time,
            is_all_day: start_time.is_none(),
            category: entities.category,
            priority: entities.priority,
            has_reminder: entities.has_reminder,
            reminder_minutes: entities.reminder_minutes.filter(|_| entities.has_reminder),
            child_name_hint: entities.child_name_hint,
            color: entities.category.color().to_string(),
        })
    }
}

/// 依固定順序套用日期樣式；無效日期直接略過。
/// 沒寫年份的月日以 `reference` 推算，已經過去的日期算到明年
pub fn extract_dates(text: &str, reference: NaiveDate) -> Vec<NaiveDate> {
    let mut consumed: Vec<(usize, usize)> = Vec::new();
    let mut dates = Vec::new();

    for pattern in DATE_PATTERNS.iter() {
        for caps in pattern.regex.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let span = (whole.start(), whole.end());
            // "March 16, 2025" 已被有年份的樣式吃掉，不再當成 "March 16"
            if consumed.iter().any(|&(s, e)| span.0 < e && s < span.1) {
                continue;
            }
            let Some(date) = date_from_captures(&caps, pattern.layout, reference) else {
                continue;
            };
            consumed.push(span);
            if !dates.contains(&date) {
                dates.push(date);
            }
        }
    }

    dates
}

fn date_from_captures(caps: &Captures, layout: DateLayout, reference: NaiveDate) -> Option<NaiveDate> {
    let (year, month, day) = match layout {
        DateLayout::NumericMonthDayYear => (
            caps[3].parse::<i32>().ok()?,
            caps[1].parse::<u32>().ok()?,
            caps[2].parse::<u32>().ok()?,
        ),
        DateLayout::NumericYearMonthDay => (
            caps[1].parse::<i32>().ok()?,
            caps[2].parse::<u32>().ok()?,
            caps[3].parse::<u32>().ok()?,
        ),
        DateLayout::NamedMonthDayYear => (
            caps[3].parse::<i32>().ok()?,
            month_name_to_number(&caps[1])?,
            caps[2].parse::<u32>().ok()?,
        ),
        DateLayout::DayNamedMonthYear => (
            caps[3].parse::<i32>().ok()?,
            month_name_to_number(&caps[2])?,
            caps[1].parse::<u32>().ok()?,
        ),
        DateLayout::NamedMonthDay => {
            return upcoming_month_day(
                month_name_to_number(&caps[1])?,
                caps[2].parse::<u32>().ok()?,
                reference,
            )
        }
        DateLayout::DayNamedMonth => {
            return upcoming_month_day(
                month_name_to_number(&caps[2])?,
                caps[1].parse::<u32>().ok()?,
                reference,
            )
        }
    };

    // 直接以年月日欄位建立日期，不經過任何時區轉換
    NaiveDate::from_ymd_opt(year, month, day)
}

/// 今年的這一天；已經過了就是明年（2/29 則找下一個有效的年份）
fn upcoming_month_day(month: u32, day: u32, reference: NaiveDate) -> Option<NaiveDate> {
    (0..=4)
        .filter_map(|ahead| NaiveDate::from_ymd_opt(reference.year() + ahead, month, day))
        .find(|date| *date >= reference)
}

fn month_name_to_number(name: &str) -> Option<u32> {
    match name.to_lowercase().as_str() {
        "january" | "jan" => Some(1),
        "february" | "feb" => Some(2),
        "march" | "mar" => Some(3),
        "april" | "apr" => Some(4),
        "may" => Some(5),
        "june" | "jun" => Some(6),
        "july" | "jul" => Some(7),
        "august" | "aug" => Some(8),
        "september" | "sep" | "sept" => Some(9),
        "october" | "oct" => Some(10),
        "november" | "nov" => Some(11),
        "december" | "dec" => Some(12),
        _ => None,
    }
}

/// today / tomorrow / 星期名稱，取文中最早出現者
pub fn resolve_relative_date(text: &str, reference: NaiveDate) -> Option<NaiveDate> {
    let day_match = RELATIVE_DAY.captures(text).and_then(|caps| {
        let whole = caps.get(0)?;
        let offset = match caps[1].to_lowercase().as_str() {
            "tomorrow" => 1,
            _ => 0,
        };
        Some((whole.start(), reference.checked_add_days(Days::new(offset))?))
    });

    let weekday_match = RELATIVE_WEEKDAY.captures(text).and_then(|caps| {
        let whole = caps.get(0)?;
        let target = parse_weekday(&caps[2])?;
        let is_next = caps
            .get(1)
            .map(|m| m.as_str().eq_ignore_ascii_case("next"))
            .unwrap_or(false);

        let current = i64::from(reference.weekday().num_days_from_monday());
        let wanted = i64::from(target.num_days_from_monday());
        let mut ahead = (wanted - current).rem_euclid(7);
        if ahead == 0 && is_next {
            ahead = 7;
        }
        let ahead = u64::try_from(ahead).ok()?;
        Some((whole.start(), reference.checked_add_days(Days::new(ahead))?))
    });

    match (day_match, weekday_match) {
        (Some(day), Some(weekday)) => Some(if day.0 <= weekday.0 { day.1 } else { weekday.1 }),
        (Some(day), None) => Some(day.1),
        (None, Some(weekday)) => Some(weekday.1),
        (None, None) => None,
    }
}

fn parse_weekday(name: &str) -> Option<Weekday> {
    match name.to_lowercase().as_str() {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// 依文中出現順序回傳去重後的時間
pub fn extract_times(text: &str) -> Vec<NaiveTime> {
    let mut consumed: Vec<(usize, usize)> = Vec::new();
    let mut found: Vec<(usize, NaiveTime)> = Vec::new();

    for pattern in TIME_PATTERNS.iter() {
        for caps in pattern.regex.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let span = (whole.start(), whole.end());
            if consumed.iter().any(|&(s, e)| span.0 < e && s < span.1) {
                continue;
            }
            consumed.push(span);

            if let Some(time) = time_from_captures(&caps, pattern.layout) {
                found.push((span.0, time));
            }
        }
    }

    found.sort_by_key(|(position, _)| *position);

    let mut times = Vec::new();
    for (_, time) in found {
        if !times.contains(&time) {
            times.push(time);
        }
    }
    times
}

fn time_from_captures(caps: &Captures, layout: TimeLayout) -> Option<NaiveTime> {
    let hour = caps.get(1)?.as_str().parse::<u32>().ok()?;
    let minute = match caps.get(2) {
        Some(m) => m.as_str().parse::<u32>().ok()?,
        None => 0,
    };
    let meridiem = match layout {
        TimeLayout::WithSecondsMeridiem => caps.get(4),
        TimeLayout::Meridiem | TimeLayout::AtPhrase => caps.get(3),
        TimeLayout::TwentyFourHour => None,
    };
    let meridiem = meridiem.and_then(|m| m.as_str().chars().next());

    to_24_hour(hour, minute, meridiem)
}

fn to_24_hour(hour: u32, minute: u32, meridiem: Option<char>) -> Option<NaiveTime> {
    let hour = match meridiem.map(|c| c.to_ascii_lowercase()) {
        Some(marker) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            match (marker, hour) {
                ('a', 12) => 0,
                ('a', h) => h,
                ('p', 12) => 12,
                ('p', h) => h + 12,
                _ => return None,
            }
        }
        None => hour,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// 把單一時間字串轉成 `HH:MM`，接受 24 小時制與 AM/PM
pub fn normalize_time(raw: &str) -> Option<NaiveTime> {
    let trimmed = raw.trim();
    let without_at = trimmed
        .strip_prefix("at ")
        .or_else(|| trimmed.strip_prefix("At "))
        .unwrap_or(trimmed)
        .trim();

    for format in ["%H:%M", "%H:%M:%S"] {
        if let Ok(time) = NaiveTime::parse_from_str(without_at, format) {
            return Some(time);
        }
    }

    extract_times(without_at)
        .first()
        .copied()
        .or_else(|| extract_times(&format!("at {}", without_at)).first().copied())
}

pub fn classify_category(text: &str) -> Category {
    let lower = text.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|keyword| lower.contains(keyword)))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Other)
}

pub fn classify_priority(text: &str) -> Priority {
    let lower = text.to_lowercase();
    PRIORITY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|keyword| lower.contains(keyword)))
        .map(|(priority, _)| *priority)
        .unwrap_or(Priority::Medium)
}

pub fn extract_title(text: &str) -> String {
    if let Some(title) = domain_title(text) {
        return title;
    }

    if let Some(caps) = LABEL_TITLE.captures(text) {
        let mut label = caps[1].trim();
        // "Re: Re: Fwd" 之類的重複前綴
        while let Some(rest) = strip_reply_prefix(label) {
            label = rest;
        }
        if !label.is_empty() && label.chars().count() < MAX_TITLE_LINE_CHARS {
            return label.to_string();
        }
    }

    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && line.chars().count() < MAX_TITLE_LINE_CHARS)
        .map(str::to_string)
        .unwrap_or_else(|| FALLBACK_TITLE.to_string())
}

fn strip_reply_prefix(label: &str) -> Option<&str> {
    let lower = label.to_ascii_lowercase();
    ["re:", "fwd:", "fw:"]
        .iter()
        .find(|prefix| lower.starts_with(*prefix))
        .map(|prefix| label[prefix.len()..].trim_start())
}

fn domain_title(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    let subject = SUBJECT.captures(text).map(|caps| title_case(&caps[1]));

    if let Some(subject) = &subject {
        if lower.contains("homework") {
            return Some(format!("{} Homework Due", subject));
        }
        if lower.contains("assignment") {
            return Some(format!("{} Assignment Due", subject));
        }
    }

    // 用完整單字比對，"Finally" 或 "example" 不算
    let mentions_exam = EXAM_WORD.is_match(text);
    if mentions_exam || TEST_WORD.is_match(text) {
        if FINAL_WORD.is_match(text) {
            return Some("Final Exam".to_string());
        }
        if MIDTERM_WORD.is_match(text) {
            return Some("Midterm Exam".to_string());
        }
        if let Some(subject) = &subject {
            let noun = if mentions_exam { "Exam" } else { "Test" };
            return Some(format!("{} {}", subject, noun));
        }
    }

    if lower.contains("parent") && (lower.contains("meeting") || lower.contains("conference")) {
        return Some("Parent-Teacher Meeting".to_string());
    }

    if lower.contains("birthday") && lower.contains("party") {
        return Some("Birthday Party".to_string());
    }

    None
}

fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn extract_reminder(text: &str) -> (bool, Option<u32>) {
    if !REMINDER_WORD.is_match(text) {
        return (false, None);
    }

    let minutes = REMINDER_LEAD.captures(text).and_then(|caps| {
        let amount = caps[1].parse::<u32>().ok()?;
        let unit = caps[2].to_lowercase();
        let factor = if unit.starts_with('h') {
            60
        } else if unit.starts_with('d') {
            24 * 60
        } else {
            1
        };
        amount.checked_mul(factor).filter(|m| *m > 0)
    });

    (true, minutes)
}

fn find_child_name(text: &str, known_children: &[String]) -> Option<String> {
    known_children
        .iter()
        .filter(|name| !name.trim().is_empty())
        .filter_map(|name| {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(name.trim()));
            let regex = Regex::new(&pattern).ok()?;
            regex.find(text).map(|m| (m.start(), name.trim().to_string()))
        })
        .min_by_key(|(position, _)| *position)
        .map(|(_, name)| name)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}
