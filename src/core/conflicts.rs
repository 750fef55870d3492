//! Scheduling conflict detection with half-open intervals.

use crate::domain::model::{EventCandidate, EventFilter, Id, PersistedEvent};
use crate::domain::ports::RecordStore;
use crate::utils::error::{IngestError, Result};
use chrono::{Days, Duration, NaiveDateTime, NaiveTime};

/// 沒有結束時間時的預設長度
pub fn default_duration() -> Duration {
    Duration::hours(1)
}

/// `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeInterval {
    /// 結束早於開始視為錯誤；沒有結束或長度為零時套用預設一小時
    pub fn new(start: NaiveDateTime, end: Option<NaiveDateTime>) -> Result<Self> {
        match end {
            Some(end) if end < start => Err(IngestError::ValidationError {
                message: format!("interval end {} is before its start {}", end, start),
            }),
            Some(end) if end > start => Ok(Self { start, end }),
            _ => Ok(Self {
                start,
                end: with_default_window(start),
            }),
        }
    }

    pub fn of_event(event: &EventCandidate) -> Self {
        let start = event
            .start_date
            .and_time(event.start_time.unwrap_or(NaiveTime::MIN));
        let end = event
            .end_time
            .map(|time| event.last_day().and_time(time))
            .filter(|end| *end > start)
            .unwrap_or_else(|| with_default_window(start));
        Self { start, end }
    }

    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

fn with_default_window(start: NaiveDateTime) -> NaiveDateTime {
    start.checked_add_signed(default_duration()).unwrap_or(start)
}

pub fn find_conflicts<'a>(
    candidate: &TimeInterval,
    events: &'a [PersistedEvent],
) -> Vec<&'a PersistedEvent> {
    find_conflicts_excluding(candidate, events, None)
}

/// 編輯既有事件時排除自己
pub fn find_conflicts_excluding<'a>(
    candidate: &TimeInterval,
    events: &'a [PersistedEvent],
    exclude: Option<Id>,
) -> Vec<&'a PersistedEvent> {
    events
        .iter()
        .filter(|record| Some(record.id) != exclude)
        .filter(|record| candidate.overlaps(&TimeInterval::of_event(&record.event)))
        .collect()
}

pub async fn find_conflicts_in_store<S: RecordStore + ?Sized>(
    store: &S,
    parent_id: Id,
    candidate: &TimeInterval,
    exclude: Option<Id>,
) -> Result<Vec<PersistedEvent>> {
    // 前一天深夜開始的事件也可能跨到這個區間
    let from = candidate
        .start
        .date()
        .checked_sub_days(Days::new(1))
        .unwrap_or(candidate.start.date());
    let filter = EventFilter::owned_by(parent_id).between(from, candidate.end.date());
    let events = store.find_events(&filter).await?;

    Ok(find_conflicts_excluding(candidate, &events, exclude)
        .into_iter()
        .cloned()
        .collect())
}
