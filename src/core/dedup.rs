//! Duplicate suppression against the record store.
//!
//! Check-then-create is not atomic: two concurrent requests for the same owner
//! can both pass the check.

use crate::domain::model::{EventCandidate, EventFilter, Id, PersistedEvent};
use crate::domain::ports::RecordStore;
use crate::utils::error::Result;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub parent_id: Id,
    pub title: String,
    pub start_date: NaiveDate,
    pub child_id: Option<Id>,
}

impl DedupKey {
    pub fn new(parent_id: Id, candidate: &EventCandidate, child_id: Option<Id>) -> Self {
        Self {
            parent_id,
            title: candidate.title.clone(),
            start_date: candidate.start_date,
            child_id,
        }
    }

    /// 有 child 時才把 child 納入比對條件
    pub fn to_filter(&self) -> EventFilter {
        let filter = EventFilter::owned_by(self.parent_id)
            .with_title(self.title.clone())
            .on(self.start_date);
        match self.child_id {
            Some(child_id) => filter.for_child(child_id),
            None => filter,
        }
    }
}

pub struct DuplicateSuppressor<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> DuplicateSuppressor<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn find_existing(&self, key: &DedupKey) -> Result<Option<PersistedEvent>> {
        self.store.find_first_event(&key.to_filter()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Category, Priority};

    fn candidate(title: &str) -> EventCandidate {
        EventCandidate {
            title: title.to_string(),
            description: String::new(),
            start_date: NaiveDate::from_ymd_opt(2025, 3, 16).unwrap(),
            end_date: None,
            start_time: None,
            end_time: None,
            is_all_day: true,
            category: Category::Other,
            priority: Priority::Medium,
            has_reminder: false,
            reminder_minutes: None,
            child_name_hint: None,
            color: String::new(),
        }
    }

    #[test]
    fn test_filter_includes_child_only_when_resolved() {
        let key = DedupKey::new(5, &candidate("Picture Day"), None);
        let filter = key.to_filter();
        assert_eq!(filter.parent_id, 5);
        assert_eq!(filter.title.as_deref(), Some("Picture Day"));
        assert_eq!(filter.child_id, None);

        let key = DedupKey::new(5, &candidate("Picture Day"), Some(2));
        assert_eq!(key.to_filter().child_id, Some(2));
    }

    #[test]
    fn test_child_less_key_matches_any_child_record() {
        let record = PersistedEvent {
            id: 1,
            parent_id: 5,
            child_id: Some(3),
            event: candidate("Picture Day"),
        };
        let key = DedupKey::new(5, &candidate("Picture Day"), None);
        assert!(key.to_filter().matches(&record));

        let key = DedupKey::new(5, &candidate("Picture Day"), Some(4));
        assert!(!key.to_filter().matches(&record));
    }
}
