use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};
use famcal::core::conflicts::find_conflicts_in_store;
use famcal::domain::model::{Category, EventCandidate, EventFilter, NewEvent, Priority};
use famcal::domain::ports::RecordStore;
use famcal::{build_month_grid, JsonRecordStore, LocalStorage, MonthView, TimeInterval};
use tempfile::TempDir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn timed_event(parent_id: i64, title: &str, day: NaiveDate, start: (u32, u32), end: Option<(u32, u32)>) -> NewEvent {
    NewEvent {
        parent_id,
        child_id: None,
        event: EventCandidate {
            title: title.to_string(),
            description: String::new(),
            start_date: day,
            end_date: Some(day),
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0),
            end_time: end.and_then(|(h, m)| NaiveTime::from_hms_opt(h, m, 0)),
            is_all_day: false,
            category: Category::Appointment,
            priority: Priority::Medium,
            has_reminder: false,
            reminder_minutes: None,
            child_name_hint: None,
            color: String::new(),
        },
    }
}

#[tokio::test]
async fn test_month_view_over_stored_events() -> Result<()> {
    let dir = TempDir::new()?;
    let store = JsonRecordStore::new(LocalStorage::new(dir.path().to_string_lossy().to_string()));

    store
        .create_event(timed_event(1, "Checkup", date(2025, 2, 24), (9, 0), None))
        .await?;
    store
        .create_event(timed_event(1, "Orthodontist", date(2025, 3, 12), (15, 0), Some((15, 45))))
        .await?;
    store
        .create_event(timed_event(2, "Someone else", date(2025, 3, 12), (8, 0), None))
        .await?;

    let grid = build_month_grid(2025, 3)?;
    let (from, to) = grid.range();
    let events = store
        .find_events(&EventFilter::owned_by(1).between(from, to))
        .await?;
    assert_eq!(events.len(), 2);

    let view = MonthView::new(&grid, &events);
    assert_eq!(view.events_on(date(2025, 2, 24)).len(), 1);
    assert_eq!(view.events_on(date(2025, 3, 12))[0].event.title, "Orthodontist");
    assert_eq!(view.days.len(), 42);

    Ok(())
}

#[tokio::test]
async fn test_conflict_lookup_is_owner_scoped_and_can_exclude() -> Result<()> {
    let dir = TempDir::new()?;
    let store = JsonRecordStore::new(LocalStorage::new(dir.path().to_string_lossy().to_string()));
    let day = date(2025, 3, 10);

    let a = store
        .create_event(timed_event(1, "A", day, (9, 0), Some((10, 0))))
        .await?;
    let late = store
        .create_event(timed_event(1, "Late show", date(2025, 3, 9), (23, 30), None))
        .await?;
    store
        .create_event(timed_event(2, "Other owner", day, (9, 0), Some((10, 0))))
        .await?;

    let touching = TimeInterval::new(day.and_hms_opt(10, 0, 0).unwrap(), None)?;
    assert!(find_conflicts_in_store(&store, 1, &touching, None).await?.is_empty());

    let inside = TimeInterval::new(
        day.and_hms_opt(9, 30, 0).unwrap(),
        Some(day.and_hms_opt(10, 30, 0).unwrap()),
    )?;
    let found = find_conflicts_in_store(&store, 1, &inside, None).await?;
    assert_eq!(found.iter().map(|e| e.id).collect::<Vec<_>>(), vec![a.id]);
    assert!(find_conflicts_in_store(&store, 1, &inside, Some(a.id)).await?.is_empty());

    // 前一晚 23:30 開始的事件延續到午夜之後
    let midnight = TimeInterval::new(day.and_hms_opt(0, 0, 0).unwrap(), None)?;
    let found = find_conflicts_in_store(&store, 1, &midnight, None).await?;
    assert_eq!(found.iter().map(|e| e.id).collect::<Vec<_>>(), vec![late.id]);

    Ok(())
}
