use crate::domain::model::PersistedEvent;
use crate::utils::error::Result;
use std::io::Write;

const HEADER: [&str; 13] = [
    "id",
    "childId",
    "title",
    "startDate",
    "endDate",
    "startTime",
    "endTime",
    "isAllDay",
    "category",
    "priority",
    "reminderMinutes",
    "color",
    "description",
];

/// 匯出成可以匯入試算表的 CSV
pub fn write_events_csv<W: Write>(events: &[PersistedEvent], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(HEADER)?;

    for record in events {
        let event = &record.event;
        csv_writer.write_record([
            record.id.to_string(),
            record.child_id.map(|id| id.to_string()).unwrap_or_default(),
            event.title.clone(),
            event.start_date.format("%Y-%m-%d").to_string(),
            event.last_day().format("%Y-%m-%d").to_string(),
            event.start_time_label().unwrap_or_default(),
            event.end_time_label().unwrap_or_default(),
            event.is_all_day.to_string(),
            event.category.to_string(),
            event.priority.to_string(),
            event
                .reminder_minutes
                .map(|m| m.to_string())
                .unwrap_or_default(),
            event.color.clone(),
            event.description.clone(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Category, EventCandidate, Priority};
    use chrono::{NaiveDate, NaiveTime};

    #[test]
    fn test_writes_header_and_quoted_fields() {
        let events = vec![PersistedEvent {
            id: 3,
            parent_id: 1,
            child_id: Some(2),
            event: EventCandidate {
                title: "Recital, Spring".to_string(),
                description: "Wear black".to_string(),
                start_date: NaiveDate::from_ymd_opt(2025, 5, 2).unwrap(),
                end_date: None,
                start_time: NaiveTime::from_hms_opt(18, 0, 0),
                end_time: None,
                is_all_day: false,
                category: Category::Extracurricular,
                priority: Priority::High,
                has_reminder: true,
                reminder_minutes: Some(30),
                child_name_hint: None,
                color: "#FF6D01".to_string(),
            },
        }];

        let mut buffer = Vec::new();
        write_events_csv(&events, &mut buffer).unwrap();
        let output = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert!(lines[0].starts_with("id,childId,title,startDate"));
        assert_eq!(
            lines[1],
            "3,2,\"Recital, Spring\",2025-05-02,2025-05-02,18:00,,false,EXTRACURRICULAR,HIGH,30,#FF6D01,Wear black"
        );
    }
}
