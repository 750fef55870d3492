//! Month grid: always 6 weeks of 7 days, weeks start on Sunday.

use crate::domain::model::{CalendarCell, PersistedEvent};
use crate::utils::error::{IngestError, Result};
use chrono::{Datelike, Days, NaiveDate};

pub const DAYS_PER_WEEK: usize = 7;
pub const GRID_CELLS: usize = 42;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub cells: Vec<CalendarCell>,
}

impl MonthGrid {
    pub fn weeks(&self) -> impl Iterator<Item = &[CalendarCell]> {
        self.cells.chunks(DAYS_PER_WEEK)
    }

    /// 格子涵蓋的第一天與最後一天
    pub fn range(&self) -> (NaiveDate, NaiveDate) {
        let first = self.cells.first().map(|c| c.date);
        let last = self.cells.last().map(|c| c.date);
        match (first, last) {
            (Some(first), Some(last)) => (first, last),
            _ => (NaiveDate::MIN, NaiveDate::MIN),
        }
    }
}

pub fn build_month_grid(year: i32, month: u32) -> Result<MonthGrid> {
    if !(1..=12).contains(&month) {
        return Err(IngestError::ValidationError {
            message: format!("month must be between 1 and 12, got {}", month),
        });
    }
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| out_of_range(year, month))?;

    let offset = u64::from(first.weekday().num_days_from_sunday());
    let grid_start = first
        .checked_sub_days(Days::new(offset))
        .ok_or_else(|| out_of_range(year, month))?;

    let mut cells = Vec::with_capacity(GRID_CELLS);
    let mut date = grid_start;
    for index in 0..GRID_CELLS {
        let is_current_month = date.year() == year && date.month() == month;
        cells.push(CalendarCell {
            date,
            is_current_month,
            is_previous_month: date < first,
            is_next_month: !is_current_month && date > first,
        });
        if index + 1 < GRID_CELLS {
            date = date.succ_opt().ok_or_else(|| out_of_range(year, month))?;
        }
    }

    Ok(MonthGrid { year, month, cells })
}

fn out_of_range(year: i32, month: u32) -> IngestError {
    IngestError::ValidationError {
        message: format!("{}-{:02} is outside the supported calendar range", year, month),
    }
}

#[derive(Debug, Clone)]
pub struct DayCell<'a> {
    pub cell: CalendarCell,
    pub events: Vec<&'a PersistedEvent>,
}

/// 月曆格子加上當天涵蓋的事件
#[derive(Debug, Clone)]
pub struct MonthView<'a> {
    pub year: i32,
    pub month: u32,
    pub days: Vec<DayCell<'a>>,
}

impl<'a> MonthView<'a> {
    pub fn new(grid: &MonthGrid, events: &'a [PersistedEvent]) -> Self {
        let days = grid
            .cells
            .iter()
            .map(|cell| {
                let mut on_day: Vec<&PersistedEvent> = events
                    .iter()
                    .filter(|e| e.event.start_date <= cell.date && cell.date <= e.event.last_day())
                    .collect();
                // 全天事件排前面，再依開始時間
                on_day.sort_by(|a, b| {
                    (!a.event.is_all_day, a.event.start_time, &a.event.title).cmp(&(
                        !b.event.is_all_day,
                        b.event.start_time,
                        &b.event.title,
                    ))
                });
                DayCell {
                    cell: *cell,
                    events: on_day,
                }
            })
            .collect();

        Self {
            year: grid.year,
            month: grid.month,
            days,
        }
    }

    pub fn weeks(&self) -> impl Iterator<Item = &[DayCell<'a>]> {
        self.days.chunks(DAYS_PER_WEEK)
    }

    pub fn events_on(&self, date: NaiveDate) -> &[&'a PersistedEvent] {
        self.days
            .iter()
            .find(|day| day.cell.date == date)
            .map(|day| day.events.as_slice())
            .unwrap_or(&[])
    }
}
