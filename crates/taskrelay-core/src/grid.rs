use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::debug;

use crate::datetime::{first_day_of_month, last_day_of_month};
use crate::meeting::Meeting;
use crate::schedule::ScheduleFilter;

/// One cell of a month view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay<'a> {
    pub date: NaiveDate,
    pub meetings: Vec<&'a Meeting>,
    pub is_current_month: bool,
    pub is_today: bool,
    pub is_selected: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GridOptions {
    pub selected: Option<NaiveDate>,
    pub filter: ScheduleFilter,
}

/// Month grid for the month containing `focus`, Sunday-first.
pub fn build_calendar_grid<'a>(
    meetings: &'a [Meeting],
    focus: NaiveDate,
    now: NaiveDateTime,
) -> Vec<CalendarDay<'a>> {
    build_calendar_grid_with(meetings, focus, now, &GridOptions::default())
}

#[tracing::instrument(skip(meetings, now, options), fields(count = meetings.len()))]
pub fn build_calendar_grid_with<'a>(
    meetings: &'a [Meeting],
    focus: NaiveDate,
    now: NaiveDateTime,
    options: &GridOptions,
) -> Vec<CalendarDay<'a>> {
    let (start, end) = grid_bounds(focus);

    let mut by_day: BTreeMap<NaiveDate, Vec<&Meeting>> = BTreeMap::new();
    for meeting in meetings.iter().filter(|&m| options.filter.matches(m)) {
        let day = meeting.datetime.date();
        if day >= start && day <= end {
            by_day.entry(day).or_default().push(meeting);
        }
    }
    for bucket in by_day.values_mut() {
        bucket.sort_by_key(|m| m.datetime);
    }

    let today = now.date();
    let days: Vec<CalendarDay<'a>> = start
        .iter_days()
        .take_while(|date| *date <= end)
        .map(|date| CalendarDay {
            date,
            meetings: by_day.remove(&date).unwrap_or_default(),
            is_current_month: date.year() == focus.year() && date.month() == focus.month(),
            is_today: date == today,
            is_selected: options.selected == Some(date),
        })
        .collect();

    debug!(
        start = %start,
        end = %end,
        cells = days.len(),
        "built calendar grid"
    );
    days
}

/// First and last cell of the grid: the Sunday on or before the first of the
/// month through the Saturday on or after its last day.
pub fn grid_bounds(focus: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = first_day_of_month(focus.year(), focus.month());
    let last = last_day_of_month(focus.year(), focus.month());

    let lead = i64::from(first.weekday().num_days_from_sunday());
    let trail = 6 - i64::from(last.weekday().num_days_from_sunday());

    (shift(first, -lead), shift(last, trail))
}

/// Rows of seven for renderers.
pub fn calendar_weeks<'d, 'a>(
    days: &'d [CalendarDay<'a>],
) -> std::slice::Chunks<'d, CalendarDay<'a>> {
    days.chunks(7)
}

pub fn month_title(focus: NaiveDate) -> String {
    focus.format("%B %Y").to_string()
}

fn shift(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_add_signed(Duration::days(days)).unwrap_or(date)
}
