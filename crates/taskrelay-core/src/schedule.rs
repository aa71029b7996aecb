use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::trace;

use crate::datetime::{
  add_days,
  end_of_week,
  is_same_day,
  is_within_range,
  start_of_week
};
use crate::meeting::Meeting;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MeetingStatus {
  Past,
  Live,
  Upcoming
}

impl MeetingStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      | Self::Past => "past",
      | Self::Live => "live",
      | Self::Upcoming => "upcoming"
    }
  }
}

/// Narrows partitions to one project. Composes with the time filters.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct ScheduleFilter {
  pub project_id: Option<String>
}

impl ScheduleFilter {
  pub fn project(
    id: impl Into<String>
  ) -> Self {
    Self {
      project_id: Some(id.into())
    }
  }

  /// Project-less meetings never match a project filter.
  pub fn matches(
    &self,
    meeting: &Meeting
  ) -> bool {
    match self.project_id.as_deref() {
      | None => true,
      | Some(wanted) => {
        meeting.project_id()
          == Some(wanted)
      }
    }
  }
}

/// `Live` iff `start <= now < end`, `Past` iff `now >= end`.
#[must_use]
pub fn classify_meeting_status(
  meeting: &Meeting,
  now: NaiveDateTime
) -> MeetingStatus {
  if now >= meeting.end() {
    MeetingStatus::Past
  } else if now >= meeting.datetime {
    MeetingStatus::Live
  } else {
    MeetingStatus::Upcoming
  }
}

pub fn todays_meetings<'a>(
  meetings: &'a [Meeting],
  now: NaiveDateTime,
  filter: &ScheduleFilter
) -> Vec<&'a Meeting> {
  select_ascending(meetings, filter, |m| {
    is_same_day(m.datetime, now)
  })
}

/// Meetings starting strictly after `now` and strictly before
/// `now + window_days`. Meetings already in progress are not upcoming.
pub fn upcoming_meetings<'a>(
  meetings: &'a [Meeting],
  now: NaiveDateTime,
  window_days: i64,
  filter: &ScheduleFilter
) -> Vec<&'a Meeting> {
  let horizon =
    add_days(now, window_days);
  select_ascending(meetings, filter, |m| {
    m.datetime > now
      && m.datetime < horizon
  })
}

pub fn live_meetings<'a>(
  meetings: &'a [Meeting],
  now: NaiveDateTime,
  filter: &ScheduleFilter
) -> Vec<&'a Meeting> {
  select_ascending(meetings, filter, |m| {
    classify_meeting_status(m, now)
      == MeetingStatus::Live
  })
}

/// Ended meetings, most recent start first.
pub fn past_meetings<'a>(
  meetings: &'a [Meeting],
  now: NaiveDateTime,
  filter: &ScheduleFilter
) -> Vec<&'a Meeting> {
  let mut out =
    select_ascending(meetings, filter, |m| {
      classify_meeting_status(m, now)
        == MeetingStatus::Past
    });
  out.reverse();
  out
}

/// Start time within `start..=end`.
pub fn meetings_in_range<'a>(
  meetings: &'a [Meeting],
  start: NaiveDateTime,
  end: NaiveDateTime,
  filter: &ScheduleFilter
) -> Vec<&'a Meeting> {
  select_ascending(meetings, filter, |m| {
    is_within_range(
      m.datetime, start, end
    )
  })
}

/// The Sunday-to-Saturday week containing `now`.
pub fn week_meetings<'a>(
  meetings: &'a [Meeting],
  now: NaiveDateTime,
  filter: &ScheduleFilter
) -> Vec<&'a Meeting> {
  meetings_in_range(
    meetings,
    start_of_week(now),
    end_of_week(now),
    filter
  )
}

#[derive(Debug, Clone, PartialEq)]
pub struct Partition<'a> {
  pub today:    Vec<&'a Meeting>,
  pub upcoming: Vec<&'a Meeting>,
  pub past:     Vec<&'a Meeting>
}

#[tracing::instrument(skip(
  meetings, now
), fields(count = meetings.len()))]
pub fn partition_meetings<'a>(
  meetings: &'a [Meeting],
  now: NaiveDateTime,
  window_days: i64,
  filter: &ScheduleFilter
) -> Partition<'a> {
  let partition = Partition {
    today:    todays_meetings(
      meetings, now, filter
    ),
    upcoming: upcoming_meetings(
      meetings,
      now,
      window_days,
      filter
    ),
    past:     past_meetings(
      meetings, now, filter
    )
  };
  trace!(
    today = partition.today.len(),
    upcoming = partition.upcoming.len(),
    past = partition.past.len(),
    "partitioned meetings"
  );
  partition
}

fn select_ascending<'a, F>(
  meetings: &'a [Meeting],
  filter: &ScheduleFilter,
  keep: F
) -> Vec<&'a Meeting>
where
  F: Fn(&Meeting) -> bool
{
  let mut out: Vec<&Meeting> = meetings
    .iter()
    .filter(|&m| {
      filter.matches(m) && keep(m)
    })
    .collect();
  out.sort_by_key(|m| m.datetime);
  out
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    NaiveDateTime
  };

  use super::*;
  use crate::meeting::{
    ProjectRef,
    UserRef
  };

  fn at(
    y: i32,
    m: u32,
    d: u32,
    hh: u32,
    mm: u32
  ) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
      .and_then(|date| {
        date.and_hms_opt(hh, mm, 0)
      })
      .expect("valid datetime")
  }

  fn meeting(
    id: &str,
    start: NaiveDateTime,
    duration: u32,
    project: Option<&str>
  ) -> Meeting {
    Meeting {
      id: id.to_string(),
      title: format!("meeting {id}"),
      datetime: start,
      duration,
      attendees: vec![],
      project: project.map(|p| {
        ProjectRef {
          id:   p.to_string(),
          name: p.to_uppercase()
        }
      }),
      creator: UserRef {
        id:    "u1".to_string(),
        name:  None,
        email: None
      },
      description: None,
      location: None
    }
  }

  fn ids(
    meetings: &[&Meeting]
  ) -> Vec<String> {
    meetings
      .iter()
      .map(|m| m.id.clone())
      .collect()
  }

  #[test]
  fn ninety_minute_meeting_is_live_then_past(
  ) {
    let standup = meeting(
      "a",
      at(2024, 3, 10, 9, 30),
      90,
      None
    );
    assert_eq!(
      classify_meeting_status(
        &standup,
        at(2024, 3, 10, 10, 0)
      ),
      MeetingStatus::Live
    );
    assert_eq!(
      classify_meeting_status(
        &standup,
        at(2024, 3, 10, 11, 30)
      ),
      MeetingStatus::Past
    );
    assert_eq!(
      classify_meeting_status(
        &standup,
        at(2024, 3, 10, 9, 0)
      ),
      MeetingStatus::Upcoming
    );
  }

  #[test]
  fn status_boundaries_are_half_open() {
    let review = meeting(
      "a",
      at(2024, 3, 10, 9, 30),
      30,
      None
    );
    assert_eq!(
      classify_meeting_status(
        &review,
        at(2024, 3, 10, 9, 30)
      ),
      MeetingStatus::Live
    );
    assert_eq!(
      classify_meeting_status(
        &review,
        at(2024, 3, 10, 10, 0)
      ),
      MeetingStatus::Past
    );

    let instant = meeting(
      "b",
      at(2024, 3, 10, 9, 30),
      0,
      None
    );
    assert_eq!(
      classify_meeting_status(
        &instant,
        at(2024, 3, 10, 9, 29)
      ),
      MeetingStatus::Upcoming
    );
    assert_eq!(
      classify_meeting_status(
        &instant,
        at(2024, 3, 10, 9, 30)
      ),
      MeetingStatus::Past
    );
  }

  #[test]
  fn todays_meetings_are_sorted_subset() {
    let now = at(2024, 3, 10, 10, 0);
    let meetings = vec![
      meeting(
        "late",
        at(2024, 3, 10, 16, 0),
        30,
        None
      ),
      meeting(
        "tomorrow",
        at(2024, 3, 11, 0, 0),
        30,
        None
      ),
      meeting(
        "early",
        at(2024, 3, 10, 0, 0),
        30,
        None
      ),
      meeting(
        "yesterday",
        at(2024, 3, 9, 23, 59),
        30,
        None
      ),
    ];

    let today = todays_meetings(
      &meetings,
      now,
      &ScheduleFilter::default()
    );
    assert_eq!(
      ids(&today),
      vec!["early", "late"]
    );
    assert!(today.iter().all(|m| {
      m.datetime.date() == now.date()
    }));
  }

  #[test]
  fn upcoming_window_is_exclusive_on_both_ends(
  ) {
    let now = at(2024, 3, 10, 10, 0);
    let meetings = vec![
      meeting(
        "at-now",
        now,
        60,
        None
      ),
      meeting(
        "in-progress",
        at(2024, 3, 10, 9, 30),
        90,
        None
      ),
      meeting(
        "next-minute",
        at(2024, 3, 10, 10, 1),
        30,
        None
      ),
      meeting(
        "six-days",
        at(2024, 3, 16, 9, 0),
        30,
        None
      ),
      meeting(
        "at-horizon",
        at(2024, 3, 17, 10, 0),
        30,
        None
      ),
    ];

    let upcoming = upcoming_meetings(
      &meetings,
      now,
      7,
      &ScheduleFilter::default()
    );
    assert_eq!(
      ids(&upcoming),
      vec!["next-minute", "six-days"]
    );
  }

  #[test]
  fn upcoming_sorts_unordered_input_and_keeps_ties_stable(
  ) {
    let now = at(2024, 3, 10, 10, 0);
    let meetings = vec![
      meeting(
        "friday",
        at(2024, 3, 15, 9, 0),
        30,
        None
      ),
      meeting(
        "tie-first",
        at(2024, 3, 12, 11, 0),
        30,
        None
      ),
      meeting(
        "monday",
        at(2024, 3, 11, 8, 0),
        30,
        None
      ),
      meeting(
        "tie-second",
        at(2024, 3, 12, 11, 0),
        45,
        None
      ),
      meeting(
        "this-afternoon",
        at(2024, 3, 10, 15, 0),
        30,
        None
      ),
    ];

    let upcoming = upcoming_meetings(
      &meetings,
      now,
      7,
      &ScheduleFilter::default()
    );
    assert_eq!(
      ids(&upcoming),
      vec![
        "this-afternoon",
        "monday",
        "tie-first",
        "tie-second",
        "friday"
      ]
    );
  }

  #[test]
  fn enormous_window_reaches_every_future_meeting(
  ) {
    let now = at(2024, 3, 10, 10, 0);
    let meetings = vec![
      meeting(
        "far",
        at(9999, 12, 31, 9, 0),
        30,
        None
      ),
      meeting(
        "soon",
        at(2024, 3, 11, 9, 0),
        30,
        None
      ),
      meeting(
        "before",
        at(2024, 3, 9, 9, 0),
        30,
        None
      ),
    ];

    for window in
      [200_000_000_000_000, i64::MAX]
    {
      let upcoming = upcoming_meetings(
        &meetings,
        now,
        window,
        &ScheduleFilter::default()
      );
      assert_eq!(
        ids(&upcoming),
        vec!["soon", "far"]
      );
    }
  }

  #[test]
  fn project_filter_composes_with_time_filter(
  ) {
    let now = at(2024, 3, 10, 10, 0);
    let meetings = vec![
      meeting(
        "relay-today",
        at(2024, 3, 10, 14, 0),
        30,
        Some("relay")
      ),
      meeting(
        "other-today",
        at(2024, 3, 10, 15, 0),
        30,
        Some("other")
      ),
      meeting(
        "no-project",
        at(2024, 3, 10, 16, 0),
        30,
        None
      ),
      meeting(
        "relay-next-week",
        at(2024, 3, 20, 9, 0),
        30,
        Some("relay")
      ),
    ];
    let filter =
      ScheduleFilter::project("relay");

    assert_eq!(
      ids(&todays_meetings(
        &meetings, now, &filter
      )),
      vec!["relay-today"]
    );
    assert_eq!(
      ids(&upcoming_meetings(
        &meetings, now, 7, &filter
      )),
      vec!["relay-today"]
    );
    assert_eq!(
      ids(&upcoming_meetings(
        &meetings, now, 14, &filter
      )),
      vec![
        "relay-today",
        "relay-next-week"
      ]
    );
  }

  #[test]
  fn past_and_live_partitions() {
    let now = at(2024, 3, 10, 10, 0);
    let meetings = vec![
      meeting(
        "old",
        at(2024, 3, 1, 9, 0),
        60,
        None
      ),
      meeting(
        "recent",
        at(2024, 3, 10, 8, 0),
        60,
        None
      ),
      meeting(
        "live",
        at(2024, 3, 10, 9, 30),
        90,
        None
      ),
      meeting(
        "later",
        at(2024, 3, 10, 15, 0),
        60,
        None
      ),
    ];
    let all = ScheduleFilter::default();

    assert_eq!(
      ids(&past_meetings(
        &meetings, now, &all
      )),
      vec!["recent", "old"]
    );
    assert_eq!(
      ids(&live_meetings(
        &meetings, now, &all
      )),
      vec!["live"]
    );

    let partition = partition_meetings(
      &meetings, now, 7, &all
    );
    assert_eq!(
      ids(&partition.today),
      vec!["recent", "live", "later"]
    );
    assert_eq!(
      ids(&partition.upcoming),
      vec!["later"]
    );
    assert_eq!(partition.past.len(), 2);
  }

  #[test]
  fn week_covers_sunday_through_saturday() {
    let now = at(2024, 3, 13, 12, 0);
    let meetings = vec![
      meeting(
        "saturday-before",
        at(2024, 3, 9, 23, 0),
        30,
        None
      ),
      meeting(
        "sunday",
        at(2024, 3, 10, 0, 0),
        30,
        None
      ),
      meeting(
        "saturday",
        at(2024, 3, 16, 23, 59),
        30,
        None
      ),
      meeting(
        "next-sunday",
        at(2024, 3, 17, 0, 0),
        30,
        None
      ),
    ];

    assert_eq!(
      ids(&week_meetings(
        &meetings,
        now,
        &ScheduleFilter::default()
      )),
      vec!["sunday", "saturday"]
    );
  }

  #[test]
  fn empty_input_yields_empty_partitions() {
    let now = at(2024, 3, 10, 10, 0);
    let all = ScheduleFilter::default();
    assert!(
      todays_meetings(&[], now, &all)
        .is_empty()
    );
    assert!(
      upcoming_meetings(&[], now, 7, &all)
        .is_empty()
    );
    assert!(
      past_meetings(&[], now, &all)
        .is_empty()
    );
  }
}
