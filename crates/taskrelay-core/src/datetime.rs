//! Timezone-naive date arithmetic and display formatting.
//!
//! Every timestamp here is local wall-clock time. Nothing in this module
//! reads the system clock; callers pass `now` in.

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  Local,
  Month,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  Weekday
};
use regex::Regex;

pub const INVALID_DATE: &str =
  "Invalid date";
pub const INVALID_TIME: &str =
  "Invalid time";
pub const INVALID_DATETIME: &str =
  "Invalid datetime";

const WALL_CLOCK_FORMATS: [&str; 6] = [
  "%Y-%m-%dT%H:%M:%S",
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%dT%H:%M",
  "%Y-%m-%d %H:%M:%S",
  "%Y-%m-%d %H:%M:%S%.f",
  "%Y-%m-%d %H:%M"
];

#[must_use]
pub fn is_same_day(
  a: NaiveDateTime,
  b: NaiveDateTime
) -> bool {
  a.year() == b.year()
    && a.month() == b.month()
    && a.day() == b.day()
}

#[must_use]
pub fn start_of_day(
  d: NaiveDateTime
) -> NaiveDateTime {
  d.date().and_time(NaiveTime::MIN)
}

/// 23:59:59.999 on the same date.
#[must_use]
pub fn end_of_day(
  d: NaiveDateTime
) -> NaiveDateTime {
  last_instant_of(d.date())
}

/// Sunday 00:00 of the week containing `d`.
#[must_use]
pub fn start_of_week(
  d: NaiveDateTime
) -> NaiveDateTime {
  let back = d
    .weekday()
    .num_days_from_sunday()
    as i64;
  start_of_day(add_days(d, -back))
}

/// Saturday 23:59:59.999 of the week containing `d`.
#[must_use]
pub fn end_of_week(
  d: NaiveDateTime
) -> NaiveDateTime {
  end_of_day(add_days(
    start_of_week(d),
    6
  ))
}

/// Saturates at `NaiveDateTime::MIN`/`MAX` when the offset leaves the
/// representable range.
#[must_use]
pub fn add_days(
  d: NaiveDateTime,
  days: i64
) -> NaiveDateTime {
  Duration::try_days(days)
    .and_then(|delta| {
      d.checked_add_signed(delta)
    })
    .unwrap_or(if days < 0 {
      NaiveDateTime::MIN
    } else {
      NaiveDateTime::MAX
    })
}

#[must_use]
pub fn add_weeks(
  d: NaiveDateTime,
  weeks: i64
) -> NaiveDateTime {
  add_days(d, weeks.saturating_mul(7))
}

/// Shifts by whole months, clamping the day of month to the last valid day
/// of the target month. The time of day is kept.
#[must_use]
pub fn add_months(
  d: NaiveDateTime,
  months: i32
) -> NaiveDateTime {
  let total = d.year() as i64 * 12
    + d.month0() as i64
    + months as i64;
  let Ok(year) =
    i32::try_from(total.div_euclid(12))
  else {
    return d;
  };
  let month =
    total.rem_euclid(12) as u32 + 1;

  let day = d
    .day()
    .min(month_length(year, month));
  NaiveDate::from_ymd_opt(
    year, month, day
  )
  .map(|date| date.and_time(d.time()))
  .unwrap_or(d)
}

/// Inclusive on both ends.
#[must_use]
pub fn is_within_range(
  d: NaiveDateTime,
  start: NaiveDateTime,
  end: NaiveDateTime
) -> bool {
  d >= start && d <= end
}

#[must_use]
pub fn days_in_month(
  d: NaiveDateTime
) -> u32 {
  month_length(d.year(), d.month())
}

#[must_use]
pub fn is_weekend(
  d: NaiveDateTime
) -> bool {
  matches!(
    d.weekday(),
    Weekday::Sat | Weekday::Sun
  )
}

#[must_use]
pub fn first_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .unwrap_or(NaiveDate::MIN)
}

#[must_use]
pub fn last_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  let (next_year, next_month) =
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  first_day_of_month(
    next_year, next_month
  )
  .pred_opt()
  .unwrap_or(NaiveDate::MIN)
}

fn month_length(
  year: i32,
  month: u32
) -> u32 {
  last_day_of_month(year, month).day()
}

fn last_instant_of(
  date: NaiveDate
) -> NaiveDateTime {
  let time =
    NaiveTime::from_hms_milli_opt(
      23, 59, 59, 999
    )
    .unwrap_or(NaiveTime::MIN);
  date.and_time(time)
}

/// `3:05 PM`
#[must_use]
pub fn format_time(
  d: NaiveDateTime
) -> String {
  d.format("%-I:%M %p").to_string()
}

/// Today / Tomorrow / Yesterday, the weekday name within six days of
/// `now`, else `Mar 5` (with `, 2023` outside the current year).
#[must_use]
pub fn format_date(
  d: NaiveDateTime,
  now: NaiveDateTime
) -> String {
  let delta = d
    .date()
    .signed_duration_since(now.date())
    .num_days();

  match delta {
    | 0 => "Today".to_string(),
    | 1 => "Tomorrow".to_string(),
    | -1 => "Yesterday".to_string(),
    | -6..=6 => {
      d.format("%A").to_string()
    }
    | _ if d.year() == now.year() => {
      d.format("%b %-d").to_string()
    }
    | _ => {
      d.format("%b %-d, %Y").to_string()
    }
  }
}

#[must_use]
pub fn format_date_time(
  d: NaiveDateTime,
  now: NaiveDateTime
) -> String {
  format!(
    "{} at {}",
    format_date(d, now),
    format_time(d)
  )
}

#[must_use]
pub fn relative_time_string(
  d: NaiveDateTime,
  now: NaiveDateTime
) -> String {
  let seconds = d
    .signed_duration_since(now)
    .num_seconds();
  let magnitude = seconds.unsigned_abs();
  if magnitude < 60 {
    return "Just now".to_string();
  }

  let direction = if seconds < 0 {
    "ago"
  } else {
    "from now"
  };

  let minutes = magnitude / 60;
  if minutes < 60 {
    return format!(
      "{minutes} {} {direction}",
      pluralize(minutes, "minute")
    );
  }

  let hours = minutes / 60;
  if hours < 24 {
    return format!(
      "{hours} {} {direction}",
      pluralize(hours, "hour")
    );
  }

  format_date(d, now)
}

fn pluralize(
  count: u64,
  unit: &str
) -> String {
  if count == 1 {
    unit.to_string()
  } else {
    format!("{unit}s")
  }
}

#[must_use]
pub fn format_time_str(
  raw: &str
) -> String {
  parse_wall_clock(raw)
    .map(format_time)
    .unwrap_or_else(|| {
      INVALID_TIME.to_string()
    })
}

#[must_use]
pub fn format_date_str(
  raw: &str,
  now: NaiveDateTime
) -> String {
  parse_wall_clock(raw)
    .map(|d| format_date(d, now))
    .unwrap_or_else(|| {
      INVALID_DATE.to_string()
    })
}

#[must_use]
pub fn format_date_time_str(
  raw: &str,
  now: NaiveDateTime
) -> String {
  parse_wall_clock(raw)
    .map(|d| format_date_time(d, now))
    .unwrap_or_else(|| {
      INVALID_DATETIME.to_string()
    })
}

#[must_use]
pub fn relative_time_str(
  raw: &str,
  now: NaiveDateTime
) -> String {
  parse_wall_clock(raw)
    .map(|d| {
      relative_time_string(d, now)
    })
    .unwrap_or_else(|| {
      INVALID_DATE.to_string()
    })
}

/// Parses the timestamp shapes the API emits. Offsets are converted to
/// local wall-clock time and then dropped.
#[must_use]
pub fn parse_wall_clock(
  raw: &str
) -> Option<NaiveDateTime> {
  let token = raw.trim();
  if token.is_empty() {
    return None;
  }

  for fmt in WALL_CLOCK_FORMATS {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return Some(ndt);
    }
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Some(
      dt.with_timezone(&Local)
        .naive_local()
    );
  }

  NaiveDate::parse_from_str(
    token, "%Y-%m-%d"
  )
  .ok()
  .map(|date| {
    date.and_time(NaiveTime::MIN)
  })
}

#[tracing::instrument(skip(now), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  now: NaiveDateTime
) -> anyhow::Result<NaiveDateTime> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "now" => return Ok(now),
    | "today" => {
      return Ok(start_of_day(now));
    }
    | "tomorrow" => {
      return Ok(add_days(
        start_of_day(now),
        1
      ));
    }
    | "yesterday" => {
      return Ok(add_days(
        start_of_day(now),
        -1
      ));
    }
    | _ => {}
  }

  if token.len() == 4
    && token
      .chars()
      .all(|c| c.is_ascii_digit())
  {
    let year: i32 =
      token.parse().context(
        "invalid 4-digit year"
      )?;
    let date = NaiveDate::from_ymd_opt(
      year, 1, 1
    )
    .ok_or_else(|| {
      anyhow!(
        "invalid year value: {year}"
      )
    })?;
    return Ok(
      date.and_time(NaiveTime::MIN)
    );
  }

  if let Ok(weekday) =
    lower.parse::<Weekday>()
  {
    let today = now.date();
    let ahead = (7
      + weekday.num_days_from_sunday()
      - today
        .weekday()
        .num_days_from_sunday())
      % 7;
    let ahead =
      if ahead == 0 { 7 } else { ahead };
    return Ok(add_days(
      start_of_day(now),
      ahead as i64
    ));
  }

  if let Some((hour, minute)) =
    parse_clock_time(token)
  {
    let candidate = now
      .date()
      .and_hms_opt(hour, minute, 0)
      .ok_or_else(|| {
        anyhow!(
          "failed to construct clock \
           time candidate"
        )
      })?;
    return Ok(
      if candidate <= now {
        add_days(candidate, 1)
      } else {
        candidate
      }
    );
  }

  if let Ok(month) =
    lower.parse::<Month>()
  {
    let month = month.number_from_month();
    let this_year = first_day_of_month(
      now.year(),
      month
    )
    .and_time(NaiveTime::MIN);
    return Ok(
      if this_year <= now {
        add_months(this_year, 12)
      } else {
        this_year
      }
    );
  }

  let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[wdhm])$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;

  if let Some(caps) =
    rel_re.captures(token)
  {
    let num: i64 = caps["num"]
      .parse()
      .context(
        "invalid relative number"
      )?;
    let num = if &caps["sign"] == "-" {
      -num
    } else {
      num
    };

    let delta = match &caps["unit"] {
      | "w" => Duration::try_weeks(num),
      | "d" => Duration::try_days(num),
      | "h" => Duration::try_hours(num),
      | "m" => {
        Duration::try_minutes(num)
      }
      | unit => {
        return Err(anyhow!(
          "unknown relative unit: \
           {unit}"
        ));
      }
    };
    return delta
      .and_then(|delta| {
        now.checked_add_signed(delta)
      })
      .ok_or_else(|| {
        anyhow!(
          "relative offset out of \
           range: {token}"
        )
      });
  }

  if let Some(parsed) =
    parse_wall_clock(token)
  {
    return Ok(parsed);
  }

  if let Ok(first) =
    NaiveDate::parse_from_str(
      &format!("{token}-01"),
      "%Y-%m-%d"
    )
  {
    return Ok(
      first.and_time(NaiveTime::MIN)
    );
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     now/today/tomorrow/yesterday, \
     4-digit year, weekday names (e.g. \
     monday), month names (e.g. \
     march), clock times (e.g. 3:23pm \
     or 15:23), +Nw/+Nd/+Nh/+Nm, \
     YYYY-MM, YYYY-MM-DD, \
     YYYY-MM-DDTHH:MM, YYYY-MM-DD \
     HH:MM, RFC3339"
  })
}

fn parse_clock_time(
  token: &str
) -> Option<(u32, u32)> {
  let clock_re = Regex::new(
    r"(?i)^(?P<hour>\d{1,2}):(?P<minute>\d{2})\s*(?P<ampm>[ap]m)?$",
  )
  .ok()?;
  let captures =
    clock_re.captures(token.trim())?;

  let hour: u32 =
    captures["hour"].parse().ok()?;
  let minute: u32 =
    captures["minute"].parse().ok()?;
  if minute > 59 {
    return None;
  }

  let Some(ampm) = captures.name("ampm")
  else {
    return (hour <= 23)
      .then_some((hour, minute));
  };

  if hour == 0 || hour > 12 {
    return None;
  }
  let pm = ampm
    .as_str()
    .eq_ignore_ascii_case("pm");
  let hour = match (hour, pm) {
    | (12, false) => 0,
    | (12, true) => 12,
    | (h, true) => h + 12,
    | (h, false) => h
  };
  Some((hour, minute))
}


/// Serde adapter for wall-clock timestamps in API payloads.
pub mod wall_clock_serde {
  use chrono::NaiveDateTime;
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  const OUTPUT_FORMAT: &str =
    "%Y-%m-%dT%H:%M:%S";

  pub fn serialize<S>(
    dt: &NaiveDateTime,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &dt
        .format(OUTPUT_FORMAT)
        .to_string()
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<NaiveDateTime, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    super::parse_wall_clock(&raw)
      .ok_or_else(|| {
        serde::de::Error::custom(
          format!(
            "unrecognized timestamp: \
             {raw}"
          )
        )
      })
  }
}
