use std::io::{self, IsTerminal, Write};

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::{format_date_time, format_time, relative_time_string};
use crate::grid::{CalendarDay, calendar_weeks, month_title};
use crate::meeting::{Meeting, ProjectRef};
use crate::schedule::{MeetingStatus, classify_meeting_status};

const WEEKDAY_HEADER: [&str; 7] = ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"];
const CELL_WIDTH: usize = 4;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true) && io::stdout().is_terminal();
        Ok(Self { color })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, meetings, now), fields(count = meetings.len()))]
    pub fn print_meeting_table(
        &self,
        meetings: &[&Meeting],
        now: NaiveDateTime,
    ) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_meeting_table(out, meetings, now)
    }

    pub fn write_meeting_table<W: Write>(
        &self,
        mut out: W,
        meetings: &[&Meeting],
        now: NaiveDateTime,
    ) -> anyhow::Result<()> {
        if meetings.is_empty() {
            writeln!(out, "No meetings.")?;
            return Ok(());
        }

        let headers = ["ID", "When", "Length", "Status", "Project", "Title"];
        let mut rows = Vec::with_capacity(meetings.len());

        for meeting in meetings {
            let status = classify_meeting_status(meeting, now);
            let project = meeting
                .project
                .as_ref()
                .map(|p| p.name.clone())
                .unwrap_or_default();

            rows.push(vec![
                self.paint(&meeting.id, "33"),
                format_date_time(meeting.datetime, now),
                meeting.duration_display(),
                self.paint_status(status),
                project,
                meeting.title.clone(),
            ]);
        }

        write_table(&mut out, &headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, days))]
    pub fn print_calendar(&self, days: &[CalendarDay<'_>], focus: NaiveDate) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_calendar(out, days, focus)
    }

    pub fn write_calendar<W: Write>(
        &self,
        mut out: W,
        days: &[CalendarDay<'_>],
        focus: NaiveDate,
    ) -> anyhow::Result<()> {
        let title = month_title(focus);
        let grid_width = CELL_WIDTH * 7;
        let pad = grid_width.saturating_sub(UnicodeWidthStr::width(title.as_str())) / 2;
        writeln!(out, "{}{}", " ".repeat(pad), title)?;

        for label in WEEKDAY_HEADER {
            write!(out, "{label:>3} ")?;
        }
        writeln!(out)?;

        for week in calendar_weeks(days) {
            for day in week {
                write!(out, "{}", self.calendar_cell(day))?;
            }
            writeln!(out)?;
        }

        let busy = days
            .iter()
            .filter(|d| d.is_current_month && !d.meetings.is_empty())
            .count();
        let total: usize = days
            .iter()
            .filter(|d| d.is_current_month)
            .map(|d| d.meetings.len())
            .sum();
        writeln!(out, "{total} meeting(s) on {busy} day(s); * marks busy days")?;
        Ok(())
    }

    #[tracing::instrument(skip(self, meeting, now), fields(id = %meeting.id))]
    pub fn print_meeting_info(&self, meeting: &Meeting, now: NaiveDateTime) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_meeting_info(out, meeting, now)
    }

    pub fn write_meeting_info<W: Write>(
        &self,
        mut out: W,
        meeting: &Meeting,
        now: NaiveDateTime,
    ) -> anyhow::Result<()> {
        let status = classify_meeting_status(meeting, now);

        writeln!(out, "id        {}", meeting.id)?;
        writeln!(out, "title     {}", meeting.title)?;
        writeln!(out, "status    {}", self.paint_status(status))?;
        writeln!(
            out,
            "start     {} ({})",
            format_date_time(meeting.datetime, now),
            relative_time_string(meeting.datetime, now)
        )?;
        writeln!(
            out,
            "end       {} ({})",
            format_time(meeting.end()),
            meeting.duration_display()
        )?;
        if let Some(project) = &meeting.project {
            writeln!(out, "project   {} [{}]", project.name, project.id)?;
        }
        writeln!(out, "creator   {}", meeting.creator.display_name())?;
        if let Some(location) = &meeting.location {
            writeln!(out, "location  {location}")?;
        }
        if let Some(description) = &meeting.description {
            writeln!(out, "notes     {description}")?;
        }

        let summary = meeting.attendance();
        writeln!(
            out,
            "attendees {} ({} accepted, {} tentative, {} declined, {} pending)",
            summary.total(),
            summary.accepted,
            summary.tentative,
            summary.declined,
            summary.pending
        )?;
        for attendee in &meeting.attendees {
            writeln!(
                out,
                "          {:<10} {}",
                format!("{:?}", attendee.status).to_ascii_lowercase(),
                attendee.user.display_name()
            )?;
        }
        Ok(())
    }

    pub fn print_projects(&self, projects: &[ProjectRef]) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_projects(out, projects)
    }

    pub fn write_projects<W: Write>(
        &self,
        mut out: W,
        projects: &[ProjectRef],
    ) -> anyhow::Result<()> {
        if projects.is_empty() {
            writeln!(out, "No projects.")?;
            return Ok(());
        }
        let rows = projects
            .iter()
            .map(|p| vec![self.paint(&p.id, "33"), p.name.clone()])
            .collect();
        write_table(&mut out, &["ID", "Name"], rows)
    }

    fn calendar_cell(&self, day: &CalendarDay<'_>) -> String {
        let marker = if day.meetings.is_empty() { ' ' } else { '*' };
        let text = format!("{:>3}{marker}", day.date.day());

        if day.is_today {
            self.paint(&text, "7")
        } else if day.is_selected {
            self.paint(&text, "4")
        } else if !day.is_current_month {
            self.paint(&text, "90")
        } else {
            text
        }
    }

    fn paint_status(&self, status: MeetingStatus) -> String {
        match status {
            MeetingStatus::Live => self.paint(status.as_str(), "32"),
            MeetingStatus::Past => self.paint(status.as_str(), "90"),
            MeetingStatus::Upcoming => status.as_str().to_string(),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    writer: &mut W,
    headers: &[&str],
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let mut widths: Vec<usize> = headers.iter().map(|h| UnicodeWidthStr::width(*h)).collect();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(visible_width(cell));
        }
    }

    for (header, width) in headers.iter().zip(widths.iter().copied()) {
        write!(writer, "{header:width$} ")?;
    }
    writeln!(writer)?;

    for width in widths.iter().copied() {
        write!(writer, "{:-<width$} ", "")?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(widths.iter().copied()) {
            let padding = width.saturating_sub(visible_width(cell));
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn visible_width(s: &str) -> usize {
    UnicodeWidthStr::width(strip_ansi(s).as_str())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
