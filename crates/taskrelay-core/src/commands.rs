use anyhow::{Context, anyhow};
use chrono::{Datelike, Month, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, info, instrument};

use crate::cli::Invocation;
use crate::config::Config;
use crate::datetime::{add_months, end_of_day, first_day_of_month, parse_date_expr};
use crate::grid::{GridOptions, build_calendar_grid_with};
use crate::meeting::Meeting;
use crate::render::Renderer;
use crate::schedule::{
    ScheduleFilter, live_meetings, meetings_in_range, past_meetings, todays_meetings,
    upcoming_meetings, week_meetings,
};
use crate::snapshot::Snapshot;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "today",
        "upcoming",
        "past",
        "week",
        "calendar",
        "info",
        "projects",
        "_commands",
        "_show",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Everything a command reads; commands never mutate the snapshot.
#[derive(Debug)]
pub struct CommandContext<'a> {
    pub snapshot: &'a Snapshot,
    pub cfg: &'a Config,
    pub now: NaiveDateTime,
    pub filter: ScheduleFilter,
}

#[instrument(skip(ctx, renderer, inv), fields(command = %inv.command))]
pub fn dispatch(
    ctx: &CommandContext<'_>,
    renderer: &Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    debug!(
        args = ?inv.command_args,
        now = %ctx.now,
        project = ?ctx.filter.project_id,
        "dispatching command"
    );

    match inv.command.as_str() {
        "today" => cmd_today(ctx, renderer),
        "upcoming" => cmd_upcoming(ctx, renderer, &inv.command_args),
        "past" => cmd_past(ctx, renderer),
        "week" => cmd_week(ctx, renderer),
        "calendar" => cmd_calendar(ctx, renderer, &inv.command_args),
        "info" => cmd_info(ctx, renderer, &inv.command_args),
        "projects" => cmd_projects(ctx, renderer),
        "_commands" => cmd_commands(),
        "_show" => cmd_show(ctx.cfg),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

fn cmd_today(ctx: &CommandContext<'_>, renderer: &Renderer) -> anyhow::Result<()> {
    info!("command today");
    let meetings = todays_meetings(&ctx.snapshot.meetings, ctx.now, &ctx.filter);
    renderer.print_meeting_table(&meetings, ctx.now)
}

fn cmd_upcoming(
    ctx: &CommandContext<'_>,
    renderer: &Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    let days = upcoming_window(ctx.cfg, args)?;
    info!(days, "command upcoming");

    let live = live_meetings(&ctx.snapshot.meetings, ctx.now, &ctx.filter);
    if !live.is_empty() {
        println!("In progress:");
        renderer.print_meeting_table(&live, ctx.now)?;
        println!();
    }

    let meetings = upcoming_meetings(&ctx.snapshot.meetings, ctx.now, days, &ctx.filter);
    renderer.print_meeting_table(&meetings, ctx.now)
}

fn cmd_past(ctx: &CommandContext<'_>, renderer: &Renderer) -> anyhow::Result<()> {
    info!("command past");
    let meetings = past_meetings(&ctx.snapshot.meetings, ctx.now, &ctx.filter);
    renderer.print_meeting_table(&meetings, ctx.now)
}

fn cmd_week(ctx: &CommandContext<'_>, renderer: &Renderer) -> anyhow::Result<()> {
    info!("command week");
    let meetings = week_meetings(&ctx.snapshot.meetings, ctx.now, &ctx.filter);
    renderer.print_meeting_table(&meetings, ctx.now)
}

fn cmd_calendar(
    ctx: &CommandContext<'_>,
    renderer: &Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    let request = CalendarRequest::parse(args, ctx.now)?;
    info!(focus = %request.focus, selected = ?request.selected, "command calendar");

    let options = GridOptions {
        selected: request.selected,
        filter: ctx.filter.clone(),
    };
    let days = build_calendar_grid_with(&ctx.snapshot.meetings, request.focus, ctx.now, &options);
    renderer.print_calendar(&days, request.focus)?;

    if let Some(selected) = request.selected {
        let meetings = selected_day_meetings(ctx, selected);
        println!();
        println!("{}:", selected.format("%A, %B %-d, %Y"));
        renderer.print_meeting_table(&meetings, ctx.now)?;
    }
    Ok(())
}

/// The selected day may lie outside the focused month's grid.
fn selected_day_meetings<'a>(ctx: &CommandContext<'a>, day: NaiveDate) -> Vec<&'a Meeting> {
    let start = day.and_time(NaiveTime::MIN);
    meetings_in_range(&ctx.snapshot.meetings, start, end_of_day(start), &ctx.filter)
}

fn cmd_info(
    ctx: &CommandContext<'_>,
    renderer: &Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    let id = args
        .first()
        .ok_or_else(|| anyhow!("info requires a meeting id"))?;
    info!(id = %id, "command info");

    let meeting = ctx
        .snapshot
        .meeting(id)
        .ok_or_else(|| anyhow!("no meeting with id {id}"))?;
    renderer.print_meeting_info(meeting, ctx.now)
}

fn cmd_projects(ctx: &CommandContext<'_>, renderer: &Renderer) -> anyhow::Result<()> {
    info!("command projects");
    let projects = ctx.snapshot.project_refs();
    renderer.print_projects(&projects)
}

fn cmd_commands() -> anyhow::Result<()> {
    for command in known_command_names() {
        println!("{command}");
    }
    Ok(())
}

fn cmd_show(cfg: &Config) -> anyhow::Result<()> {
    for (k, v) in cfg.iter() {
        println!("{k}={v}");
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "Commands: today, upcoming [DAYS], past, week, calendar [MONTH] [select:DATE], \
         info ID, projects, _commands, _show, version"
    );
    Ok(())
}

fn upcoming_window(cfg: &Config, args: &[String]) -> anyhow::Result<i64> {
    let Some(raw) = args.first() else {
        return cfg.upcoming_days();
    };
    let days: i64 = raw
        .parse()
        .with_context(|| format!("upcoming expects a number of days, got {raw:?}"))?;
    if days <= 0 {
        return Err(anyhow!("upcoming window must be positive, got {days}"));
    }
    Ok(days)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CalendarRequest {
    focus: NaiveDate,
    selected: Option<NaiveDate>,
}

impl CalendarRequest {
    /// `[next|prev|MONTH-EXPR] [select:DATE-EXPR]`, in any order.
    fn parse(args: &[String], now: NaiveDateTime) -> anyhow::Result<Self> {
        let mut focus = None;
        let mut selected = None;

        for arg in args {
            if let Some(expr) = arg.strip_prefix("select:") {
                let day = parse_date_expr(expr, now)
                    .with_context(|| format!("invalid selected day {expr:?}"))?;
                selected = Some(day.date());
                continue;
            }
            if focus.is_some() {
                return Err(anyhow!("calendar takes one month expression, got extra {arg:?}"));
            }
            let lower = arg.to_ascii_lowercase();
            let month = match lower.as_str() {
                "next" => add_months(now, 1).date(),
                "prev" | "previous" | "last" => add_months(now, -1).date(),
                _ => match lower.parse::<Month>() {
                    Ok(named) => first_day_of_month(now.year(), named.number_from_month()),
                    Err(_) => parse_date_expr(arg, now)
                        .with_context(|| format!("invalid month {arg:?}"))?
                        .date(),
                },
            };
            focus = Some(month);
        }

        let focus = focus.or(selected).unwrap_or_else(|| now.date());
        Ok(Self { focus, selected })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, hh: u32, mm: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(hh, mm, 0))
            .expect("valid datetime")
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn args(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn abbreviations_resolve_only_when_unique() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("cal", &known), Some("calendar"));
        assert_eq!(expand_command_abbrev("week", &known), Some("week"));
        assert_eq!(expand_command_abbrev("_", &known), None);
        assert_eq!(expand_command_abbrev("zzz", &known), None);
    }

    #[test]
    fn calendar_defaults_to_current_month() {
        let now = at(2024, 3, 10, 10, 0);
        let request = CalendarRequest::parse(&[], now).expect("parse");
        assert_eq!(request.focus, date(2024, 3, 10));
        assert_eq!(request.selected, None);
    }

    #[test]
    fn calendar_accepts_month_and_selection() {
        let now = at(2024, 3, 10, 10, 0);

        let request =
            CalendarRequest::parse(&args(&["2024-02", "select:2024-02-14"]), now).expect("parse");
        assert_eq!(request.focus, date(2024, 2, 1));
        assert_eq!(request.selected, Some(date(2024, 2, 14)));

        let request = CalendarRequest::parse(&args(&["select:tomorrow"]), now).expect("parse");
        assert_eq!(request.focus, date(2024, 3, 11));
        assert_eq!(request.selected, Some(date(2024, 3, 11)));
    }

    #[test]
    fn calendar_steps_months_with_clamping() {
        let now = at(2024, 1, 31, 10, 0);
        let next = CalendarRequest::parse(&args(&["next"]), now).expect("next");
        assert_eq!(next.focus, date(2024, 2, 29));
        let prev = CalendarRequest::parse(&args(&["prev"]), now).expect("prev");
        assert_eq!(prev.focus, date(2023, 12, 31));
    }

    #[test]
    fn month_names_stay_in_the_current_year() {
        let now = at(2024, 3, 10, 10, 0);
        let march = CalendarRequest::parse(&args(&["march"]), now).expect("march");
        assert_eq!(march.focus, date(2024, 3, 1));
        let january = CalendarRequest::parse(&args(&["Jan"]), now).expect("january");
        assert_eq!(january.focus, date(2024, 1, 1));
        let december = CalendarRequest::parse(&args(&["december"]), now).expect("december");
        assert_eq!(december.focus, date(2024, 12, 1));
    }

    #[test]
    fn selected_day_outside_focused_month_still_lists_meetings() {
        let raw = [
            r#"{"id":"may","title":"May","datetime":"2024-05-01T09:00:00","creator":{"id":"u1"}}"#,
            r#"{"id":"feb","title":"Feb","datetime":"2024-02-14T09:00:00","creator":{"id":"u1"}}"#,
            r#"{"id":"late","title":"L","datetime":"2024-05-01T23:30:00","creator":{"id":"u1"}}"#,
        ]
        .join("\n");
        let snapshot = Snapshot::parse(&raw, "test").expect("snapshot");
        let cfg = Config::default();
        let now = at(2024, 3, 10, 10, 0);
        let ctx = CommandContext {
            snapshot: &snapshot,
            cfg: &cfg,
            now,
            filter: ScheduleFilter::default(),
        };

        let request =
            CalendarRequest::parse(&args(&["2024-02", "select:2024-05-01"]), now).expect("parse");
        assert_eq!(request.focus, date(2024, 2, 1));
        let selected = request.selected.expect("selected");

        let ids: Vec<&str> = selected_day_meetings(&ctx, selected)
            .iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(ids, vec!["may", "late"]);
    }

    #[test]
    fn calendar_rejects_garbage() {
        let now = at(2024, 3, 10, 10, 0);
        assert!(CalendarRequest::parse(&args(&["someday"]), now).is_err());
        assert!(CalendarRequest::parse(&args(&["2024-02", "2024-03"]), now).is_err());
    }

    #[test]
    fn upcoming_window_prefers_argument_over_config() {
        let mut cfg = Config::default();
        assert_eq!(upcoming_window(&cfg, &[]).expect("default"), 7);

        cfg.apply_overrides(vec![("upcoming.days".to_string(), "3".to_string())]);
        assert_eq!(upcoming_window(&cfg, &[]).expect("config"), 3);
        assert_eq!(upcoming_window(&cfg, &args(&["14"])).expect("arg"), 14);
        assert!(upcoming_window(&cfg, &args(&["0"])).is_err());
        assert!(upcoming_window(&cfg, &args(&["soon"])).is_err());
    }
}
