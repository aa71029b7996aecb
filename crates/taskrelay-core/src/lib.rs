pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod grid;
pub mod meeting;
pub mod render;
pub mod schedule;
pub mod snapshot;

use std::ffi::OsString;

use anyhow::Context;
use chrono::{
  Local,
  NaiveDateTime
};
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use crate::grid::{
  CalendarDay,
  build_calendar_grid
};
pub use crate::meeting::Meeting;
pub use crate::schedule::{
  MeetingStatus,
  ScheduleFilter,
  classify_meeting_status,
  todays_meetings,
  upcoming_meetings
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting taskrelay CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.taskrelayrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let now = resolve_now(
    cli.now.as_deref()
  )?;
  let filter = schedule::ScheduleFilter {
    project_id: cli
      .project
      .or_else(|| cfg.project_filter())
  };

  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  let snapshot_path =
    config::resolve_snapshot_path(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve snapshot \
       location"
    )?;

  // Config-only commands work without a snapshot on disk.
  let snapshot = if needs_snapshot(
    &inv.command
  ) {
    snapshot::Snapshot::load(
      &snapshot_path
    )
    .with_context(|| {
      format!(
        "failed to load meetings from \
         {}",
        snapshot_path.display()
      )
    })?
  } else {
    snapshot::Snapshot::default()
  };

  let renderer =
    render::Renderer::new(&cfg)?;
  let ctx = commands::CommandContext {
    snapshot: &snapshot,
    cfg: &cfg,
    now,
    filter
  };

  commands::dispatch(
    &ctx,
    &renderer,
    inv
  )?;

  info!("done");
  Ok(())
}

fn resolve_now(
  override_expr: Option<&str>
) -> anyhow::Result<NaiveDateTime> {
  let wall = Local::now().naive_local();
  match override_expr {
    | Some(expr) => {
      datetime::parse_date_expr(
        expr, wall
      )
      .with_context(|| {
        format!(
          "invalid --now value {expr:?}"
        )
      })
    }
    | None => Ok(wall)
  }
}

fn needs_snapshot(
  command: &str
) -> bool {
  !matches!(
    command,
    "_commands"
      | "_show"
      | "help"
      | "version"
  )
}
