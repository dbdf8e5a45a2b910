//! `avail` CLI - build availability blocks and compute visible schedules.
//!
//! ## Usage
//!
//! ```sh
//! # Mondays, Wednesdays and Fridays 9:00-11:30 through June 2008
//! avail blocks --start-time "9:00 AM" --end-time "11:30 AM" --days MWF \
//!     --from 2008-06-01 --to 2008-06-30
//!
//! # Split blocks into 30-minute slots, then merge them back
//! avail expand --minutes 30 -i blocks.json | avail combine
//!
//! # What a visitor sees for an owner, given schedule + calendar
//! avail visible --config prefs.toml --viewer-name "Some Visitor" \
//!     --viewer-email visitor@example.edu -i request.json
//!
//! # Conflicts between a visitor's own calendar and a schedule
//! avail conflicts --name "Some Visitor" --email visitor@example.edu -i request.json
//! ```

mod config;

use std::io::{self, Read};

use anyhow::{Context, Result};
use availability_engine::block::{self, BlockSet};
use availability_engine::{
    AvailableBlock, AvailableSchedule, CalendarEvent, Identity, SlotView, VisibleSchedule,
    VisibleScheduleBuilder,
};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::Preferences;

#[derive(Parser)]
#[command(
    name = "avail",
    version,
    about = "Published availability and visible schedule calculator"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log filter used when RUST_LOG is unset (e.g. "debug", "availability_engine=trace")
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Args)]
struct Io {
    /// Input file (reads from stdin if omitted)
    #[arg(short, long)]
    input: Option<String>,
    /// Output file (writes to stdout if omitted)
    #[arg(short, long)]
    output: Option<String>,
}

#[derive(Args)]
struct OwnerArgs {
    /// Preferences file (TOML) with identity, durations and timezone
    #[arg(long)]
    config: Option<String>,
    /// Display name of the calendar account
    #[arg(long)]
    name: Option<String>,
    /// Email address of the calendar account
    #[arg(long)]
    email: Option<String>,
    /// Meeting durations key, e.g. "30" or "30,60"
    #[arg(long)]
    durations: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build one block per matching weekday in a date range
    Blocks {
        /// Start time of day, e.g. "9:00 AM"
        #[arg(long)]
        start_time: String,
        /// End time of day, e.g. "11:30 AM"
        #[arg(long)]
        end_time: String,
        /// Weekday codes N M T W R F S (Sunday..Saturday), e.g. "MWF"
        #[arg(long)]
        days: String,
        /// First date, YYYY-MM-DD
        #[arg(long)]
        from: NaiveDate,
        /// Last date (inclusive), YYYY-MM-DD
        #[arg(long)]
        to: NaiveDate,
        /// Visitors allowed per appointment
        #[arg(long, default_value_t = 1)]
        capacity: u32,
        /// Meeting location for every block
        #[arg(long)]
        location: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Split a JSON list of blocks into fixed-length slots
    Expand {
        /// Slot length in minutes
        #[arg(long)]
        minutes: u32,
        #[command(flatten)]
        files: Io,
    },
    /// Merge adjacent blocks that share capacity and location
    Combine {
        #[command(flatten)]
        files: Io,
    },
    /// Compute the schedule a viewer sees for an owner
    Visible {
        #[command(flatten)]
        owner: OwnerArgs,
        /// Display name of the viewing visitor
        #[arg(long, requires = "viewer_email")]
        viewer_name: Option<String>,
        /// Email address of the viewing visitor
        #[arg(long, requires = "viewer_name")]
        viewer_email: Option<String>,
        #[command(flatten)]
        files: Io,
    },
    /// Classify a schedule against a visitor's own calendar
    Conflicts {
        #[command(flatten)]
        visitor: OwnerArgs,
        #[command(flatten)]
        files: Io,
    },
}

/// Input document for `visible` and `conflicts`.
#[derive(Deserialize)]
struct VisibilityRequest {
    window_start: NaiveDateTime,
    window_end: NaiveDateTime,
    #[serde(default)]
    schedule: Vec<AvailableBlock>,
    #[serde(default)]
    events: Vec<serde_json::Value>,
}

#[derive(Serialize)]
struct VisibilityReport {
    free: usize,
    busy: usize,
    attending: usize,
    slots: Vec<SlotView>,
}

impl From<&VisibleSchedule> for VisibilityReport {
    fn from(visible: &VisibleSchedule) -> Self {
        Self {
            free: visible.free_count(),
            busy: visible.busy_count(),
            attending: visible.attending_count(),
            slots: visible.to_views(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Blocks {
            start_time,
            end_time,
            days,
            from,
            to,
            capacity,
            location,
            output,
        } => {
            let blocks = block::create_blocks(
                &start_time,
                &end_time,
                &days,
                from,
                to,
                capacity,
                location.as_deref(),
            )
            .context("Failed to create blocks")?;
            write_blocks(output.as_deref(), &block::combine(&blocks))?;
        }
        Commands::Expand { minutes, files } => {
            anyhow::ensure!(minutes > 0, "--minutes must be at least 1");
            let blocks = read_blocks(files.input.as_deref())?;
            write_blocks(files.output.as_deref(), &block::expand_set(blocks.iter(), minutes))?;
        }
        Commands::Combine { files } => {
            let blocks = read_blocks(files.input.as_deref())?;
            write_blocks(files.output.as_deref(), &block::combine(&blocks))?;
        }
        Commands::Visible {
            owner,
            viewer_name,
            viewer_email,
            files,
        } => {
            let prefs = Preferences::load(owner.config.as_deref())?;
            let identity = prefs.resolve_identity(owner.name.as_deref(), owner.email.as_deref())?;
            let durations = prefs.resolve_durations(owner.durations.as_deref())?;
            let viewer = match (viewer_name, viewer_email) {
                (Some(name), Some(email)) => Some(Identity::new(name, email)),
                _ => None,
            };

            let request = read_request(files.input.as_deref())?;
            let events = decode_events(request.events, prefs.timezone.as_deref())?;
            let schedule = AvailableSchedule::new(request.schedule);
            let visible = VisibleScheduleBuilder::new()
                .calculate_visible_schedule(
                    request.window_start,
                    request.window_end,
                    &schedule,
                    &events,
                    &durations,
                    &identity,
                    viewer.as_ref(),
                )
                .context("Failed to calculate visible schedule")?;
            write_json(files.output.as_deref(), &VisibilityReport::from(&visible))?;
        }
        Commands::Conflicts { visitor, files } => {
            let prefs = Preferences::load(visitor.config.as_deref())?;
            let identity =
                prefs.resolve_identity(visitor.name.as_deref(), visitor.email.as_deref())?;
            let durations = prefs.resolve_durations(visitor.durations.as_deref())?;

            let request = read_request(files.input.as_deref())?;
            let events = decode_events(request.events, prefs.timezone.as_deref())?;
            let schedule = AvailableSchedule::new(request.schedule);
            let visible = VisibleScheduleBuilder::new()
                .calculate_visitor_conflicts(
                    request.window_start,
                    request.window_end,
                    &schedule,
                    &events,
                    &durations,
                    &identity,
                )
                .context("Failed to calculate visitor conflicts")?;
            write_json(files.output.as_deref(), &VisibilityReport::from(&visible))?;
        }
    }

    Ok(())
}

/// Decode calendar events, filling in `timezone` on recurrences that lack one.
fn decode_events(
    raw: Vec<serde_json::Value>,
    timezone: Option<&str>,
) -> Result<Vec<CalendarEvent>> {
    raw.into_iter()
        .enumerate()
        .map(|(index, mut value)| {
            if let (Some(tz), Some(recurrence)) = (timezone, value.get_mut("recurrence")) {
                if let Some(fields) = recurrence.as_object_mut() {
                    fields
                        .entry("timezone")
                        .or_insert_with(|| serde_json::Value::String(tz.to_string()));
                }
            }
            serde_json::from_value(value)
                .with_context(|| format!("Invalid calendar event at index {}", index))
        })
        .collect()
}

fn read_request(path: Option<&str>) -> Result<VisibilityRequest> {
    let json = read_input(path)?;
    serde_json::from_str(&json).context("Failed to parse request JSON")
}

fn read_blocks(path: Option<&str>) -> Result<BlockSet> {
    let json = read_input(path)?;
    let blocks: Vec<AvailableBlock> =
        serde_json::from_str(&json).context("Failed to parse blocks JSON")?;
    Ok(blocks.into_iter().collect())
}

fn write_blocks(path: Option<&str>, blocks: &BlockSet) -> Result<()> {
    let blocks: Vec<AvailableBlock> = blocks.iter().collect();
    write_json(path, &blocks)
}

fn write_json<T: Serialize>(path: Option<&str>, value: &T) -> Result<()> {
    let mut pretty = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    pretty.push('\n');
    write_output(path, &pretty)
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&str>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}
