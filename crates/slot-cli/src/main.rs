//! `slots` CLI: inspect a stylist's availability and plan reschedules from
//! a JSON store file.
//!
//! ## Usage
//!
//! ```sh
//! # Week grid starting Monday 2024-01-08
//! slots grid -i store.json --stylist stylist-1 --from 2024-01-08
//!
//! # Status of a single slot, and whether a 90-minute service fits there
//! slots check -i store.json --stylist stylist-1 --date 2024-01-09 --hour 10 --duration 90
//!
//! # Select a slot (fails when it is not selectable)
//! slots select -i store.json --stylist stylist-1 --date 2024-01-09 --hour 10 --duration 120
//!
//! # Move a main booking and its trial session, saving the updated store
//! slots reschedule -i store.json --booking main-1 --actor stylist-1 \
//!   --start 2024-01-15T10:00:00 --end 2024-01-15T12:00:00 --move-linked \
//!   --save store.json
//! ```
//!
//! Diagnostics go to stderr; set `RUST_LOG=slot_engine=debug` for detail.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use serde::Serialize;
use slot_engine::availability::{self, SlotStatus, StylistSchedule};
use slot_engine::policy::BookingPolicy;
use slot_engine::reschedule::{RescheduleRequest, Rescheduler};
use slot_engine::slots::{self, BeforeDate, SelectedSlot, SlotConstraint};
use slot_engine::store::{load_schedule, reschedule_booking, InMemoryStore, ScheduleSource};
use std::io::{self, Read};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "slots",
    version,
    about = "Stylist availability and booking reschedule CLI"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Booking policy JSON file (defaults apply when omitted)
    #[arg(long, global = true)]
    policy: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the availability grid for a run of days
    Grid {
        /// Store JSON file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        #[arg(long)]
        stylist: String,
        /// First day of the grid (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
    /// Show the status of one hour slot
    Check {
        /// Store JSON file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        #[arg(long)]
        stylist: String,
        /// Slot date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..24))]
        hour: u32,
        /// Service duration in minutes; reports whether it fits from this hour
        #[arg(long)]
        duration: Option<u32>,
    },
    /// Select the slot for a service starting at the given hour
    Select {
        /// Store JSON file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        #[arg(long)]
        stylist: String,
        /// Slot date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..24))]
        hour: u32,
        /// Service duration in minutes
        #[arg(long, default_value_t = 60)]
        duration: u32,
        /// Reject any hour on or after this date (YYYY-MM-DD)
        #[arg(long)]
        before: Option<NaiveDate>,
    },
    /// Plan and commit a booking reschedule
    Reschedule {
        /// Store JSON file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        #[arg(long)]
        booking: String,
        /// User requesting the move; must be the booking's stylist
        #[arg(long)]
        actor: String,
        /// New start (YYYY-MM-DDTHH:MM:SS)
        #[arg(long)]
        start: NaiveDateTime,
        /// New end (YYYY-MM-DDTHH:MM:SS)
        #[arg(long)]
        end: NaiveDateTime,
        /// Move the linked trial session along with a main booking
        #[arg(long)]
        move_linked: bool,
        #[arg(long)]
        reason: Option<String>,
        /// Reference time for future checks (defaults to the local clock)
        #[arg(long)]
        now: Option<NaiveDateTime>,
        /// Record the vacated window(s) as absences with this reason
        #[arg(long)]
        block_vacated: Option<String>,
        /// Write the updated store to this file
        #[arg(long)]
        save: Option<String>,
    },
}

#[derive(Serialize)]
struct SlotReport {
    date: NaiveDate,
    hour: u32,
    #[serde(flatten)]
    status: SlotStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selectable: Option<bool>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let policy = load_policy(cli.policy.as_deref())?;

    match cli.command {
        Commands::Grid {
            input,
            output,
            stylist,
            from,
            days,
        } => {
            let schedule = load_stylist_schedule(input.as_deref(), &stylist)?;
            let grid = availability::week_grid(&schedule, from, days, &policy);
            let json = serde_json::to_string_pretty(&grid)?;
            write_output(output.as_deref(), &json)?;
        }
        Commands::Check {
            input,
            stylist,
            date,
            hour,
            duration,
        } => {
            let schedule = load_stylist_schedule(input.as_deref(), &stylist)?;
            let status = availability::slot_status(&schedule, date, hour);
            let label = match &status {
                SlotStatus::Unavailable { reason } => Some(reason.to_string()),
                _ => None,
            };
            let selectable = duration.map(|minutes| {
                slots::can_select(&schedule, date, hour, slots::required_hours(minutes), None)
            });
            let report = SlotReport {
                date,
                hour,
                status,
                label,
                selectable,
            };
            write_output(None, &serde_json::to_string_pretty(&report)?)?;
        }
        Commands::Select {
            input,
            stylist,
            date,
            hour,
            duration,
            before,
        } => {
            let schedule = load_stylist_schedule(input.as_deref(), &stylist)?;
            let slot = select(&schedule, date, hour, duration, before)?;
            write_output(None, &serde_json::to_string_pretty(&slot)?)?;
        }
        Commands::Reschedule {
            input,
            booking,
            actor,
            start,
            end,
            move_linked,
            reason,
            now,
            block_vacated,
            save,
        } => {
            let mut store = load_store(input.as_deref())?;
            let request = RescheduleRequest {
                actor_id: actor,
                new_start: start,
                new_end: end,
                move_linked,
                reason,
                now: now.unwrap_or_else(|| chrono::Local::now().naive_local()),
            };
            let plan = reschedule_booking(
                &mut store,
                &Rescheduler::new(policy),
                &booking,
                &request,
                block_vacated.as_deref(),
            )
            .with_context(|| format!("Failed to reschedule booking {}", booking))?;

            write_output(None, &serde_json::to_string_pretty(&plan)?)?;
            if let Some(path) = save {
                let json = serde_json::to_string_pretty(&store)?;
                write_output(Some(&path), &json)?;
            }
        }
    }

    Ok(())
}

fn select(
    schedule: &StylistSchedule,
    date: NaiveDate,
    hour: u32,
    duration: u32,
    before: Option<NaiveDate>,
) -> Result<SelectedSlot> {
    let before = before.map(BeforeDate);
    let constraint = before.as_ref().map(|c| c as &dyn SlotConstraint);
    let hours = slots::required_hours(duration);
    slots::select_slot(schedule, date, hour, hours, constraint).with_context(|| {
        format!(
            "Slot {} {:02}:00 is not selectable for {}h",
            date, hour, hours
        )
    })
}

fn load_policy(path: Option<&str>) -> Result<BookingPolicy> {
    match path {
        Some(path) => {
            let json = read_input(Some(path))?;
            BookingPolicy::from_json_str(&json)
                .with_context(|| format!("Invalid policy file: {}", path))
        }
        None => Ok(BookingPolicy::default()),
    }
}

fn load_store(path: Option<&str>) -> Result<InMemoryStore> {
    let json = read_input(path)?;
    InMemoryStore::from_json_str(&json).context("Failed to parse store JSON")
}

fn load_stylist_schedule(path: Option<&str>, stylist: &str) -> Result<StylistSchedule> {
    let store = load_store(path)?;
    if store.fetch_weekly_rule(stylist)?.is_none() {
        tracing::warn!(stylist, "stylist has no weekly work rule; every slot is outside hours");
    }
    load_schedule(&store, stylist)
        .with_context(|| format!("Failed to load schedule for {}", stylist))
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
            println!("{}", content);
        }
    }
    Ok(())
}
