//! WASM bindings for slot-engine.
//!
//! Exposes the availability predicate, reason lookup, week grid, slot
//! selection and reschedule planning to the booking calendar UI via
//! `wasm-bindgen`. Schedules, bookings and results cross the boundary as JSON
//! strings in the same shapes `slot-engine` serializes.
//!
//! ## Build process
//!
//! ```sh
//! cargo build -p slot-engine-wasm --target wasm32-unknown-unknown --release
//! wasm-bindgen --target web --out-dir packages/slot-engine-js/wasm/ \
//!   target/wasm32-unknown-unknown/release/slot_engine_wasm.wasm
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use slot_engine::availability::{self, StylistSchedule};
use slot_engine::booking::Booking;
use slot_engine::policy::BookingPolicy;
use slot_engine::reschedule::{RescheduleRequest, Rescheduler};
use slot_engine::slots::{self, BeforeDate, SlotConstraint};
use wasm_bindgen::prelude::*;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ReasonDto {
    unavailable: bool,
    label: Option<String>,
}

/// Rejection payload for the confirmation dialog.
#[derive(Serialize)]
struct RejectionDto {
    kind: String,
    message: String,
}

#[derive(Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum RescheduleDto {
    Planned {
        plan: slot_engine::ReschedulePlan,
    },
    Rejected {
        #[serde(flatten)]
        rejection: RejectionDto,
    },
}

#[derive(Deserialize)]
struct RescheduleInput {
    booking: Booking,
    request: RescheduleRequest,
    #[serde(default)]
    schedule: Option<StylistSchedule>,
    #[serde(default)]
    policy: Option<BookingPolicy>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn parse_schedule(json: &str) -> Result<StylistSchedule, JsValue> {
    serde_json::from_str(json)
        .map_err(|e| JsValue::from_str(&format!("Invalid schedule JSON: {}", e)))
}

fn parse_date(s: &str) -> Result<NaiveDate, JsValue> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| JsValue::from_str(&format!("Invalid date '{}': {}", s, e)))
}

fn check_hour(hour: u32) -> Result<u32, JsValue> {
    if hour >= 24 {
        return Err(JsValue::from_str(&format!(
            "Invalid hour {}: expected 0-23",
            hour
        )));
    }
    Ok(hour)
}

fn parse_policy(json: Option<String>) -> Result<BookingPolicy, JsValue> {
    match json {
        Some(json) => BookingPolicy::from_json_str(&json)
            .map_err(|e| JsValue::from_str(&format!("Invalid policy JSON: {}", e))),
        None => Ok(BookingPolicy::default()),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

// ---------------------------------------------------------------------------
// WASM exports
// ---------------------------------------------------------------------------

/// Whether an absence overlaps the one-hour slot at `date` (`YYYY-MM-DD`) and `hour`.
#[wasm_bindgen(js_name = "isUnavailable")]
pub fn is_unavailable(schedule_json: &str, date: &str, hour: u32) -> Result<bool, JsValue> {
    let schedule = parse_schedule(schedule_json)?;
    Ok(availability::is_unavailable(&schedule, parse_date(date)?, check_hour(hour)?))
}

/// Tooltip text for a slot: `{unavailable, label}`.
#[wasm_bindgen(js_name = "unavailableReason")]
pub fn unavailable_reason(schedule_json: &str, date: &str, hour: u32) -> Result<String, JsValue> {
    let schedule = parse_schedule(schedule_json)?;
    let (date, hour) = (parse_date(date)?, check_hour(hour)?);
    let reason = availability::unavailable_reason(&schedule, date, hour);
    to_json(&ReasonDto {
        unavailable: reason.is_some(),
        label: reason.map(|r| r.to_string()),
    })
}

/// Availability grid for `days` days starting at `first_day`.
#[wasm_bindgen(js_name = "weekGrid")]
pub fn week_grid(
    schedule_json: &str,
    first_day: &str,
    days: u32,
    policy_json: Option<String>,
) -> Result<String, JsValue> {
    let schedule = parse_schedule(schedule_json)?;
    let policy = parse_policy(policy_json)?;
    let grid = availability::week_grid(&schedule, parse_date(first_day)?, days, &policy);
    to_json(&grid)
}

/// Whether a service of `duration_minutes` can start at `(date, hour)`.
///
/// `before_date`, when given, forbids any hour on or after that date (trial
/// sessions must precede their main booking's day).
#[wasm_bindgen(js_name = "canSelect")]
pub fn can_select(
    schedule_json: &str,
    date: &str,
    hour: u32,
    duration_minutes: u32,
    before_date: Option<String>,
) -> Result<bool, JsValue> {
    let schedule = parse_schedule(schedule_json)?;
    let before = before_date.as_deref().map(parse_date).transpose()?.map(BeforeDate);
    let constraint = before.as_ref().map(|c| c as &dyn SlotConstraint);
    Ok(slots::can_select(
        &schedule,
        parse_date(date)?,
        check_hour(hour)?,
        slots::required_hours(duration_minutes),
        constraint,
    ))
}

/// Select a slot as `{start, end}`, or `null` when it is not selectable.
#[wasm_bindgen(js_name = "selectSlot")]
pub fn select_slot(
    schedule_json: &str,
    date: &str,
    hour: u32,
    duration_minutes: u32,
    before_date: Option<String>,
) -> Result<String, JsValue> {
    let schedule = parse_schedule(schedule_json)?;
    let before = before_date.as_deref().map(parse_date).transpose()?.map(BeforeDate);
    let constraint = before.as_ref().map(|c| c as &dyn SlotConstraint);
    let selected = slots::select_slot(
        &schedule,
        parse_date(date)?,
        check_hour(hour)?,
        slots::required_hours(duration_minutes),
        constraint,
    );
    to_json(&selected)
}

/// Plan a reschedule.
///
/// Input: `{booking, request, schedule?, policy?}`. With a schedule the new
/// window(s) must also be selectable. Returns
/// `{"outcome":"planned","plan":{...}}` or
/// `{"outcome":"rejected","kind":"...","message":"..."}`. Only malformed
/// input throws.
#[wasm_bindgen(js_name = "planReschedule")]
pub fn plan_reschedule(input_json: &str) -> Result<String, JsValue> {
    let input: RescheduleInput = serde_json::from_str(input_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid reschedule JSON: {}", e)))?;
    let rescheduler = Rescheduler::new(input.policy.unwrap_or_default());

    let result = match &input.schedule {
        Some(schedule) => rescheduler.plan_within(&input.booking, &input.request, schedule),
        None => rescheduler.plan(&input.booking, &input.request),
    };

    let dto = match result {
        Ok(plan) => RescheduleDto::Planned { plan },
        Err(e) => RescheduleDto::Rejected {
            rejection: RejectionDto {
                kind: format!("{:?}", e.kind()),
                message: e.to_string(),
            },
        },
    };
    to_json(&dto)
}
