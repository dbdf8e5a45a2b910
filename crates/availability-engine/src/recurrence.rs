//! Recurring calendar events -- expands an event's RRULE into concrete
//! occurrences inside a visibility window.
//!
//! Wraps the `rrule` crate (v0.13) and `chrono-tz`. Occurrences are produced in
//! the event's IANA zone and handed back as wall-clock times in that zone,
//! which is the time model the rest of the engine works in.

use chrono::{Duration, NaiveDateTime};
use rrule::RRuleSet;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScheduleError};

/// Upper bound on instances produced for one event.
pub const MAX_OCCURRENCES: u16 = 500;

/// The recurrence part of a calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    /// RFC 5545 RRULE body, e.g. `"FREQ=WEEKLY;BYDAY=MO,WE"`.
    pub rule: String,
    /// IANA timezone of the event's wall-clock times, e.g. `"America/Chicago"`.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Recurrence {
    pub fn new(rule: impl Into<String>, timezone: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            timezone: timezone.into(),
        }
    }
}

/// A single occurrence of a recurring event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Expand `recurrence`, anchored at `dtstart` and lasting `duration` per
/// instance, into the occurrences that overlap `[window_start, window_end]`.
///
/// # Errors
/// Returns `ScheduleError::InvalidRule` if the RRULE is empty or unparseable,
/// and `ScheduleError::InvalidTimezone` if the timezone is unknown.
pub fn expand_occurrences(
    recurrence: &Recurrence,
    dtstart: NaiveDateTime,
    duration: Duration,
    window_start: NaiveDateTime,
    window_end: NaiveDateTime,
) -> Result<Vec<Occurrence>> {
    if recurrence.rule.trim().is_empty() {
        return Err(ScheduleError::InvalidRule("empty RRULE string".to_string()));
    }

    let tz: chrono_tz::Tz = recurrence
        .timezone
        .parse()
        .map_err(|_| ScheduleError::InvalidTimezone(recurrence.timezone.clone()))?;

    let dtstart_ical = dtstart.format("%Y%m%dT%H%M%S");
    let rrule_text = format!(
        "DTSTART;TZID={}:{}\nRRULE:{}",
        recurrence.timezone, dtstart_ical, recurrence.rule
    );

    let rrule_set: RRuleSet = rrule_text
        .parse()
        .map_err(|e| ScheduleError::InvalidRule(format!("{}", e)))?;

    let instances = rrule_set.all(MAX_OCCURRENCES);
    if instances.limited {
        tracing::debug!(
            rule = %recurrence.rule,
            limit = MAX_OCCURRENCES,
            "recurrence expansion hit the instance limit"
        );
    }

    let occurrences = instances
        .dates
        .into_iter()
        .map(|dt| {
            let start = dt.with_timezone(&tz).naive_local();
            Occurrence {
                start,
                end: start + duration,
            }
        })
        .filter(|o| o.start < window_end && o.end > window_start)
        .collect();

    Ok(occurrences)
}
