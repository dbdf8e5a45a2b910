//! Merge an owner's published availability with their calendar into the
//! schedule a particular viewer sees.
//!
//! The schedule is expanded to the owner's minimum meeting length, clipped to
//! the requested window and seeded as free. Each calendar event the owner has
//! accepted then marks its slots busy, marks them attending (when the viewer
//! booked that appointment), or annotates them with how many visitors have
//! already booked a shared appointment.

use chrono::NaiveDateTime;

use crate::block::{self, AvailableBlock};
use crate::durations::MeetingDurations;
use crate::error::{Result, ScheduleError};
use crate::event::{CalendarEvent, EventFormat, Identity};
use crate::recurrence;
use crate::schedule::AvailableSchedule;
use crate::visible::VisibleSchedule;

#[derive(Debug, Clone, Copy, Default)]
pub struct VisibleScheduleBuilder;

impl VisibleScheduleBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Compute the schedule `viewer` sees for `owner` over
    /// `[window_start, window_end]`.
    ///
    /// Passing no viewer gives the anonymous view: appointments never show as
    /// attending.
    ///
    /// # Errors
    /// - `ScheduleError::InvalidRange` if `window_end` precedes `window_start`.
    /// - `ScheduleError::InvalidInterval` if an accepted event has no duration.
    /// - `ScheduleError::InvalidRule` / `InvalidTimezone` if a recurring event
    ///   cannot be expanded.
    #[allow(clippy::too_many_arguments)]
    pub fn calculate_visible_schedule(
        &self,
        window_start: NaiveDateTime,
        window_end: NaiveDateTime,
        schedule: &AvailableSchedule,
        events: &[CalendarEvent],
        durations: &MeetingDurations,
        owner: &Identity,
        viewer: Option<&Identity>,
    ) -> Result<VisibleSchedule> {
        let mut visible = seed_free(window_start, window_end, schedule, durations)?;

        for event in events {
            if !event.will_cause_conflict(owner) {
                tracing::debug!(
                    start = %event.start,
                    end = %event.end,
                    "skipping event not accepted by owner"
                );
                continue;
            }
            for event_block in event_blocks(event, window_start, window_end)? {
                apply_event(&mut visible, event, event_block, owner, viewer)?;
            }
        }

        tracing::debug!(
            slots = visible.len(),
            free = visible.free_count(),
            busy = visible.busy_count(),
            attending = visible.attending_count(),
            "calculated visible schedule"
        );
        Ok(visible)
    }

    /// Classify `schedule` against `visitor`'s own calendar.
    ///
    /// Answers whether a visitor's calendar conflicts with a published
    /// availability template. Events are judged from the visitor's side: the
    /// visitor stands in the owner role and nothing is ever marked attending.
    pub fn calculate_visitor_conflicts(
        &self,
        window_start: NaiveDateTime,
        window_end: NaiveDateTime,
        schedule: &AvailableSchedule,
        events: &[CalendarEvent],
        durations: &MeetingDurations,
        visitor: &Identity,
    ) -> Result<VisibleSchedule> {
        let mut visible = seed_free(window_start, window_end, schedule, durations)?;

        for event in events {
            if !event.will_cause_conflict(visitor) {
                continue;
            }
            for event_block in event_blocks(event, window_start, window_end)? {
                apply_event(&mut visible, event, event_block, visitor, None)?;
            }
        }
        Ok(visible)
    }
}

/// Expand `schedule` to the minimum meeting length and seed every block that
/// starts within the window as free.
fn seed_free(
    window_start: NaiveDateTime,
    window_end: NaiveDateTime,
    schedule: &AvailableSchedule,
    durations: &MeetingDurations,
) -> Result<VisibleSchedule> {
    if window_end < window_start {
        return Err(ScheduleError::InvalidRange(format!(
            "window end ({}) precedes window start ({})",
            window_end, window_start
        )));
    }

    let expanded = block::expand_set(schedule.blocks().iter(), durations.min_length());
    let lower = block::create_preferred_minimum_duration_block(window_start, durations)?;
    let upper = block::create_preferred_minimum_duration_block(window_end, durations)?;

    let mut visible = VisibleSchedule::new(*durations);
    for free in expanded.range(lower.key(), upper.key()) {
        visible.add_free_block(&free);
    }
    Ok(visible)
}

/// The blocks an event occupies within the window: one per occurrence for a
/// recurring event, otherwise the event's own span.
fn event_blocks(
    event: &CalendarEvent,
    window_start: NaiveDateTime,
    window_end: NaiveDateTime,
) -> Result<Vec<AvailableBlock>> {
    match &event.recurrence {
        Some(recurrence) => recurrence::expand_occurrences(
            recurrence,
            event.start,
            event.end - event.start,
            window_start,
            window_end,
        )?
        .into_iter()
        .map(|occurrence| AvailableBlock::new(occurrence.start, occurrence.end))
        .collect(),
        None => Ok(vec![AvailableBlock::new(event.start, event.end)?]),
    }
}

fn apply_event(
    visible: &mut VisibleSchedule,
    event: &CalendarEvent,
    event_block: AvailableBlock,
    owner: &Identity,
    viewer: Option<&Identity>,
) -> Result<()> {
    if !event.scheduling_assistant {
        visible.set_busy_block(&event_block);
        return Ok(());
    }

    if let Some(viewer) = viewer {
        if event.is_attending_match(owner, viewer) {
            let attending = match event.format {
                EventFormat::Legacy => event_block,
                EventFormat::Current(limit) => block::create_block(
                    event_block.start(),
                    event_block.end(),
                    limit.max(1),
                    None,
                )?
                .with_visitors_attending(event.visitor_count()),
            };
            visible.set_attending_block(&attending);
            return Ok(());
        }
    }

    if !event.is_attending_as_owner(owner) {
        visible.set_busy_block(&event_block);
        return Ok(());
    }

    match event.format {
        EventFormat::Legacy => visible.set_busy_block(&event_block),
        EventFormat::Current(limit) => {
            let attending_count = event.visitor_count();
            if attending_count >= limit {
                visible.set_busy_block(&event_block);
            } else {
                let shared = block::create_block(
                    event_block.start(),
                    event_block.end(),
                    limit,
                    None,
                )?
                .with_visitors_attending(attending_count);
                if !visible.overwrite_free_block_only_if_present(&shared) {
                    tracing::debug!(
                        start = %shared.start(),
                        end = %shared.end(),
                        "shared appointment outside visible slots"
                    );
                }
            }
        }
    }
    Ok(())
}
