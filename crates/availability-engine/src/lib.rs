//! # availability-engine
//!
//! Interval algebra and visibility merging for a scheduling assistant.
//!
//! An owner publishes blocks of availability. A visitor looking at that owner
//! sees those blocks split into bookable slots and classified as free, busy,
//! or attending, after the owner's calendar has been laid over them.
//!
//! ## Modules
//!
//! - [`block`] - block construction, `expand` and `combine`
//! - [`durations`] - owner meeting-length preferences
//! - [`schedule`] - an owner's canonical set of published blocks
//! - [`event`] - calendar events, attendees and appointment roles
//! - [`recurrence`] - RRULE expansion of recurring events
//! - [`conflict`] - locate slots overlapping a candidate block
//! - [`visible`] - the classified schedule a viewer sees
//! - [`builder`] - merge schedule and calendar into a visible schedule
//! - [`store`] - owner-scoped schedule persistence
//! - [`error`] - Error types

pub mod block;
pub mod builder;
pub mod conflict;
pub mod durations;
pub mod error;
pub mod event;
pub mod recurrence;
pub mod schedule;
pub mod store;
pub mod visible;

pub use block::{
    combine, create_block, create_blocks, expand, expand_set, AvailableBlock, BlockDetails,
    BlockKey, BlockSet,
};
pub use builder::VisibleScheduleBuilder;
pub use conflict::locate_conflicting;
pub use durations::MeetingDurations;
pub use error::{Result, ScheduleError};
pub use event::{AppointmentRole, Attendee, CalendarEvent, EventFormat, Identity, PartStat};
pub use recurrence::{expand_occurrences, Occurrence, Recurrence};
pub use schedule::AvailableSchedule;
pub use store::{InMemoryScheduleStore, ScheduleStore};
pub use visible::{SlotStatus, SlotView, VisibleSchedule, VisibleSlot};
