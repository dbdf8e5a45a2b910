//! Calendar events as seen by the visibility engine.
//!
//! Events arrive already decoded from whatever calendar backend produced them.
//! Appointment roles and the legacy-format marker are decided once, at that
//! boundary, so the engine matches on closed enums instead of re-reading
//! extension properties.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::recurrence::Recurrence;

/// A calendar account's identity. Two identities match only when both the
/// display name and the email address are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub display_name: String,
    pub email: String,
}

impl Identity {
    pub fn new(display_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            email: email.into(),
        }
    }
}

/// Role of an attendee on a scheduling-assistant appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentRole {
    Owner,
    Visitor,
    /// Owner and visitor are the same person; emitted as a single attendee.
    Both,
    /// No role tag: an appointment created before roles were recorded.
    #[default]
    Unspecified,
}

/// Participation status of an attendee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartStat {
    Accepted,
    Declined,
    Tentative,
    #[default]
    NeedsAction,
    Delegated,
}

/// Whether an appointment carries a visitor-limit property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventFormat {
    /// Capacity-aware appointment with its visitor limit.
    Current(u32),
    /// Predates the visitor-limit property; consumes the whole slot.
    Legacy,
}

impl EventFormat {
    pub fn visitor_limit(&self) -> Option<u32> {
        match self {
            EventFormat::Current(limit) => Some(*limit),
            EventFormat::Legacy => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    pub identity: Identity,
    #[serde(default)]
    pub role: AppointmentRole,
    #[serde(default)]
    pub part_stat: PartStat,
}

impl Attendee {
    pub fn new(identity: Identity, role: AppointmentRole, part_stat: PartStat) -> Self {
        Self {
            identity,
            role,
            part_stat,
        }
    }

    pub fn matches(&self, identity: &Identity) -> bool {
        self.identity == *identity
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawEvent", into = "RawEvent")]
pub struct CalendarEvent {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub attendees: Vec<Attendee>,
    /// True for appointments created by the scheduling assistant.
    pub scheduling_assistant: bool,
    pub format: EventFormat,
    pub recurrence: Option<Recurrence>,
}

/// Wire shape of an event: the format is implied by whether a visitor limit
/// is present at all.
#[derive(Serialize, Deserialize)]
struct RawEvent {
    start: NaiveDateTime,
    end: NaiveDateTime,
    #[serde(default)]
    attendees: Vec<Attendee>,
    #[serde(default)]
    scheduling_assistant: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    visitor_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    recurrence: Option<Recurrence>,
}

impl From<RawEvent> for CalendarEvent {
    fn from(raw: RawEvent) -> Self {
        let format = match raw.visitor_limit {
            Some(limit) => EventFormat::Current(limit),
            None => EventFormat::Legacy,
        };
        Self {
            start: raw.start,
            end: raw.end,
            attendees: raw.attendees,
            scheduling_assistant: raw.scheduling_assistant,
            format,
            recurrence: raw.recurrence,
        }
    }
}

impl From<CalendarEvent> for RawEvent {
    fn from(event: CalendarEvent) -> Self {
        Self {
            start: event.start,
            end: event.end,
            attendees: event.attendees,
            scheduling_assistant: event.scheduling_assistant,
            visitor_limit: event.format.visitor_limit(),
            recurrence: event.recurrence,
        }
    }
}

impl CalendarEvent {
    /// An ordinary (non-appointment) event.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, attendees: Vec<Attendee>) -> Self {
        Self {
            start,
            end,
            attendees,
            scheduling_assistant: false,
            format: EventFormat::Legacy,
            recurrence: None,
        }
    }

    /// A scheduling-assistant appointment.
    pub fn appointment(
        start: NaiveDateTime,
        end: NaiveDateTime,
        attendees: Vec<Attendee>,
        format: EventFormat,
    ) -> Self {
        Self {
            start,
            end,
            attendees,
            scheduling_assistant: true,
            format,
            recurrence: None,
        }
    }

    pub fn with_recurrence(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = Some(recurrence);
        self
    }

    pub fn attendee_for(&self, identity: &Identity) -> Option<&Attendee> {
        self.attendees.iter().find(|a| a.matches(identity))
    }

    /// The event only affects `account`'s availability when `account` is an
    /// attendee who has accepted it.
    pub fn will_cause_conflict(&self, account: &Identity) -> bool {
        self.attendee_for(account)
            .map(|a| a.part_stat == PartStat::Accepted)
            .unwrap_or(false)
    }

    /// Number of attendees carrying the `Visitor` role.
    pub fn visitor_count(&self) -> u32 {
        self.attendees
            .iter()
            .filter(|a| a.role == AppointmentRole::Visitor)
            .count() as u32
    }

    pub fn is_attending_as_owner(&self, owner: &Identity) -> bool {
        self.scheduling_assistant
            && self
                .attendees
                .iter()
                .any(|a| a.role == AppointmentRole::Owner && a.matches(owner))
    }

    pub fn is_attending_as_visitor(&self, visitor: &Identity) -> bool {
        self.scheduling_assistant
            && self
                .attendees
                .iter()
                .any(|a| a.role == AppointmentRole::Visitor && a.matches(visitor))
    }

    /// True when `visitor` has booked this appointment with `owner`.
    ///
    /// A `Both` attendee matches when owner and visitor are the same person.
    /// Attendees without a role are matched on identity alone.
    pub fn is_attending_match(&self, owner: &Identity, visitor: &Identity) -> bool {
        if !self.scheduling_assistant {
            return false;
        }
        let same_person = owner == visitor;
        let mut visitor_is_visitor = false;
        let mut owner_is_owner = false;
        for attendee in &self.attendees {
            match attendee.role {
                AppointmentRole::Both => {
                    if same_person && attendee.matches(visitor) {
                        return true;
                    }
                }
                AppointmentRole::Visitor => {
                    visitor_is_visitor |= attendee.matches(visitor);
                }
                AppointmentRole::Owner => {
                    owner_is_owner |= attendee.matches(owner);
                }
                AppointmentRole::Unspecified => {
                    if attendee.matches(visitor) {
                        visitor_is_visitor = true;
                    } else if attendee.matches(owner) {
                        owner_is_owner = true;
                    }
                }
            }
            if visitor_is_visitor && owner_is_owner {
                return true;
            }
        }
        false
    }
}
