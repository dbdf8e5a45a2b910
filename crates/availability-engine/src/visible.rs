//! The classified schedule produced for one viewer and one window.
//!
//! Every slot starts life as [`SlotStatus::Free`] and can move to `Busy` or
//! `Attending`. `Attending` is never downgraded to `Busy`, which keeps the
//! result independent of the order calendar events are applied in.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::block::{self, AvailableBlock, BlockDetails, BlockKey};
use crate::conflict;
use crate::durations::MeetingDurations;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Free,
    Busy,
    Attending,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Free => "free",
            SlotStatus::Busy => "busy",
            SlotStatus::Attending => "attending",
        }
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleSlot {
    pub details: BlockDetails,
    pub status: SlotStatus,
}

/// Flat, serializable view of one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotView {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub status: SlotStatus,
    pub visitor_limit: u32,
    pub visitors_attending: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_location: Option<String>,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct VisibleSchedule {
    slots: BTreeMap<BlockKey, VisibleSlot>,
    durations: MeetingDurations,
}

impl VisibleSchedule {
    pub fn new(durations: MeetingDurations) -> Self {
        Self {
            slots: BTreeMap::new(),
            durations,
        }
    }

    pub fn durations(&self) -> &MeetingDurations {
        &self.durations
    }

    /// Expand `block` to the minimum meeting length and store every piece as
    /// free, replacing any existing entry with the same key.
    pub fn add_free_block(&mut self, block: &AvailableBlock) {
        for small in block::expand(block, self.durations.min_length()) {
            let (key, details) = small.into_parts();
            self.slots.insert(
                key,
                VisibleSlot {
                    details,
                    status: SlotStatus::Free,
                },
            );
        }
    }

    pub fn add_free_blocks<'a>(&mut self, blocks: impl IntoIterator<Item = &'a AvailableBlock>) {
        for block in blocks {
            self.add_free_block(block);
        }
    }

    /// Replace the details of an existing slot with those of `block` and mark
    /// it free. Does nothing when the key is not present.
    ///
    /// A meeting location already on the slot is kept when `block` has none.
    pub fn overwrite_free_block_only_if_present(&mut self, block: &AvailableBlock) -> bool {
        match self.slots.get_mut(&block.key()) {
            Some(slot) => {
                let mut details = block.details().clone();
                if details.meeting_location.is_none() {
                    details.meeting_location = slot.details.meeting_location.take();
                }
                *slot = VisibleSlot {
                    details,
                    status: SlotStatus::Free,
                };
                true
            }
            None => false,
        }
    }

    /// Mark `block` busy: the exact slot if present, otherwise every slot on
    /// the same day whose interior overlaps it. Attending slots are left alone.
    pub fn set_busy_block(&mut self, block: &AvailableBlock) {
        let key = block.key();
        if let Some(slot) = self.slots.get_mut(&key) {
            if slot.status != SlotStatus::Attending {
                slot.status = SlotStatus::Busy;
            }
            return;
        }

        let conflicting = conflict::locate_conflicting(self, &key);
        tracing::debug!(
            start = %key.start(),
            end = %key.end(),
            conflicts = conflicting.len(),
            "set_busy_block on non-matching block"
        );
        for conflict in conflicting {
            if let Some(slot) = self.slots.get_mut(&conflict) {
                if slot.status != SlotStatus::Attending {
                    slot.status = SlotStatus::Busy;
                }
            }
        }
    }

    pub fn set_busy_blocks<'a>(&mut self, blocks: impl IntoIterator<Item = &'a AvailableBlock>) {
        for block in blocks {
            self.set_busy_block(block);
        }
    }

    /// Mark `block` attending. When it does not match a slot exactly, every
    /// overlapping slot on that day is replaced by `block` itself; when nothing
    /// overlaps, the schedule is unchanged.
    pub fn set_attending_block(&mut self, block: &AvailableBlock) {
        let key = block.key();
        if let Some(slot) = self.slots.get_mut(&key) {
            slot.status = SlotStatus::Attending;
            return;
        }

        let conflicting = conflict::locate_conflicting(self, &key);
        if conflicting.is_empty() {
            return;
        }
        for conflict in &conflicting {
            self.slots.remove(conflict);
        }
        self.slots.insert(
            key,
            VisibleSlot {
                details: block.details().clone(),
                status: SlotStatus::Attending,
            },
        );
    }

    pub fn set_attending_blocks<'a>(
        &mut self,
        blocks: impl IntoIterator<Item = &'a AvailableBlock>,
    ) {
        for block in blocks {
            self.set_attending_block(block);
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn status_of(&self, key: &BlockKey) -> Option<SlotStatus> {
        self.slots.get(key).map(|slot| slot.status)
    }

    pub fn get(&self, key: &BlockKey) -> Option<AvailableBlock> {
        self.slots
            .get(key)
            .map(|slot| AvailableBlock::from_parts(*key, slot.details.clone()))
    }

    pub fn slots(&self) -> impl Iterator<Item = (&BlockKey, &VisibleSlot)> + '_ {
        self.slots.iter()
    }

    pub fn count_for(&self, status: SlotStatus) -> usize {
        self.slots.values().filter(|slot| slot.status == status).count()
    }

    pub fn free_count(&self) -> usize {
        self.count_for(SlotStatus::Free)
    }

    pub fn busy_count(&self) -> usize {
        self.count_for(SlotStatus::Busy)
    }

    pub fn attending_count(&self) -> usize {
        self.count_for(SlotStatus::Attending)
    }

    pub fn blocks_for(&self, status: SlotStatus) -> Vec<AvailableBlock> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.status == status)
            .map(|(key, slot)| AvailableBlock::from_parts(*key, slot.details.clone()))
            .collect()
    }

    pub fn free_list(&self) -> Vec<AvailableBlock> {
        self.blocks_for(SlotStatus::Free)
    }

    pub fn busy_list(&self) -> Vec<AvailableBlock> {
        self.blocks_for(SlotStatus::Busy)
    }

    pub fn attending_list(&self) -> Vec<AvailableBlock> {
        self.blocks_for(SlotStatus::Attending)
    }

    pub fn schedule_start(&self) -> Option<NaiveDateTime> {
        self.slots.keys().next().map(BlockKey::start)
    }

    pub fn schedule_end(&self) -> Option<NaiveDateTime> {
        self.slots.keys().next_back().map(BlockKey::end)
    }

    /// The slots lying entirely within `[start, end]`, replayed into a new
    /// schedule: each is seeded free first, then moved to its original status.
    pub fn subset(&self, start: NaiveDateTime, end: NaiveDateTime) -> VisibleSchedule {
        let mut result = VisibleSchedule::new(self.durations);
        for (key, slot) in &self.slots {
            if key.start() < start || key.end() > end {
                continue;
            }
            let block = AvailableBlock::from_parts(*key, slot.details.clone());
            result.add_free_block(&block);
            match slot.status {
                SlotStatus::Free => {}
                SlotStatus::Busy => result.set_busy_block(&block),
                SlotStatus::Attending => result.set_attending_block(&block),
            }
        }
        result
    }

    /// Display title of a slot, e.g. `"busy"` or `"(3/4) free"` for a free slot
    /// with room left for three of four visitors.
    pub fn title_for(slot: &VisibleSlot) -> String {
        let limit = slot.details.visitor_limit;
        if limit > 1 && slot.status == SlotStatus::Free {
            let remaining = limit.saturating_sub(slot.details.visitors_attending);
            format!("({}/{}) {}", remaining, limit, slot.status)
        } else {
            slot.status.to_string()
        }
    }

    pub fn to_views(&self) -> Vec<SlotView> {
        self.slots
            .iter()
            .map(|(key, slot)| SlotView {
                start: key.start(),
                end: key.end(),
                status: slot.status,
                visitor_limit: slot.details.visitor_limit,
                visitors_attending: slot.details.visitors_attending,
                meeting_location: slot.details.meeting_location.clone(),
                title: Self::title_for(slot),
            })
            .collect()
    }

    /// Keys whose start falls on the calendar day containing `at`.
    pub(crate) fn keys_on_day_of(&self, at: NaiveDateTime) -> impl Iterator<Item = &BlockKey> + '_ {
        let day_start = at.date().and_time(NaiveTime::MIN);
        let next_day = day_start + Duration::days(1);
        self.slots
            .range(BlockKey::floor(day_start)..BlockKey::floor(next_day))
            .map(|(key, _)| key)
    }
}
