//! Owner-scoped storage of published availability.
//!
//! Every write is a read-modify-replace of the owner's whole schedule, so
//! writes for one owner are serialized behind that owner's own lock. Owners
//! never contend with each other beyond the brief lookup of their lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::block::{self, AvailableBlock, BlockKey};
use crate::durations::MeetingDurations;
use crate::error::Result;
use crate::event::Identity;
use crate::schedule::AvailableSchedule;

/// Persistence of each owner's [`AvailableSchedule`].
///
/// Writers canonicalize: the stored schedule and the incoming blocks are both
/// expanded to one-minute granularity, merged, and combined again before the
/// result replaces what was stored.
pub trait ScheduleStore {
    /// Add `blocks` to the owner's schedule and return the new schedule.
    /// Where an incoming block overlaps a stored one, the incoming visitor
    /// limit and meeting location win.
    fn add_to_schedule(
        &self,
        owner: &Identity,
        blocks: &[AvailableBlock],
    ) -> Result<AvailableSchedule>;

    /// Remove the time covered by `blocks`, matching on time only.
    fn remove_from_schedule(
        &self,
        owner: &Identity,
        blocks: &[AvailableBlock],
    ) -> Result<AvailableSchedule>;

    fn retrieve(&self, owner: &Identity) -> Result<AvailableSchedule>;

    /// The part of the owner's schedule lying within `[start, end]`.
    fn retrieve_range(
        &self,
        owner: &Identity,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<AvailableSchedule>;

    /// The seven days beginning at midnight of `week_of`.
    fn retrieve_weekly_schedule(
        &self,
        owner: &Identity,
        week_of: NaiveDate,
    ) -> Result<AvailableSchedule> {
        let week_start = week_of.and_time(NaiveTime::MIN);
        self.retrieve_range(owner, week_start, week_start + Duration::days(7))
    }

    /// The minimum-length block starting at `start`, if the owner published one.
    fn retrieve_target_block(
        &self,
        owner: &Identity,
        start: NaiveDateTime,
        durations: &MeetingDurations,
    ) -> Result<Option<AvailableBlock>>;

    /// Like [`ScheduleStore::retrieve_target_block`], but the minimum-length
    /// block must also end at `end`.
    fn retrieve_target_block_ending_at(
        &self,
        owner: &Identity,
        start: NaiveDateTime,
        end: NaiveDateTime,
        durations: &MeetingDurations,
    ) -> Result<Option<AvailableBlock>> {
        let end = block::truncate_to_minute(end);
        Ok(self
            .retrieve_target_block(owner, start, durations)?
            .filter(|target| target.end() == end))
    }

    /// Like [`ScheduleStore::retrieve_target_block`] but joined with the block
    /// that immediately follows it, for owners whose meetings last twice the
    /// minimum. `None` when the policy is not double length or the target has
    /// no adjacent successor.
    fn retrieve_target_double_length_block(
        &self,
        owner: &Identity,
        start: NaiveDateTime,
        durations: &MeetingDurations,
    ) -> Result<Option<AvailableBlock>>;

    fn clear_all_blocks(&self, owner: &Identity) -> Result<()>;

    /// Delete, across all owners, every block ending before midnight
    /// `days_prior` days before `now`. Returns the number of blocks removed.
    fn purge_expired_blocks(&self, days_prior: u32, now: NaiveDateTime) -> Result<usize>;
}

type OwnerSlot = Arc<Mutex<AvailableSchedule>>;

/// A [`ScheduleStore`] held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryScheduleStore {
    owners: RwLock<HashMap<Identity, OwnerSlot>>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of owners with a schedule entry, empty or not.
    pub fn owner_count(&self) -> usize {
        self.owners.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn existing_slot(&self, owner: &Identity) -> Option<OwnerSlot> {
        self.owners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(owner)
            .map(Arc::clone)
    }

    /// The owner's slot, created on first write.
    fn slot(&self, owner: &Identity) -> OwnerSlot {
        if let Some(slot) = self.existing_slot(owner) {
            return slot;
        }
        let mut owners = self.owners.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(owners.entry(owner.clone()).or_default())
    }

    /// A copy of the owner's schedule; empty for unknown owners, which are
    /// not registered by reading.
    fn snapshot(&self, owner: &Identity) -> AvailableSchedule {
        match self.existing_slot(owner) {
            Some(slot) => slot.lock().unwrap_or_else(PoisonError::into_inner).clone(),
            None => AvailableSchedule::default(),
        }
    }

    /// The owner's blocks on the calendar day of `start`, expanded to the
    /// minimum meeting length.
    fn expanded_day(
        &self,
        owner: &Identity,
        start: NaiveDateTime,
        durations: &MeetingDurations,
    ) -> Vec<AvailableBlock> {
        let start_of_day = start.date().and_time(NaiveTime::MIN);
        let end_of_day = start_of_day + Duration::days(1);
        let stored = self.snapshot(owner);
        let day = stored
            .blocks()
            .iter()
            .filter(|b| b.start() >= start_of_day && b.end() < end_of_day);
        block::expand_set(day, durations.min_length()).into_iter().collect()
    }
}

impl ScheduleStore for InMemoryScheduleStore {
    fn add_to_schedule(
        &self,
        owner: &Identity,
        blocks: &[AvailableBlock],
    ) -> Result<AvailableSchedule> {
        let slot = self.slot(owner);
        let mut schedule = slot.lock().unwrap_or_else(PoisonError::into_inner);
        *schedule = schedule.merged_with(blocks);
        tracing::debug!(
            owner = %owner.email,
            added = blocks.len(),
            stored = schedule.len(),
            "added blocks to schedule"
        );
        Ok(schedule.clone())
    }

    fn remove_from_schedule(
        &self,
        owner: &Identity,
        blocks: &[AvailableBlock],
    ) -> Result<AvailableSchedule> {
        let slot = self.slot(owner);
        let mut schedule = slot.lock().unwrap_or_else(PoisonError::into_inner);
        *schedule = schedule.without(blocks);
        tracing::debug!(
            owner = %owner.email,
            removed = blocks.len(),
            stored = schedule.len(),
            "removed blocks from schedule"
        );
        Ok(schedule.clone())
    }

    fn retrieve(&self, owner: &Identity) -> Result<AvailableSchedule> {
        Ok(self.snapshot(owner))
    }

    fn retrieve_range(
        &self,
        owner: &Identity,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<AvailableSchedule> {
        let stored = self.snapshot(owner);
        let mut minutes = block::expand_set(stored.blocks().iter(), 1);
        minutes.retain(|key, _| key.start() >= start && key.end() <= end);
        Ok(AvailableSchedule::new(block::combine(&minutes)))
    }

    fn retrieve_target_block(
        &self,
        owner: &Identity,
        start: NaiveDateTime,
        durations: &MeetingDurations,
    ) -> Result<Option<AvailableBlock>> {
        let target = block::truncate_to_minute(start);
        Ok(self
            .expanded_day(owner, start, durations)
            .into_iter()
            .find(|b| b.start() == target))
    }

    fn retrieve_target_double_length_block(
        &self,
        owner: &Identity,
        start: NaiveDateTime,
        durations: &MeetingDurations,
    ) -> Result<Option<AvailableBlock>> {
        if !durations.is_double_length() {
            return Ok(None);
        }
        let target = block::truncate_to_minute(start);
        let expanded = self.expanded_day(owner, start, durations);
        let Some(index) = expanded.iter().position(|b| b.start() == target) else {
            return Ok(None);
        };
        let first = &expanded[index];
        let Some(next) = expanded.get(index + 1).filter(|next| next.start() == first.end()) else {
            return Ok(None);
        };
        let joined = block::create_block(
            first.start(),
            next.end(),
            first.visitor_limit(),
            first.meeting_location().map(str::to_string),
        )?;
        Ok(Some(joined))
    }

    fn clear_all_blocks(&self, owner: &Identity) -> Result<()> {
        let slot = self.slot(owner);
        let mut schedule = slot.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::info!(owner = %owner.email, blocks = schedule.len(), "clearing all blocks");
        *schedule = AvailableSchedule::default();
        Ok(())
    }

    fn purge_expired_blocks(&self, days_prior: u32, now: NaiveDateTime) -> Result<usize> {
        let prior_to =
            (now.date() - Duration::days(i64::from(days_prior))).and_time(NaiveTime::MIN);
        let slots: Vec<OwnerSlot> = self
            .owners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let mut purged = 0;
        for slot in slots {
            let mut schedule = slot.lock().unwrap_or_else(PoisonError::into_inner);
            let expired: Vec<BlockKey> = schedule
                .blocks()
                .keys()
                .filter(|key| key.end() < prior_to)
                .copied()
                .collect();
            if expired.is_empty() {
                continue;
            }
            purged += expired.len();
            let mut remaining = schedule.blocks().clone();
            remaining.remove_all(&expired);
            *schedule = AvailableSchedule::new(remaining);
        }
        tracing::info!(purged, %prior_to, "purged expired blocks");
        Ok(purged)
    }
}
