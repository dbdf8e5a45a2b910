//! Available blocks and the algebra that builds, splits, and re-merges them.
//!
//! An [`AvailableBlock`] pairs a [`BlockKey`] (the minute-aligned `[start, end)`
//! span, which is the block's *only* identity) with [`BlockDetails`] (visitor
//! limit, meeting location, and the transient visitors-attending annotation).
//! Two blocks with the same times but different details are the same key in a
//! [`BlockSet`]: inserting one overwrites the other.
//!
//! The algebra:
//!
//! - [`create_block`] validates and truncates a single block.
//! - [`create_blocks`] generates one block per matching weekday from a
//!   time-of-day pattern such as `"9:00 AM"`–`"11:30 AM"` on `"MWF"`.
//! - [`expand`] splits a block into consecutive fixed-length sub-blocks,
//!   discarding any short remainder at the tail.
//! - [`combine`] merges runs of adjacent blocks that share visitor limit and
//!   meeting location.

use std::borrow::Borrow;
use std::collections::btree_map::{self, BTreeMap};
use std::collections::BTreeSet;
use std::iter::FromIterator;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::durations::MeetingDurations;
use crate::error::{Result, ScheduleError};

/// Length in minutes of the smallest block the application will create.
pub const MINIMUM_MINUTES: i64 = 5;

/// Format of date-time phrases, e.g. `"20080804-0930"`.
pub const DATE_TIME_PHRASE_FORMAT: &str = "%Y%m%d-%H%M";

/// Format of time-of-day phrases, e.g. `"9:30 AM"`.
pub const TIME_OF_DAY_FORMAT: &str = "%I:%M %p";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The identity of a block: its minute-aligned start and end.
///
/// Ordering is by start, then end. Every key reachable through the public API
/// satisfies `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BlockKey {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl BlockKey {
    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// True when the open interiors of the two spans intersect.
    /// Spans that only touch at an endpoint do not overlap.
    pub fn overlaps(&self, other: &BlockKey) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// A zero-length key at `at`. Sorts before every real key starting at `at`,
    /// so it is only ever used as a range bound.
    pub(crate) fn floor(at: NaiveDateTime) -> Self {
        Self { start: at, end: at }
    }
}

/// The payload carried alongside a [`BlockKey`]. Never part of the identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDetails {
    pub visitor_limit: u32,
    pub meeting_location: Option<String>,
    /// Visitors already booked into this block. Display annotation only.
    pub visitors_attending: u32,
}

/// A published span of time during which visitors may book appointments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawBlock", into = "RawBlock")]
pub struct AvailableBlock {
    key: BlockKey,
    details: BlockDetails,
}

impl AvailableBlock {
    /// Shorthand for [`create_block`] with a visitor limit of 1 and no location.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        create_block(start, end, 1, None)
    }

    pub(crate) fn from_parts(key: BlockKey, details: BlockDetails) -> Self {
        Self { key, details }
    }

    pub fn key(&self) -> BlockKey {
        self.key
    }

    pub fn details(&self) -> &BlockDetails {
        &self.details
    }

    pub fn into_parts(self) -> (BlockKey, BlockDetails) {
        (self.key, self.details)
    }

    pub fn start(&self) -> NaiveDateTime {
        self.key.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.key.end
    }

    pub fn duration_minutes(&self) -> i64 {
        self.key.duration_minutes()
    }

    pub fn visitor_limit(&self) -> u32 {
        self.details.visitor_limit
    }

    pub fn meeting_location(&self) -> Option<&str> {
        self.details.meeting_location.as_deref()
    }

    pub fn visitors_attending(&self) -> u32 {
        self.details.visitors_attending
    }

    /// Returns a copy of this block annotated with `count` attending visitors.
    pub fn with_visitors_attending(&self, count: u32) -> Self {
        let mut details = self.details.clone();
        details.visitors_attending = count;
        Self {
            key: self.key,
            details,
        }
    }
}

/// Wire shape of a block. Missing endpoints are rejected on conversion.
#[derive(Serialize, Deserialize)]
struct RawBlock {
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
    #[serde(default = "default_visitor_limit")]
    visitor_limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    meeting_location: Option<String>,
    #[serde(default)]
    visitors_attending: u32,
}

fn default_visitor_limit() -> u32 {
    1
}

impl TryFrom<RawBlock> for AvailableBlock {
    type Error = ScheduleError;

    fn try_from(raw: RawBlock) -> Result<Self> {
        let start = raw
            .start
            .ok_or_else(|| ScheduleError::InvalidInterval("start time is missing".to_string()))?;
        let end = raw
            .end
            .ok_or_else(|| ScheduleError::InvalidInterval("end time is missing".to_string()))?;
        let block = create_block(start, end, raw.visitor_limit, raw.meeting_location)?;
        Ok(block.with_visitors_attending(raw.visitors_attending))
    }
}

impl From<AvailableBlock> for RawBlock {
    fn from(block: AvailableBlock) -> Self {
        RawBlock {
            start: Some(block.key.start),
            end: Some(block.key.end),
            visitor_limit: block.details.visitor_limit,
            meeting_location: block.details.meeting_location,
            visitors_attending: block.details.visitors_attending,
        }
    }
}

// ---------------------------------------------------------------------------
// BlockSet
// ---------------------------------------------------------------------------

/// An ordered set of blocks keyed by [`BlockKey`].
#[derive(Debug, Clone, Default)]
pub struct BlockSet {
    blocks: BTreeMap<BlockKey, BlockDetails>,
}

impl BlockSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Insert `block`, replacing the details of an existing block with the same
    /// key. Returns `true` when the key was not previously present.
    pub fn insert(&mut self, block: AvailableBlock) -> bool {
        self.blocks.insert(block.key, block.details).is_none()
    }

    /// Insert `block` only when its key is not present yet.
    pub fn insert_if_absent(&mut self, block: AvailableBlock) -> bool {
        match self.blocks.entry(block.key) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(block.details);
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn contains(&self, key: &BlockKey) -> bool {
        self.blocks.contains_key(key)
    }

    pub fn get(&self, key: &BlockKey) -> Option<AvailableBlock> {
        self.blocks
            .get(key)
            .map(|details| AvailableBlock::from_parts(*key, details.clone()))
    }

    /// Remove the block with this key, ignoring whatever details the caller holds.
    pub fn remove(&mut self, key: &BlockKey) -> Option<AvailableBlock> {
        self.blocks
            .remove(key)
            .map(|details| AvailableBlock::from_parts(*key, details))
    }

    pub fn keys(&self) -> impl Iterator<Item = &BlockKey> + '_ {
        self.blocks.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = AvailableBlock> + '_ {
        self.blocks
            .iter()
            .map(|(key, details)| AvailableBlock::from_parts(*key, details.clone()))
    }

    pub fn first(&self) -> Option<AvailableBlock> {
        self.blocks
            .first_key_value()
            .map(|(key, details)| AvailableBlock::from_parts(*key, details.clone()))
    }

    pub fn last(&self) -> Option<AvailableBlock> {
        self.blocks
            .last_key_value()
            .map(|(key, details)| AvailableBlock::from_parts(*key, details.clone()))
    }

    /// The blocks whose keys fall in `[lower, upper)`.
    pub fn range(&self, lower: BlockKey, upper: BlockKey) -> BlockSet {
        if upper <= lower {
            return BlockSet::new();
        }
        self.blocks
            .range(lower..upper)
            .map(|(key, details)| AvailableBlock::from_parts(*key, details.clone()))
            .collect()
    }

    /// Remove every key in `keys`. Returns `true` if anything was removed.
    pub fn remove_all<'a, I>(&mut self, keys: I) -> bool
    where
        I: IntoIterator<Item = &'a BlockKey>,
    {
        let mut modified = false;
        for key in keys {
            modified |= self.blocks.remove(key).is_some();
        }
        modified
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&BlockKey, &BlockDetails) -> bool,
    {
        self.blocks.retain(|key, details| keep(key, details));
    }
}

impl FromIterator<AvailableBlock> for BlockSet {
    fn from_iter<I: IntoIterator<Item = AvailableBlock>>(iter: I) -> Self {
        let mut set = BlockSet::new();
        set.extend(iter);
        set
    }
}

impl Extend<AvailableBlock> for BlockSet {
    fn extend<I: IntoIterator<Item = AvailableBlock>>(&mut self, iter: I) {
        for block in iter {
            self.insert(block);
        }
    }
}

impl IntoIterator for BlockSet {
    type Item = AvailableBlock;
    type IntoIter = std::iter::Map<
        btree_map::IntoIter<BlockKey, BlockDetails>,
        fn((BlockKey, BlockDetails)) -> AvailableBlock,
    >;

    fn into_iter(self) -> Self::IntoIter {
        fn join((key, details): (BlockKey, BlockDetails)) -> AvailableBlock {
            AvailableBlock::from_parts(key, details)
        }
        self.blocks
            .into_iter()
            .map(join as fn((BlockKey, BlockDetails)) -> AvailableBlock)
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Drop seconds and sub-second precision.
pub fn truncate_to_minute(at: NaiveDateTime) -> NaiveDateTime {
    at - Duration::seconds(i64::from(at.second()))
        - Duration::nanoseconds(i64::from(at.nanosecond()))
}

/// Create a single block.
///
/// Both endpoints are truncated to the minute before validation.
///
/// # Errors
/// Returns `ScheduleError::InvalidInterval` if the truncated end does not fall
/// after the truncated start, or if `visitor_limit` is 0.
pub fn create_block(
    start: NaiveDateTime,
    end: NaiveDateTime,
    visitor_limit: u32,
    meeting_location: Option<String>,
) -> Result<AvailableBlock> {
    if visitor_limit < 1 {
        return Err(ScheduleError::InvalidInterval(format!(
            "visitor limit must be at least 1, got {}",
            visitor_limit
        )));
    }
    let start = truncate_to_minute(start);
    let end = truncate_to_minute(end);
    if end <= start {
        return Err(ScheduleError::InvalidInterval(format!(
            "start ({}) must precede end ({})",
            start, end
        )));
    }
    Ok(AvailableBlock {
        key: BlockKey { start, end },
        details: BlockDetails {
            visitor_limit,
            meeting_location,
            visitors_attending: 0,
        },
    })
}

/// Create a single block from two `yyyyMMdd-HHmm` phrases.
pub fn create_block_from_phrases(
    start_phrase: &str,
    end_phrase: &str,
    visitor_limit: u32,
    meeting_location: Option<String>,
) -> Result<AvailableBlock> {
    let start = parse_date_time_phrase(start_phrase)?;
    let end = parse_date_time_phrase(end_phrase)?;
    create_block(start, end, visitor_limit, meeting_location)
}

/// A block from `start` lasting the minimum meeting length of `durations`.
pub fn create_preferred_minimum_duration_block(
    start: NaiveDateTime,
    durations: &MeetingDurations,
) -> Result<AvailableBlock> {
    let end = start + Duration::minutes(i64::from(durations.min_length()));
    create_block(start, end, 1, None)
}

/// A block of [`MINIMUM_MINUTES`] starting at `start`.
pub fn create_smallest_allowed_block(start: NaiveDateTime) -> Result<AvailableBlock> {
    create_block(start, start + Duration::minutes(MINIMUM_MINUTES), 1, None)
}

/// A block ending at `end` that starts `minutes` earlier.
pub fn create_block_ends_at(end: NaiveDateTime, minutes: u32) -> Result<AvailableBlock> {
    create_block(end - Duration::minutes(i64::from(minutes)), end, 1, None)
}

/// Build one block per matching day between `start_date` and `end_date`
/// (both inclusive).
///
/// - `start_time_phrase` / `end_time_phrase` look like `"9:00 AM"`.
/// - `days_of_week_phrase` is a mask such as `"MWF"` using `N M T W R F S`
///   for Sunday through Saturday. Unknown characters are ignored.
///
/// # Errors
/// Returns `ScheduleError::InputFormat` if a time phrase is malformed or the
/// start time does not precede the end time, and
/// `ScheduleError::InvalidInterval` if `visitor_limit` is 0.
pub fn create_blocks(
    start_time_phrase: &str,
    end_time_phrase: &str,
    days_of_week_phrase: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    visitor_limit: u32,
    meeting_location: Option<&str>,
) -> Result<BlockSet> {
    let start_time = parse_time_of_day(start_time_phrase)?;
    let end_time = parse_time_of_day(end_time_phrase)?;
    if end_time <= start_time {
        return Err(ScheduleError::InputFormat(format!(
            "start time ({}) must occur before end time ({})",
            start_time_phrase, end_time_phrase
        )));
    }
    if visitor_limit < 1 {
        return Err(ScheduleError::InvalidInterval(format!(
            "visitor limit must be at least 1, got {}",
            visitor_limit
        )));
    }

    let mut blocks = BlockSet::new();
    for day in matching_days(days_of_week_phrase, start_date, end_date) {
        let block = create_block(
            day.and_time(start_time),
            day.and_time(end_time),
            visitor_limit,
            meeting_location.map(str::to_string),
        )?;
        blocks.insert(block);
    }
    tracing::debug!(
        count = blocks.len(),
        %start_date,
        %end_date,
        days = days_of_week_phrase,
        "created recurring blocks"
    );
    Ok(blocks)
}

/// Dates between `start_date` and `end_date` (inclusive) whose weekday appears
/// in `days_of_week_phrase`.
pub fn matching_days(
    days_of_week_phrase: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Vec<NaiveDate> {
    let days: BTreeSet<u32> = days_of_week_phrase
        .chars()
        .filter_map(|c| weekday_for_code(c).map(|w| w.num_days_from_sunday()))
        .collect();

    // Range end is the last second of end_date; compare midnights against it.
    let range_end = end_date.and_time(NaiveTime::MIN) + Duration::days(1) - Duration::seconds(1);

    let mut matching = Vec::new();
    let mut current = start_date;
    while current.and_time(NaiveTime::MIN) < range_end {
        if days.contains(&current.weekday().num_days_from_sunday()) {
            matching.push(current);
        }
        match current.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }
    matching
}

fn weekday_for_code(code: char) -> Option<Weekday> {
    match code.to_ascii_uppercase() {
        'N' => Some(Weekday::Sun),
        'M' => Some(Weekday::Mon),
        'T' => Some(Weekday::Tue),
        'W' => Some(Weekday::Wed),
        'R' => Some(Weekday::Thu),
        'F' => Some(Weekday::Fri),
        'S' => Some(Weekday::Sat),
        _ => None,
    }
}

/// Parse a time-of-day phrase such as `"9:30 AM"` or `"12:00 pm"`.
pub fn parse_time_of_day(phrase: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(phrase.trim(), TIME_OF_DAY_FORMAT).map_err(|_| {
        ScheduleError::InputFormat(format!(
            "{} does not match expected format of HH:MM AM/PM",
            phrase
        ))
    })
}

/// Parse a `yyyyMMdd-HHmm` phrase such as `"20080804-0930"`.
pub fn parse_date_time_phrase(phrase: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(phrase.trim(), DATE_TIME_PHRASE_FORMAT).map_err(|_| {
        ScheduleError::InputFormat(format!(
            "{} does not match expected format of yyyyMMdd-HHmm",
            phrase
        ))
    })
}

// ---------------------------------------------------------------------------
// Expand / combine
// ---------------------------------------------------------------------------

/// Split `block` into consecutive sub-blocks of exactly `step_minutes`.
///
/// Every sub-block inherits the visitor limit and meeting location; only the
/// first carries the source's visitors-attending count. A tail shorter than
/// `step_minutes` is dropped. A block already shorter than `step_minutes`
/// (or a step of 0) comes back unchanged as the only member.
pub fn expand(block: &AvailableBlock, step_minutes: u32) -> BlockSet {
    let mut small_blocks = BlockSet::new();
    let step = Duration::minutes(i64::from(step_minutes));
    if step_minutes == 0 || block.end() - block.start() < step {
        small_blocks.insert(block.clone());
        return small_blocks;
    }

    let mut current_start = block.start();
    let mut first = true;
    while block.end() - current_start >= step {
        let current_end = current_start + step;
        let details = BlockDetails {
            visitor_limit: block.details.visitor_limit,
            meeting_location: block.details.meeting_location.clone(),
            visitors_attending: if first { block.details.visitors_attending } else { 0 },
        };
        small_blocks.insert(AvailableBlock::from_parts(
            BlockKey {
                start: current_start,
                end: current_end,
            },
            details,
        ));
        current_start = current_end;
        first = false;
    }
    small_blocks
}

/// [`expand`] applied to every member of `blocks`.
pub fn expand_set<I, B>(blocks: I, step_minutes: u32) -> BlockSet
where
    I: IntoIterator<Item = B>,
    B: Borrow<AvailableBlock>,
{
    let mut small_blocks = BlockSet::new();
    for block in blocks {
        small_blocks.extend(expand(block.borrow(), step_minutes));
    }
    small_blocks
}

/// Merge runs of [`combinable`] neighbours into single blocks.
///
/// The merged block keeps the visitor limit, meeting location and
/// visitors-attending count of the first block in the run.
pub fn combine(blocks: &BlockSet) -> BlockSet {
    let mut large_blocks = BlockSet::new();
    let mut iter = blocks.iter();
    let Some(mut current) = iter.next() else {
        return large_blocks;
    };

    for next in iter {
        if combinable(&current, &next) {
            match create_block(
                current.start(),
                next.end(),
                current.visitor_limit(),
                current.details.meeting_location.clone(),
            ) {
                Ok(merged) => {
                    current = merged.with_visitors_attending(current.visitors_attending());
                }
                Err(e) => {
                    tracing::warn!(
                        start = %current.start(),
                        end = %next.end(),
                        error = %e,
                        "failed to merge adjacent blocks, keeping both"
                    );
                    large_blocks.insert(current);
                    current = next;
                }
            }
        } else {
            large_blocks.insert(current);
            current = next;
        }
    }
    large_blocks.insert(current);
    large_blocks
}

/// Two blocks combine iff the left ends where the right starts and both share
/// visitor limit and meeting location (absent matches only absent).
pub fn combinable(left: &AvailableBlock, right: &AvailableBlock) -> bool {
    left.end() == right.start()
        && left.visitor_limit() == right.visitor_limit()
        && left.meeting_location() == right.meeting_location()
}
