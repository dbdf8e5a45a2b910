//! Tests for the in-memory schedule store.

use std::sync::Arc;
use std::thread;

use availability_engine::block::{create_block_from_phrases, parse_date_time_phrase};
use availability_engine::{
    AvailableBlock, Identity, InMemoryScheduleStore, MeetingDurations, ScheduleStore,
};
use chrono::{Duration, NaiveDate, NaiveDateTime};

fn at(phrase: &str) -> NaiveDateTime {
    parse_date_time_phrase(phrase).unwrap()
}

fn blk(start: &str, end: &str) -> AvailableBlock {
    create_block_from_phrases(start, end, 1, None).unwrap()
}

fn owner() -> Identity {
    Identity::new("Some Owner", "owner@example.edu")
}

fn spans(
    blocks: impl IntoIterator<Item = AvailableBlock>,
) -> Vec<(NaiveDateTime, NaiveDateTime)> {
    blocks.into_iter().map(|b| (b.start(), b.end())).collect()
}

fn store_with(blocks: &[AvailableBlock]) -> InMemoryScheduleStore {
    let store = InMemoryScheduleStore::new();
    store.add_to_schedule(&owner(), blocks).unwrap();
    store
}

// ── add / remove ────────────────────────────────────────────────────────

#[test]
fn add_single_block() {
    let store = InMemoryScheduleStore::new();
    let schedule = store
        .add_to_schedule(&owner(), &[blk("20091102-1330", "20091102-1400")])
        .unwrap();
    assert_eq!(
        spans(schedule.into_blocks()),
        vec![(at("20091102-1330"), at("20091102-1400"))]
    );
}

#[test]
fn adjacent_adds_are_combined() {
    let store = store_with(&[blk("20091102-1330", "20091102-1400")]);
    let schedule = store
        .add_to_schedule(&owner(), &[blk("20091102-1400", "20091102-1500")])
        .unwrap();
    assert_eq!(
        spans(schedule.into_blocks()),
        vec![(at("20091102-1330"), at("20091102-1500"))]
    );
}

#[test]
fn remove_splits_stored_block() {
    let store = store_with(&[blk("20091102-0900", "20091102-1200")]);
    let schedule = store
        .remove_from_schedule(&owner(), &[blk("20091102-1000", "20091102-1030")])
        .unwrap();
    assert_eq!(
        spans(schedule.into_blocks()),
        vec![
            (at("20091102-0900"), at("20091102-1000")),
            (at("20091102-1030"), at("20091102-1200")),
        ]
    );
}

#[test]
fn remove_ignores_details() {
    let store = store_with(&[blk("20091102-0900", "20091102-1000")]);
    let other_details = create_block_from_phrases(
        "20091102-0900",
        "20091102-1000",
        9,
        Some("Elsewhere".to_string()),
    )
    .unwrap();
    let schedule = store.remove_from_schedule(&owner(), &[other_details]).unwrap();
    assert!(schedule.is_empty());
}

#[test]
fn owners_are_independent() {
    let store = store_with(&[blk("20091102-0900", "20091102-1000")]);
    let other = Identity::new("Other Owner", "other@example.edu");
    assert!(store.retrieve(&other).unwrap().is_empty());
    assert_eq!(store.retrieve(&owner()).unwrap().len(), 1);
}

#[test]
fn clear_all_blocks() {
    let store = store_with(&[blk("20091102-0900", "20091102-1000")]);
    store.clear_all_blocks(&owner()).unwrap();
    assert!(store.retrieve(&owner()).unwrap().is_empty());
}

// ── retrieve ────────────────────────────────────────────────────────────

#[test]
fn retrieve_range_clips_blocks() {
    let store = store_with(&[
        blk("20091102-0900", "20091102-1200"),
        blk("20091103-0900", "20091103-1200"),
    ]);
    let range = store
        .retrieve_range(&owner(), at("20091102-1100"), at("20091103-1000"))
        .unwrap();
    assert_eq!(
        spans(range.into_blocks()),
        vec![
            (at("20091102-1100"), at("20091102-1200")),
            (at("20091103-0900"), at("20091103-1000")),
        ]
    );
}

#[test]
fn retrieve_weekly_schedule_covers_seven_days() {
    let store = store_with(&[
        blk("20091101-0900", "20091101-1000"),
        blk("20091107-0900", "20091107-1000"),
        blk("20091108-0900", "20091108-1000"),
    ]);
    let week = store
        .retrieve_weekly_schedule(&owner(), NaiveDate::from_ymd_opt(2009, 11, 1).unwrap())
        .unwrap();
    assert_eq!(week.len(), 2);
    assert_eq!(week.end(), Some(at("20091107-1000")));
}

#[test]
fn reads_do_not_register_unknown_owners() {
    let store = InMemoryScheduleStore::new();
    let stranger = Identity::new("Never Stored", "never@example.edu");

    assert!(store.retrieve(&stranger).unwrap().is_empty());
    assert!(store
        .retrieve_range(&stranger, at("20091102-0000"), at("20091109-0000"))
        .unwrap()
        .is_empty());
    assert!(store
        .retrieve_target_block(&stranger, at("20091102-0900"), &MeetingDurations::THIRTY)
        .unwrap()
        .is_none());
    assert!(store
        .retrieve_target_double_length_block(
            &stranger,
            at("20091102-0900"),
            &MeetingDurations::THIRTY_SIXTY,
        )
        .unwrap()
        .is_none());
    assert_eq!(store.owner_count(), 0);

    store
        .add_to_schedule(&stranger, &[blk("20091102-0900", "20091102-1000")])
        .unwrap();
    assert_eq!(store.owner_count(), 1);
}

// ── target blocks ───────────────────────────────────────────────────────

#[test]
fn retrieve_target_block_finds_aligned_slot() {
    let store = store_with(&[blk("20091102-0900", "20091102-1200")]);

    let target = store
        .retrieve_target_block(&owner(), at("20091102-1030"), &MeetingDurations::THIRTY)
        .unwrap()
        .unwrap();
    assert_eq!(
        (target.start(), target.end()),
        (at("20091102-1030"), at("20091102-1100"))
    );

    let misaligned = store
        .retrieve_target_block(&owner(), at("20091102-1015"), &MeetingDurations::THIRTY)
        .unwrap();
    assert!(misaligned.is_none());

    let other_day = store
        .retrieve_target_block(&owner(), at("20091103-1030"), &MeetingDurations::THIRTY)
        .unwrap();
    assert!(other_day.is_none());
}

#[test]
fn retrieve_target_block_ending_at_requires_matching_end() {
    let store = store_with(&[blk("20091102-0900", "20091102-1200")]);
    let start = at("20091102-1030");

    let matching = store
        .retrieve_target_block_ending_at(
            &owner(),
            start,
            at("20091102-1100"),
            &MeetingDurations::THIRTY,
        )
        .unwrap()
        .unwrap();
    assert_eq!(
        (matching.start(), matching.end()),
        (at("20091102-1030"), at("20091102-1100"))
    );

    // Seconds on the end are dropped before comparing.
    let with_seconds = store
        .retrieve_target_block_ending_at(
            &owner(),
            start,
            at("20091102-1100") + Duration::seconds(30),
            &MeetingDurations::THIRTY,
        )
        .unwrap();
    assert!(with_seconds.is_some());

    let mismatched = store
        .retrieve_target_block_ending_at(
            &owner(),
            start,
            at("20091102-1115"),
            &MeetingDurations::THIRTY,
        )
        .unwrap();
    assert!(mismatched.is_none());

    // Only the minimum-length block is ever returned.
    let double_length = store
        .retrieve_target_block_ending_at(
            &owner(),
            start,
            at("20091102-1130"),
            &MeetingDurations::THIRTY_SIXTY,
        )
        .unwrap();
    assert!(double_length.is_none());
}

#[test]
fn retrieve_target_double_length_block() {
    let located = create_block_from_phrases(
        "20091102-0900",
        "20091102-1100",
        2,
        Some("Room 1".to_string()),
    )
    .unwrap();
    let store = store_with(&[located]);

    let joined = store
        .retrieve_target_double_length_block(
            &owner(),
            at("20091102-0930"),
            &MeetingDurations::THIRTY_SIXTY,
        )
        .unwrap()
        .unwrap();
    assert_eq!(
        (joined.start(), joined.end()),
        (at("20091102-0930"), at("20091102-1030"))
    );
    assert_eq!(joined.visitor_limit(), 2);
    assert_eq!(joined.meeting_location(), Some("Room 1"));

    // The last slot of the day has no successor.
    let last = store
        .retrieve_target_double_length_block(
            &owner(),
            at("20091102-1030"),
            &MeetingDurations::THIRTY_SIXTY,
        )
        .unwrap();
    assert!(last.is_none());

    // Not a double-length policy.
    let single = store
        .retrieve_target_double_length_block(
            &owner(),
            at("20091102-0930"),
            &MeetingDurations::THIRTY,
        )
        .unwrap();
    assert!(single.is_none());
}

#[test]
fn double_length_block_is_not_joined_across_a_gap() {
    let store = store_with(&[
        blk("20091102-0900", "20091102-0930"),
        blk("20091102-1400", "20091102-1430"),
    ]);
    let joined = store
        .retrieve_target_double_length_block(
            &owner(),
            at("20091102-0900"),
            &MeetingDurations::THIRTY_SIXTY,
        )
        .unwrap();
    assert!(joined.is_none());
}

// ── purge ───────────────────────────────────────────────────────────────

#[test]
fn purge_removes_blocks_ending_before_cutoff() {
    let store = store_with(&[
        blk("20091101-0900", "20091101-1000"),
        blk("20091110-0900", "20091110-1000"),
    ]);
    let other = Identity::new("Other Owner", "other@example.edu");
    store
        .add_to_schedule(&other, &[blk("20091102-0900", "20091102-1000")])
        .unwrap();

    // Cutoff is midnight on 2009-11-05.
    let purged = store.purge_expired_blocks(7, at("20091112-1500")).unwrap();
    assert_eq!(purged, 2);
    assert_eq!(store.retrieve(&owner()).unwrap().len(), 1);
    assert!(store.retrieve(&other).unwrap().is_empty());

    assert_eq!(store.purge_expired_blocks(7, at("20091112-1500")).unwrap(), 0);
}

// ── concurrency ─────────────────────────────────────────────────────────

#[test]
fn concurrent_writes_to_one_owner_are_not_lost() {
    let store = Arc::new(InMemoryScheduleStore::new());
    let handles: Vec<_> = (0..8u32)
        .map(|hour| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let start = NaiveDate::from_ymd_opt(2009, 11, 2)
                    .unwrap()
                    .and_hms_opt(8 + hour, 0, 0)
                    .unwrap();
                let block = availability_engine::create_block(
                    start,
                    start + Duration::minutes(30),
                    1,
                    None,
                )
                .unwrap();
                store.add_to_schedule(&owner(), &[block]).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(store.retrieve(&owner()).unwrap().len(), 8);
    assert_eq!(store.owner_count(), 1);
}
