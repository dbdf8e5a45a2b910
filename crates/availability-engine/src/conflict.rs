//! Locate the slots of a visible schedule that a candidate block collides with.
//!
//! Only slots starting on the candidate's calendar day are considered;
//! appointments are assumed not to cross midnight. A slot conflicts when its
//! interior overlaps the candidate's interior by at least one minute, so a
//! slot that merely touches the candidate's start or end is NOT a conflict.

use crate::block::BlockKey;
use crate::visible::VisibleSchedule;

/// Keys in `schedule` that overlap `candidate`, in schedule order.
///
/// All keys are minute-aligned, so the open-interval test
/// `key.start < candidate.end && candidate.start < key.end` is equivalent to
/// probing each minute of the key ten seconds in.
pub fn locate_conflicting(schedule: &VisibleSchedule, candidate: &BlockKey) -> Vec<BlockKey> {
    schedule
        .keys_on_day_of(candidate.start())
        .filter(|key| key.overlaps(candidate))
        .copied()
        .collect()
}

/// Minutes of overlap between two keys; 0 when they do not overlap.
pub fn overlap_minutes(a: &BlockKey, b: &BlockKey) -> i64 {
    if !a.overlaps(b) {
        return 0;
    }
    let overlap_start = a.start().max(b.start());
    let overlap_end = a.end().min(b.end());
    (overlap_end - overlap_start).num_minutes()
}
