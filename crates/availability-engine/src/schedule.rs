//! An owner's published availability.

use std::borrow::Borrow;

use chrono::NaiveDateTime;

use crate::block::{self, AvailableBlock, BlockSet};

/// Ordered set of an owner's available blocks.
///
/// Mutated only through [`add_blocks`](Self::add_blocks) and
/// [`remove_blocks`](Self::remove_blocks); removal matches on times alone.
#[derive(Debug, Clone, Default)]
pub struct AvailableSchedule {
    blocks: BlockSet,
}

impl AvailableSchedule {
    pub fn new(blocks: impl IntoIterator<Item = AvailableBlock>) -> Self {
        Self {
            blocks: blocks.into_iter().collect(),
        }
    }

    pub fn blocks(&self) -> &BlockSet {
        &self.blocks
    }

    pub fn into_blocks(self) -> BlockSet {
        self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn add_blocks(&mut self, blocks: impl IntoIterator<Item = AvailableBlock>) {
        self.blocks.extend(blocks);
    }

    pub fn remove_blocks<B: Borrow<AvailableBlock>>(
        &mut self,
        blocks: impl IntoIterator<Item = B>,
    ) {
        for block in blocks {
            self.blocks.remove(&block.borrow().key());
        }
    }

    /// First start and last end, or `None` for an empty schedule.
    pub fn bounds(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let first = self.blocks.first()?;
        let last = self.blocks.last()?;
        Some((first.start(), last.end()))
    }

    pub fn start(&self) -> Option<NaiveDateTime> {
        self.bounds().map(|(start, _)| start)
    }

    pub fn end(&self) -> Option<NaiveDateTime> {
        self.bounds().map(|(_, end)| end)
    }

    /// The canonical union of this schedule and `delta`.
    ///
    /// Both sides are expanded to one-minute blocks, unioned (delta details win
    /// where they overlap), and recombined. The result does not depend on how
    /// either side was chunked.
    pub fn merged_with<B: Borrow<AvailableBlock>>(
        &self,
        delta: impl IntoIterator<Item = B>,
    ) -> Self {
        let mut expanded = block::expand_set(self.blocks.iter(), 1);
        expanded.extend(block::expand_set(delta, 1));
        Self {
            blocks: block::combine(&expanded),
        }
    }

    /// The canonical difference of this schedule and `delta`, matched by time only.
    pub fn without<B: Borrow<AvailableBlock>>(&self, delta: impl IntoIterator<Item = B>) -> Self {
        let mut expanded = block::expand_set(self.blocks.iter(), 1);
        let removals = block::expand_set(delta, 1);
        expanded.remove_all(removals.keys());
        Self {
            blocks: block::combine(&expanded),
        }
    }
}
