// SPDX-License-Identifier: MIT OR Apache-2.0
//! Free record ranges of a slab.
//!
//! Ranges are half-open, disjoint and never adjacent once an operation
//! completes. They are keyed by start offset so the lowest vacancy is always
//! the first entry, and neighbours can be found for coalescing.

use std::collections::BTreeMap;
use std::ops::Range;

/// Ordered set of free record ranges
#[derive(Debug, Clone, Default)]
pub struct FreeRanges {
    /// start -> end
    ranges: BTreeMap<usize, usize>,
    total: usize,
}

impl FreeRanges {
    /// Create an empty free list
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a free list covering `range`
    pub fn with_range(range: Range<usize>) -> Self {
        let mut free = Self::new();
        free.insert(range);
        free
    }

    /// Total number of free records
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of disjoint ranges
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Whether no record is free
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Lowest free range
    pub fn first(&self) -> Option<Range<usize>> {
        self.ranges.first_key_value().map(|(&start, &end)| start..end)
    }

    /// Free ranges in ascending order
    pub fn iter(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.ranges.iter().map(|(&start, &end)| start..end)
    }

    /// Return a range to the free list, merging it with its neighbours
    pub fn insert(&mut self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        debug_assert!(!self.overlaps(&range), "range {range:?} is already free");

        let mut start = range.start;
        let mut end = range.end;
        self.total += end - start;

        // Predecessor ending exactly at our start
        if let Some((&prev_start, &prev_end)) = self.ranges.range(..start).next_back() {
            if prev_end == start {
                self.ranges.remove(&prev_start);
                start = prev_start;
            }
        }
        // Successor starting exactly at our end
        if let Some(next_end) = self.ranges.remove(&end) {
            end = next_end;
        }

        self.ranges.insert(start, end);
    }

    /// Take `size` records from the lowest range that can hold them whole
    pub fn take_first_fit(&mut self, size: usize) -> Option<Range<usize>> {
        let (&start, &end) = self
            .ranges
            .iter()
            .find(|&(&start, &end)| end - start >= size)?;

        self.ranges.remove(&start);
        if start + size < end {
            self.ranges.insert(start + size, end);
        }
        self.total -= size;
        Some(start..start + size)
    }

    /// Take `size` records from the lowest ranges in ascending order
    ///
    /// Returns `None` without modifying anything when fewer than `size`
    /// records are free.
    pub fn take_ascending(&mut self, size: usize) -> Option<Vec<Range<usize>>> {
        if size > self.total {
            return None;
        }
        Some(self.take_lowest(size))
    }

    /// Take up to `size` records from the lowest ranges in ascending order
    pub fn take_lowest(&mut self, size: usize) -> Vec<Range<usize>> {
        let mut taken = Vec::new();
        let mut remaining = size;
        while remaining > 0 {
            let Some((start, end)) = self.ranges.pop_first() else {
                break;
            };
            let len = end - start;
            if len > remaining {
                self.ranges.insert(start + remaining, end);
                taken.push(start..start + remaining);
                self.total -= remaining;
                remaining = 0;
            } else {
                taken.push(start..end);
                self.total -= len;
                remaining -= len;
            }
        }
        taken
    }

    /// Whether any part of `range` is currently free
    pub fn overlaps(&self, range: &Range<usize>) -> bool {
        if let Some((_, &prev_end)) = self.ranges.range(..=range.start).next_back() {
            if prev_end > range.start {
                return true;
            }
        }
        self.ranges.range(range.start..range.end).next().is_some()
    }
}
