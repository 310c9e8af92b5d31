// SPDX-License-Identifier: MIT OR Apache-2.0
//! Randomized allocation churn checked against a brute-force model.

use std::collections::HashSet;
use trellis_slab::{BlockId, RecordLayout, SlabCache};

/// Small deterministic generator so failures reproduce
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, bound: usize) -> usize {
        (self.next() % bound as u64) as usize
    }
}

fn check_invariants(cache: &SlabCache, live: &[BlockId]) {
    let mut claimed = HashSet::new();
    let mut live_records = 0;
    let mut brute_max = None;

    for &block in live {
        for index in cache.block_indices(block).unwrap() {
            assert!(claimed.insert(index), "record {index} owned twice");
            brute_max = brute_max.max(Some(index));
        }
        live_records += cache.block_size(block).unwrap();
    }

    let mut free_records = 0;
    let mut previous_end = None;
    for range in cache.free_ranges() {
        assert!(!range.is_empty());
        if let Some(end) = previous_end {
            assert!(range.start > end, "free ranges adjacent or overlapping");
        }
        previous_end = Some(range.end);
        for index in range.clone() {
            assert!(claimed.insert(index), "record {index} both free and owned");
        }
        free_records += range.len();
    }

    assert_eq!(live_records + free_records, cache.capacity());
    assert_eq!(cache.active_size(), brute_max.map_or(0, |max| max + 1));
    assert!(cache.active_size() >= live_records);
    assert!(cache.capacity() >= cache.active_size());
    assert_eq!(cache.live_block_count(), live.len());
}

#[test]
fn test_random_churn_keeps_invariants() {
    let mut rng = Lcg(0xC0FFEE);
    let mut cache = SlabCache::new(RecordLayout::index_buffer(), 4);
    let mut live = Vec::new();

    for step in 0..2000 {
        if live.is_empty() || rng.below(5) < 3 {
            let size = rng.below(6) + 1;
            live.push(cache.request_block(size).unwrap());
        } else {
            let victim = live.swap_remove(rng.below(live.len()));
            if step % 4 == 0 {
                cache.release_and_repack(victim, None).unwrap();
            } else {
                cache.release(victim, None).unwrap();
            }
        }
        check_invariants(&cache, &live);
    }
}

#[test]
fn test_random_release_order_active_size() {
    let mut rng = Lcg(42);
    let mut cache = SlabCache::new(RecordLayout::index_buffer(), 16);
    let mut live: Vec<_> = (0..200)
        .map(|i| cache.request_block(i % 3 + 1).unwrap())
        .collect();

    while !live.is_empty() {
        let victim = live.swap_remove(rng.below(live.len()));
        cache.release(victim, None).unwrap();

        let expected = live
            .iter()
            .flat_map(|&block| cache.block_indices(block).unwrap())
            .max()
            .map_or(0, |max| max + 1);
        assert_eq!(cache.active_size(), expected);
    }
    assert_eq!(cache.active_size(), 0);
}

#[test]
fn test_repack_never_grows_active_size() {
    let mut rng = Lcg(7);
    let mut cache = SlabCache::new(RecordLayout::index_buffer(), 64);
    let mut live: Vec<_> = (0..64)
        .map(|i| {
            let block = cache.request_block(i % 4 + 1).unwrap();
            cache.set(block, "idx", i as u32).unwrap();
            (block, i as u32)
        })
        .collect();

    while live.len() > 1 {
        let (victim, _) = live.swap_remove(rng.below(live.len()));
        let before = cache.active_size();
        let live_after = cache.stats().live_records - cache.block_size(victim).unwrap();

        let relocation = cache.release_and_repack(victim, None).unwrap();
        assert!(cache.active_size() <= before);
        assert_eq!(cache.stats().live_records, live_after);

        // Moved records keep their payload
        if let Some(relocation) = relocation {
            let (_, tag) = live
                .iter()
                .find(|(block, _)| *block == relocation.block)
                .copied()
                .unwrap();
            assert!(cache.get::<u32>(relocation.block, "idx").unwrap().iter().all(|&v| v == tag));
        }
        for &(block, tag) in &live {
            assert!(cache.get::<u32>(block, "idx").unwrap().iter().all(|&v| v == tag));
        }
    }
}

#[test]
fn test_first_fit_reuses_released_range() {
    let mut cache = SlabCache::new(RecordLayout::index_buffer(), 32);
    let blocks: Vec<_> = (0..8).map(|_| cache.request_block(4).unwrap()).collect();
    let lowest = cache.block_indices(blocks[0]).unwrap();

    cache.release(blocks[0], None).unwrap();
    cache.release(blocks[5], None).unwrap();

    let reused = cache.request_block(4).unwrap();
    assert_eq!(cache.block_indices(reused).unwrap(), lowest);
}

#[test]
fn test_growth_preserves_many_blocks() {
    let mut cache = SlabCache::new(RecordLayout::index_buffer(), 1);
    let blocks: Vec<_> = (0..100u32)
        .map(|i| {
            let block = cache.request_block(2).unwrap();
            cache.set(block, "idx", i).unwrap();
            block
        })
        .collect();

    assert_eq!(cache.capacity(), 256);
    for (i, &block) in blocks.iter().enumerate() {
        assert_eq!(cache.get::<u32>(block, "idx").unwrap(), vec![i as u32; 2]);
    }
}
