// SPDX-License-Identifier: MIT OR Apache-2.0
//! Allocation churn benchmark: plain release vs release with repacking.

use crate::settings::ChurnSettings;
use std::time::{Duration, Instant};
use trellis_slab::{RecordLayout, SlabCache, SlabError};

/// How blocks are given back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseMode {
    /// `release`: gaps stay below the highest live record
    Plain,
    /// `release_and_repack`: the topmost block moves into the lowest gap
    Repack,
}

/// Measurements of one churn run
#[derive(Debug, Clone)]
pub struct ChurnReport {
    /// Release mode measured
    pub mode: ReleaseMode,
    /// Blocks released
    pub released: usize,
    /// Time spent releasing
    pub elapsed: Duration,
    /// Upload size before releasing
    pub peak_active_size: usize,
    /// Upload size after releasing
    pub final_active_size: usize,
    /// Live records after releasing
    pub live_records: usize,
    /// Blocks moved by repacking
    pub relocations: usize,
}

/// Xorshift generator; deterministic per seed
struct XorShift(u64);

impl XorShift {
    fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, bound: usize) -> usize {
        (self.next() % bound.max(1) as u64) as usize
    }
}

/// Allocate `settings.blocks` blocks, then release a share of them in random order
pub fn run(settings: &ChurnSettings, mode: ReleaseMode) -> Result<ChurnReport, SlabError> {
    let mut rng = XorShift::new(settings.seed);
    let mut cache = SlabCache::new(RecordLayout::index_buffer(), settings.initial_capacity);

    let span = settings.max_block.saturating_sub(settings.min_block) + 1;
    let mut blocks = Vec::with_capacity(settings.blocks);
    for i in 0..settings.blocks {
        let block = cache.request_block(settings.min_block + rng.below(span))?;
        cache.set(block, "idx", i as u32)?;
        blocks.push(block);
    }
    let peak_active_size = cache.active_size();

    // Fisher-Yates
    for i in (1..blocks.len()).rev() {
        blocks.swap(i, rng.below(i + 1));
    }
    let released = ((blocks.len() as f64 * f64::from(settings.release_fraction)) as usize).min(blocks.len());

    let mut relocations = 0;
    let start = Instant::now();
    for block in blocks.drain(..released) {
        match mode {
            ReleaseMode::Plain => cache.release(block, None)?,
            ReleaseMode::Repack => {
                if cache.release_and_repack(block, None)?.is_some() {
                    relocations += 1;
                }
            }
        }
    }
    let elapsed = start.elapsed();

    let report = ChurnReport {
        mode,
        released,
        elapsed,
        peak_active_size,
        final_active_size: cache.active_size(),
        live_records: cache.stats().live_records,
        relocations,
    };
    tracing::debug!(?report, "Churn run finished");
    Ok(report)
}
