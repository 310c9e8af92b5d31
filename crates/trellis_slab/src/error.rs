// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for the slab cache.

use crate::backend::Primitive;
use crate::cache::BlockId;
use crate::layout::FieldType;
use thiserror::Error;

/// Slab cache errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlabError {
    /// A block of zero records was requested
    #[error("Invalid block size: {0}")]
    InvalidSize(usize),

    /// Value count does not match the block size, or a reset record has the wrong length
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Expected element (or byte) count
        expected: usize,
        /// Provided element (or byte) count
        actual: usize,
    },

    /// Access through a handle whose block was already released
    #[error("Block used after release: {0:?}")]
    UseAfterRelease(BlockId),

    /// Release of a block the cache does not track (double release, foreign cache)
    #[error("Block not owned by this cache: {0:?}")]
    BlockNotOwned(BlockId),

    /// Field name is not part of the record layout
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// The Rust type used to access a field does not match its component type or width
    #[error("Field '{field}' holds {expected_count} x {expected:?}, value is {actual_count} x {actual:?}")]
    FieldTypeMismatch {
        /// Field name
        field: String,
        /// Field component type
        expected: FieldType,
        /// Field component count
        expected_count: usize,
        /// Value component type
        actual: FieldType,
        /// Value component count
        actual_count: usize,
    },

    /// The block's record runs would cut primitives apart in per-run draw calls
    #[error("Block {block:?} spans {runs} runs that split {primitive:?} primitives")]
    SplitPrimitive {
        /// Block being drawn
        block: BlockId,
        /// Number of record runs the block owns
        runs: usize,
        /// Requested primitive
        primitive: Primitive,
    },

    /// The record layout is unusable
    #[error("Invalid layout: {0}")]
    InvalidLayout(String),
}

/// Result type for slab operations
pub type Result<T> = std::result::Result<T, SlabError>;
