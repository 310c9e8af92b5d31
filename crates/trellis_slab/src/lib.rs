// SPDX-License-Identifier: MIT OR Apache-2.0
//! GPU-mirrored slab cache for Trellis.
//!
//! This crate manages the CPU side of GPU vertex and index buffers:
//! - Fixed-size records described by a [`RecordLayout`]
//! - First-fit block allocation with coalesced free ranges
//! - Upload sizing from the highest live record, tracked in a skip list
//! - Optional single-step repacking of the topmost block
//!
//! ## Architecture
//!
//! ```text
//! SlabCache
//!   ├─→ storage      [rec 0][rec 1][ gap ][rec 3] ... capacity
//!   ├─→ FreeRanges   {2..3, 4..capacity}
//!   └─→ OrderIndex   highest index → BlockId
//!
//! SlabBuffer<B: GraphicsBackend>
//!   └─→ sync(): bind + upload(storage[..active_bytesize])
//! ```
//!
//! None of the types are internally synchronized. [`ContextLock`] provides
//! the admission convention for the thread that owns the graphics context.

pub mod backend;
pub mod cache;
pub mod context;
pub mod error;
pub mod free_list;
pub mod gpu_buffer;
pub mod layout;
pub mod order_index;

pub use backend::{BufferTarget, BufferUsage, GraphicsBackend, IndexType, Primitive, RecordingBackend};
pub use cache::{BlockId, CacheId, Relocation, SlabCache, SlabStats};
pub use context::{ContextGuard, ContextLock};
pub use error::{Result, SlabError};
pub use free_list::FreeRanges;
pub use gpu_buffer::SlabBuffer;
pub use layout::{FieldDesc, FieldLocation, FieldType, FieldValue, RecordLayout};
pub use order_index::OrderIndex;
