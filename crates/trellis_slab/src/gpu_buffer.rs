// SPDX-License-Identifier: MIT OR Apache-2.0
//! A slab cache paired with the GPU buffer object it mirrors.

use crate::backend::{BufferTarget, BufferUsage, GraphicsBackend, IndexType, Primitive};
use crate::cache::{BlockId, SlabCache};
use crate::error::{Result, SlabError};
use crate::layout::RecordLayout;
use std::ops::Range;
use tracing::trace;

/// GPU-mirrored slab: edits go to the CPU copy, `sync` uploads it verbatim
pub struct SlabBuffer<B: GraphicsBackend> {
    cache: SlabCache,
    buffer: B::Buffer,
    target: BufferTarget,
    usage: BufferUsage,
    dirty: bool,
    uploaded_bytes: usize,
}

impl<B: GraphicsBackend> SlabBuffer<B> {
    /// Create the CPU slab and its backend buffer
    pub fn new(
        backend: &mut B,
        layout: RecordLayout,
        initial_capacity: usize,
        target: BufferTarget,
        usage: BufferUsage,
    ) -> Self {
        Self {
            cache: SlabCache::new(layout, initial_capacity),
            buffer: backend.create_buffer(),
            target,
            usage,
            dirty: true,
            uploaded_bytes: 0,
        }
    }

    /// `u32` index buffer whose unallocated slots hold the primitive-restart index
    pub fn index_buffer(backend: &mut B, initial_capacity: usize) -> Result<Self> {
        let mut slab = Self::new(
            backend,
            RecordLayout::index_buffer(),
            initial_capacity,
            BufferTarget::ElementArray,
            BufferUsage::DynamicDraw,
        );
        slab.cache.fill_all_with(&IndexType::U32.restart_index())?;
        Ok(slab)
    }

    /// The CPU copy
    pub fn cache(&self) -> &SlabCache {
        &self.cache
    }

    /// Mutable access to the CPU copy; marks the buffer for upload
    pub fn cache_mut(&mut self) -> &mut SlabCache {
        self.dirty = true;
        &mut self.cache
    }

    /// Backend buffer handle
    pub fn buffer(&self) -> B::Buffer {
        self.buffer
    }

    /// Binding target
    pub fn target(&self) -> BufferTarget {
        self.target
    }

    /// Whether the CPU copy may differ from the last upload
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Bytes sent by the last upload
    pub fn uploaded_bytes(&self) -> usize {
        self.uploaded_bytes
    }

    /// Upload the active prefix of the slab if anything changed
    ///
    /// Returns whether an upload happened.
    pub fn sync(&mut self, backend: &mut B) -> bool {
        if !self.dirty {
            return false;
        }
        let bytes = self.cache.active_bytes();
        backend.bind(self.buffer, self.target);
        backend.upload(self.buffer, self.target, bytes, self.usage);
        self.uploaded_bytes = bytes.len();
        self.dirty = false;
        trace!("Uploaded {} bytes to {:?}", self.uploaded_bytes, self.buffer);
        true
    }

    /// Draw the indices held by `block`, one call per contiguous run
    ///
    /// A block split into several runs is drawn only if every run holds
    /// whole primitives; otherwise this fails with
    /// [`SlabError::SplitPrimitive`]. Index buffers that may hold split
    /// blocks should be drawn with [`Self::draw_active_indexed`] instead.
    pub fn draw_block_indexed(&self, backend: &mut B, block: BlockId, primitive: Primitive) -> Result<()> {
        let index_type = self.index_type()?;
        let record_size = self.cache.record_size();
        let runs = self.drawable_runs(block, primitive)?;
        backend.bind(self.buffer, self.target);
        for run in runs {
            backend.draw_indexed(primitive, run.len(), index_type, run.start * record_size);
        }
        Ok(())
    }

    /// Draw every uploaded index; gaps hold the restart sentinel
    ///
    /// One call covers split blocks as well, since each index still points
    /// at the right vertex wherever its record sits.
    pub fn draw_active_indexed(&self, backend: &mut B, primitive: Primitive) -> Result<()> {
        let index_type = self.index_type()?;
        let count = self.cache.active_size();
        if count > 0 {
            backend.bind(self.buffer, self.target);
            backend.draw_indexed(primitive, count, index_type, 0);
        }
        Ok(())
    }

    /// Draw the vertices held by `block`, one call per contiguous run
    ///
    /// Same restriction on split blocks as [`Self::draw_block_indexed`].
    pub fn draw_block_arrays(&self, backend: &mut B, block: BlockId, primitive: Primitive) -> Result<()> {
        for run in self.drawable_runs(block, primitive)? {
            backend.draw_arrays(primitive, run.start, run.len());
        }
        Ok(())
    }

    /// Runs of `block`, provided no run boundary falls inside a primitive
    fn drawable_runs(&self, block: BlockId, primitive: Primitive) -> Result<&[Range<usize>]> {
        let runs = self.cache.block_runs(block)?;
        if runs.len() > 1 {
            let whole = primitive
                .vertices_per_primitive()
                .is_some_and(|per| runs.iter().all(|run| run.len() % per == 0));
            if !whole {
                return Err(SlabError::SplitPrimitive {
                    block,
                    runs: runs.len(),
                    primitive,
                });
            }
        }
        Ok(runs)
    }

    fn index_type(&self) -> Result<IndexType> {
        let layout = self.cache.layout();
        let mut fields = layout.fields();
        match (self.target, fields.next(), fields.next()) {
            (BufferTarget::ElementArray, Some((_, location)), None) if location.count == 1 => {
                IndexType::from_field(location.ty)
                    .ok_or_else(|| SlabError::InvalidLayout("index field must be unsigned".to_string()))
            }
            _ => Err(SlabError::InvalidLayout(
                "indexed draws need an element buffer with one index field".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, RecordingBackend};
    use crate::layout::{FieldDesc, FieldType};

    #[test]
    fn test_sync_uploads_active_prefix_once() {
        let mut backend = RecordingBackend::new();
        let mut slab = SlabBuffer::index_buffer(&mut backend, 8).unwrap();

        let block = slab.cache_mut().request_block(3).unwrap();
        slab.cache_mut().set_each(block, "idx", &[0u32, 1, 2]).unwrap();

        assert!(slab.sync(&mut backend));
        assert_eq!(slab.uploaded_bytes(), 12);
        assert!(!slab.sync(&mut backend));
        assert_eq!(backend.contents(slab.buffer()).map(<[u8]>::len), Some(12));
    }

    #[test]
    fn test_gaps_upload_as_restart_index() {
        let mut backend = RecordingBackend::new();
        let mut slab = SlabBuffer::index_buffer(&mut backend, 8).unwrap();
        let cache = slab.cache_mut();
        let a = cache.request_block(2).unwrap();
        let b = cache.request_block(1).unwrap();
        cache.set(a, "idx", 3u32).unwrap();
        cache.set(b, "idx", 4u32).unwrap();
        cache.release(a, Some(&u32::MAX.to_ne_bytes())).unwrap();

        slab.sync(&mut backend);
        let uploaded = backend.contents(slab.buffer()).unwrap();
        let words: Vec<u32> = uploaded
            .chunks_exact(4)
            .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(words, vec![u32::MAX, u32::MAX, 4]);
    }

    #[test]
    fn test_draw_calls_follow_runs() {
        let mut backend = RecordingBackend::new();
        let mut slab = SlabBuffer::index_buffer(&mut backend, 4).unwrap();
        let block = slab.cache_mut().request_block(2).unwrap();
        slab.cache_mut().request_block(2).unwrap();
        backend.clear_calls();

        slab.draw_block_indexed(&mut backend, block, Primitive::Lines).unwrap();
        assert_eq!(
            backend.calls().last(),
            Some(&BackendCall::DrawIndexed {
                primitive: Primitive::Lines,
                count: 2,
                index_type: IndexType::U32,
                byte_offset: 0,
            })
        );

        slab.draw_active_indexed(&mut backend, Primitive::Lines).unwrap();
        assert_eq!(backend.draw_count(), 2);
    }

    #[test]
    fn test_vertex_buffer_rejects_indexed_draw() {
        let mut backend = RecordingBackend::new();
        let layout = RecordLayout::new([FieldDesc::new("position", FieldType::F32, 4)]).unwrap();
        let mut slab = SlabBuffer::new(
            &mut backend,
            layout,
            4,
            BufferTarget::Array,
            BufferUsage::StreamDraw,
        );
        let block = slab.cache_mut().request_block(3).unwrap();

        assert!(matches!(
            slab.draw_block_indexed(&mut backend, block, Primitive::Points),
            Err(SlabError::InvalidLayout(_))
        ));
        slab.draw_block_arrays(&mut backend, block, Primitive::Points).unwrap();
        assert_eq!(
            backend.calls().last(),
            Some(&BackendCall::DrawArrays {
                primitive: Primitive::Points,
                first: 0,
                count: 3,
            })
        );
    }

    fn vertex_slab(backend: &mut RecordingBackend, capacity: usize) -> SlabBuffer<RecordingBackend> {
        let layout = RecordLayout::new([FieldDesc::new("position", FieldType::F32, 4)]).unwrap();
        SlabBuffer::new(backend, layout, capacity, BufferTarget::Array, BufferUsage::DynamicDraw)
    }

    #[test]
    fn test_repacked_triangle_draws_whole() {
        let mut backend = RecordingBackend::new();
        let mut slab = vertex_slab(&mut backend, 8);
        let cache = slab.cache_mut();
        let a = cache.request_block(1).unwrap();
        let _b = cache.request_block(2).unwrap();
        let triangle = cache.request_block(3).unwrap();

        // A one-record gap must not split the triangle
        cache.release_and_repack(a, None).unwrap();
        backend.clear_calls();
        slab.draw_block_arrays(&mut backend, triangle, Primitive::Triangles).unwrap();
        assert_eq!(
            backend.calls(),
            &[BackendCall::DrawArrays {
                primitive: Primitive::Triangles,
                first: 3,
                count: 3,
            }]
        );
    }

    #[test]
    fn test_triangle_moved_into_gap_draws_whole() {
        let mut backend = RecordingBackend::new();
        let mut slab = vertex_slab(&mut backend, 8);
        let cache = slab.cache_mut();
        let a = cache.request_block(3).unwrap();
        let _b = cache.request_block(2).unwrap();
        let triangle = cache.request_block(3).unwrap();

        let relocation = cache.release_and_repack(a, None).unwrap().unwrap();
        assert_eq!(relocation.new, vec![0..3]);
        backend.clear_calls();
        slab.draw_block_arrays(&mut backend, triangle, Primitive::Triangles).unwrap();
        assert_eq!(
            backend.calls(),
            &[BackendCall::DrawArrays {
                primitive: Primitive::Triangles,
                first: 0,
                count: 3,
            }]
        );
    }

    #[test]
    fn test_split_block_refuses_partial_primitives() {
        let mut backend = RecordingBackend::new();
        let mut slab = SlabBuffer::index_buffer(&mut backend, 8).unwrap();
        let cache = slab.cache_mut();
        let blocks: Vec<_> = (0..8).map(|_| cache.request_block(1).unwrap()).collect();
        cache.release(blocks[1], None).unwrap();
        cache.release(blocks[2], None).unwrap();
        cache.release(blocks[6], None).unwrap();
        let split = cache.request_block(3).unwrap();
        assert_eq!(slab.cache().block_runs(split).unwrap(), &[1..3, 6..7]);
        backend.clear_calls();

        assert_eq!(
            slab.draw_block_indexed(&mut backend, split, Primitive::Triangles),
            Err(SlabError::SplitPrimitive {
                block: split,
                runs: 2,
                primitive: Primitive::Triangles,
            })
        );
        assert!(slab.draw_block_indexed(&mut backend, split, Primitive::TriangleStrip).is_err());
        assert_eq!(backend.draw_count(), 0);

        // Points never straddle a run boundary
        slab.draw_block_indexed(&mut backend, split, Primitive::Points).unwrap();
        assert_eq!(backend.draw_count(), 2);
        slab.draw_active_indexed(&mut backend, Primitive::Triangles).unwrap();
        assert_eq!(backend.draw_count(), 3);
    }

    #[test]
    fn test_split_block_of_whole_lines_draws_per_run() {
        let mut backend = RecordingBackend::new();
        let mut slab = SlabBuffer::index_buffer(&mut backend, 8).unwrap();
        let cache = slab.cache_mut();
        let blocks: Vec<_> = (0..4).map(|_| cache.request_block(2).unwrap()).collect();
        cache.release(blocks[0], None).unwrap();
        cache.release(blocks[2], None).unwrap();
        let split = cache.request_block(4).unwrap();
        assert_eq!(slab.cache().block_runs(split).unwrap(), &[0..2, 4..6]);
        backend.clear_calls();

        slab.draw_block_indexed(&mut backend, split, Primitive::Lines).unwrap();
        assert_eq!(backend.draw_count(), 2);
    }
}
