// SPDX-License-Identifier: MIT OR Apache-2.0
//! The minimal buffer-object API the slab needs from a graphics binding.
//!
//! Window and context creation live outside this crate. A binding only has
//! to create buffers, bind and fill them, and issue draw calls.

use crate::layout::FieldType;
use serde::{Deserialize, Serialize};

/// Binding point of a buffer object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferTarget {
    /// Vertex attribute data
    Array,
    /// Index data
    ElementArray,
}

/// Expected update frequency of a buffer's contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferUsage {
    /// Written once, drawn many times
    StaticDraw,
    /// Rewritten often, drawn many times
    DynamicDraw,
    /// Rewritten every frame
    StreamDraw,
}

/// Primitive assembly mode of a draw call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Primitive {
    /// Individual points
    Points,
    /// Independent line segments
    Lines,
    /// Connected line strip
    LineStrip,
    /// Independent triangles
    Triangles,
    /// Connected triangle strip
    TriangleStrip,
}

impl Primitive {
    /// Vertices consumed per primitive for list modes; `None` for strips
    pub fn vertices_per_primitive(&self) -> Option<usize> {
        match self {
            Self::Points => Some(1),
            Self::Lines => Some(2),
            Self::Triangles => Some(3),
            Self::LineStrip | Self::TriangleStrip => None,
        }
    }
}

/// Component type of an index buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexType {
    /// 8-bit indices
    U8,
    /// 16-bit indices
    U16,
    /// 32-bit indices
    U32,
}

impl IndexType {
    /// Index type matching an index field, if the field type can index
    pub fn from_field(ty: FieldType) -> Option<Self> {
        match ty {
            FieldType::U8 => Some(Self::U8),
            FieldType::U16 => Some(Self::U16),
            FieldType::U32 => Some(Self::U32),
            FieldType::I32 | FieldType::F32 => None,
        }
    }

    /// Primitive-restart sentinel for this index type
    pub fn restart_index(&self) -> u32 {
        match self {
            Self::U8 => u8::MAX as u32,
            Self::U16 => u16::MAX as u32,
            Self::U32 => u32::MAX,
        }
    }
}

/// Buffer-object services consumed by [`crate::gpu_buffer::SlabBuffer`]
///
/// All calls must happen on the thread that currently holds the graphics
/// context.
pub trait GraphicsBackend {
    /// Backend buffer handle
    type Buffer: Copy + std::fmt::Debug;

    /// Create a new, empty buffer object
    fn create_buffer(&mut self) -> Self::Buffer;

    /// Bind `buffer` to `target`
    fn bind(&mut self, buffer: Self::Buffer, target: BufferTarget);

    /// Replace the contents of `buffer` with `bytes`
    fn upload(&mut self, buffer: Self::Buffer, target: BufferTarget, bytes: &[u8], usage: BufferUsage);

    /// Draw `count` indices starting `byte_offset` bytes into the bound index buffer
    fn draw_indexed(&mut self, primitive: Primitive, count: usize, index_type: IndexType, byte_offset: usize);

    /// Draw `count` vertices starting at vertex `first`
    fn draw_arrays(&mut self, primitive: Primitive, first: usize, count: usize);
}

/// Handle type of [`RecordingBackend`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordedBuffer(pub u32);

/// One call made against a [`RecordingBackend`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    /// `create_buffer`
    CreateBuffer(RecordedBuffer),
    /// `bind`
    Bind(RecordedBuffer, BufferTarget),
    /// `upload`, with the byte length
    Upload(RecordedBuffer, BufferTarget, usize, BufferUsage),
    /// `draw_indexed`
    DrawIndexed {
        /// Primitive mode
        primitive: Primitive,
        /// Index count
        count: usize,
        /// Index type
        index_type: IndexType,
        /// Byte offset into the index buffer
        byte_offset: usize,
    },
    /// `draw_arrays`
    DrawArrays {
        /// Primitive mode
        primitive: Primitive,
        /// First vertex
        first: usize,
        /// Vertex count
        count: usize,
    },
}

/// In-memory backend that records calls and keeps uploaded bytes
#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Vec<BackendCall>,
    contents: Vec<Vec<u8>>,
}

impl RecordingBackend {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call made so far, oldest first
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    /// Last bytes uploaded to `buffer`
    pub fn contents(&self, buffer: RecordedBuffer) -> Option<&[u8]> {
        self.contents.get(buffer.0 as usize).map(Vec::as_slice)
    }

    /// Total bytes uploaded across all buffers
    pub fn uploaded_bytes(&self) -> usize {
        self.calls
            .iter()
            .map(|call| match call {
                BackendCall::Upload(_, _, len, _) => *len,
                _ => 0,
            })
            .sum()
    }

    /// Number of draw calls issued
    pub fn draw_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, BackendCall::DrawIndexed { .. } | BackendCall::DrawArrays { .. }))
            .count()
    }

    /// Forget recorded calls, keeping buffer contents
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl GraphicsBackend for RecordingBackend {
    type Buffer = RecordedBuffer;

    fn create_buffer(&mut self) -> RecordedBuffer {
        let buffer = RecordedBuffer(self.contents.len() as u32);
        self.contents.push(Vec::new());
        self.calls.push(BackendCall::CreateBuffer(buffer));
        buffer
    }

    fn bind(&mut self, buffer: RecordedBuffer, target: BufferTarget) {
        self.calls.push(BackendCall::Bind(buffer, target));
    }

    fn upload(&mut self, buffer: RecordedBuffer, target: BufferTarget, bytes: &[u8], usage: BufferUsage) {
        if let Some(contents) = self.contents.get_mut(buffer.0 as usize) {
            contents.clear();
            contents.extend_from_slice(bytes);
        }
        self.calls.push(BackendCall::Upload(buffer, target, bytes.len(), usage));
    }

    fn draw_indexed(&mut self, primitive: Primitive, count: usize, index_type: IndexType, byte_offset: usize) {
        self.calls.push(BackendCall::DrawIndexed {
            primitive,
            count,
            index_type,
            byte_offset,
        });
    }

    fn draw_arrays(&mut self, primitive: Primitive, first: usize, count: usize) {
        self.calls.push(BackendCall::DrawArrays {
            primitive,
            first,
            count,
        });
    }
}
