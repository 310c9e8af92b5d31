// SPDX-License-Identifier: MIT OR Apache-2.0
//! Demo pipeline: a dataflow graph computes quad geometry and a shared
//! color, the values land in a vertex slab, and an index slab references
//! the vertices. Both slabs are synced to a recording backend and drawn.

use crate::error::BenchError;
use crate::settings::DemoSettings;
use trellis_dataflow::graphs::{create_geometry_registry, create_math_registry};
use trellis_dataflow::{ConnectOutcome, Graph, NodeId, NodeRegistry, PortId, PortValue};
use trellis_slab::{
    BlockId, BufferTarget, BufferUsage, ContextLock, IndexType, Primitive, RecordLayout,
    RecordingBackend, SlabBuffer,
};

/// Unit quad corners as homogeneous points
const QUAD: [[f32; 4]; 4] = [
    [0.0, 0.0, 0.0, 1.0],
    [1.0, 0.0, 0.0, 1.0],
    [1.0, 1.0, 0.0, 1.0],
    [0.0, 1.0, 0.0, 1.0],
];

/// Two triangles over the quad corners
const QUAD_INDICES: [usize; 6] = [0, 1, 2, 2, 3, 0];

#[derive(Debug)]
struct Shape {
    nodes: [NodeId; 3],
    floats: PortId,
    vertices: BlockId,
    indices: BlockId,
}

/// What the demo did
#[derive(Debug, Clone, Default)]
pub struct DemoSummary {
    /// Quads still drawn at the end
    pub shapes: usize,
    /// Buffer uploads issued
    pub uploads: usize,
    /// Bytes uploaded over all syncs
    pub uploaded_bytes: usize,
    /// Draw calls issued
    pub draw_calls: usize,
    /// `calculate` runs across the graph
    pub calculations: u64,
    /// Vertex records uploaded after the last sync
    pub vertex_active_size: usize,
    /// Vertices moved when a quad was removed
    pub relocated_vertices: usize,
}

/// Graph, slabs and backend of the demo scene
pub struct Demo {
    graph: Graph,
    registry: NodeRegistry,
    mix: NodeId,
    color: PortId,
    backend: RecordingBackend,
    context: ContextLock,
    vertices: SlabBuffer<RecordingBackend>,
    indices: SlabBuffer<RecordingBackend>,
    shapes: Vec<Shape>,
    summary: DemoSummary,
}

impl Demo {
    /// Build the graph and allocate one vertex block and one index block per quad
    pub fn new(settings: &DemoSettings) -> Result<Self, BenchError> {
        let mut registry = create_math_registry();
        registry.extend(create_geometry_registry());
        let mut graph = Graph::new("demo");
        let mix = add(&mut graph, &registry, "color_mix")?;
        let color = output(&graph, mix, "color")?;

        let mut backend = RecordingBackend::new();
        let layout = RecordLayout::new(settings.vertex_fields.clone())?;
        let vertices = SlabBuffer::new(
            &mut backend,
            layout,
            settings.initial_capacity,
            BufferTarget::Array,
            BufferUsage::DynamicDraw,
        );
        let indices = SlabBuffer::index_buffer(&mut backend, settings.initial_capacity)?;

        let mut demo = Self {
            graph,
            registry,
            mix,
            color,
            backend,
            context: ContextLock::new(),
            vertices,
            indices,
            shapes: Vec::with_capacity(settings.shapes),
            summary: DemoSummary::default(),
        };
        for i in 0..settings.shapes {
            demo.add_shape([i as f32 * settings.spacing, 0.0, 0.0])?;
        }
        Ok(demo)
    }

    fn add_shape(&mut self, offset: [f32; 3]) -> Result<(), BenchError> {
        let graph = &mut self.graph;
        let translation = add(graph, &self.registry, "translation")?;
        let transform = add(graph, &self.registry, "transform")?;
        let flatten = add(graph, &self.registry, "flatten")?;

        graph.set_raw(input(graph, translation, "offset")?, PortValue::Vector3(offset))?;
        graph.set_raw(input(graph, transform, "points")?, PortValue::Vector4List(QUAD.to_vec()))?;
        let (matrix_out, matrix_in) = (output(graph, translation, "matrix")?, input(graph, transform, "matrix")?);
        connect(graph, matrix_out, matrix_in)?;
        let (points_out, points_in) = (output(graph, transform, "points")?, input(graph, flatten, "points")?);
        connect(graph, points_out, points_in)?;

        let shape = Shape {
            nodes: [translation, transform, flatten],
            floats: output(graph, flatten, "floats")?,
            vertices: self.vertices.cache_mut().request_block(QUAD.len())?,
            indices: self.indices.cache_mut().request_block(QUAD_INDICES.len())?,
        };
        self.write_positions(&shape)?;
        self.write_indices(&shape)?;
        self.shapes.push(shape);
        Ok(())
    }

    fn write_positions(&mut self, shape: &Shape) -> Result<(), BenchError> {
        let positions: Vec<[f32; 4]> = match self.graph.get(shape.floats)? {
            PortValue::FloatList(floats) => floats
                .chunks_exact(4)
                .map(|c| [c[0], c[1], c[2], c[3]])
                .collect(),
            _ => vec![[0.0; 4]; QUAD.len()],
        };
        self.vertices
            .cache_mut()
            .set_each(shape.vertices, "position", &positions)?;
        Ok(())
    }

    fn write_indices(&mut self, shape: &Shape) -> Result<(), BenchError> {
        let owned = self.vertices.cache().block_indices(shape.vertices)?;
        let values: Vec<u32> = QUAD_INDICES.iter().map(|&corner| owned[corner] as u32).collect();
        self.indices.cache_mut().set_each(shape.indices, "idx", &values)?;
        Ok(())
    }

    /// Recompute the shared color, write it to every quad, sync and draw
    pub fn frame(&mut self, factor: f32) -> Result<(), BenchError> {
        let factor_port = input(&self.graph, self.mix, "factor")?;
        self.graph.set_raw(factor_port, PortValue::Float(factor))?;
        let color = self.graph.get(self.color)?.as_vector4().unwrap_or([0.0; 4]);

        let cache = self.vertices.cache_mut();
        for shape in &self.shapes {
            cache.set(shape.vertices, "color", color)?;
        }
        self.present()
    }

    /// Sync both slabs and draw every quad while holding the context
    pub fn present(&mut self) -> Result<(), BenchError> {
        let _context = self.context.acquire();
        for slab in [&mut self.vertices, &mut self.indices] {
            if slab.sync(&mut self.backend) {
                self.summary.uploads += 1;
            }
        }
        for shape in &self.shapes {
            self.indices
                .draw_block_indexed(&mut self.backend, shape.indices, Primitive::Triangles)?;
        }
        Ok(())
    }

    /// Remove a quad, compact the vertex slab and patch the moved quad's indices
    pub fn remove_shape(&mut self, position: usize) -> Result<(), BenchError> {
        if position >= self.shapes.len() {
            return Err(BenchError::Missing(format!("shape {position}")));
        }
        let shape = self.shapes.remove(position);
        for node in shape.nodes {
            self.graph.remove_node(node);
        }

        let restart = IndexType::U32.restart_index();
        self.indices
            .cache_mut()
            .release(shape.indices, Some(bytemuck::bytes_of(&restart)))?;

        let Some(relocation) = self.vertices.cache_mut().release_and_repack(shape.vertices, None)? else {
            return Ok(());
        };
        self.summary.relocated_vertices += relocation.pairs().count();

        let Some(moved) = self.shapes.iter().find(|s| s.vertices == relocation.block) else {
            return Ok(());
        };
        let indices = self.indices.cache_mut();
        let patched: Vec<u32> = indices
            .get::<u32>(moved.indices, "idx")?
            .into_iter()
            .map(|old| {
                relocation
                    .pairs()
                    .find(|&(from, _)| from == old as usize)
                    .map_or(old, |(_, to)| to as u32)
            })
            .collect();
        indices.set_each(moved.indices, "idx", &patched)?;
        Ok(())
    }

    /// Totals so far
    pub fn summary(&self) -> DemoSummary {
        DemoSummary {
            shapes: self.shapes.len(),
            uploaded_bytes: self.backend.uploaded_bytes(),
            draw_calls: self.backend.draw_count(),
            calculations: self.graph.nodes().map(|node| node.calculations()).sum(),
            vertex_active_size: self.vertices.uploaded_bytes() / self.vertices.cache().record_size(),
            ..self.summary.clone()
        }
    }
}

/// Run the demo: animate the color, then drop the first quad and redraw
pub fn run(settings: &DemoSettings) -> Result<DemoSummary, BenchError> {
    let mut demo = Demo::new(settings)?;
    let frames = settings.frames.max(1);
    for frame in 0..frames {
        demo.frame(frame as f32 / frames as f32)?;
    }
    if !demo.shapes.is_empty() {
        demo.remove_shape(0)?;
        demo.present()?;
    }
    Ok(demo.summary())
}

fn add(graph: &mut Graph, registry: &NodeRegistry, type_id: &str) -> Result<NodeId, BenchError> {
    graph
        .add_from_registry(registry, type_id)
        .ok_or_else(|| BenchError::Missing(type_id.to_string()))
}

fn input(graph: &Graph, node: NodeId, name: &str) -> Result<PortId, BenchError> {
    graph
        .input(node, name)
        .ok_or_else(|| BenchError::Missing(format!("{node}.{name}")))
}

fn output(graph: &Graph, node: NodeId, name: &str) -> Result<PortId, BenchError> {
    graph
        .output(node, name)
        .ok_or_else(|| BenchError::Missing(format!("{node}.{name}")))
}

fn connect(graph: &mut Graph, from: PortId, to: PortId) -> Result<(), BenchError> {
    match graph.connect(from, to)? {
        ConnectOutcome::Connected => Ok(()),
        ConnectOutcome::CycleRejected => Err(BenchError::Missing(format!("connection {from} -> {to}"))),
    }
}
