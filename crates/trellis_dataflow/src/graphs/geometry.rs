// SPDX-License-Identifier: MIT OR Apache-2.0
//! Geometry nodes feeding vertex data into slabs.
//!
//! Matrices are column-major: `m[column][row]`.

use crate::evaluation::{CalcContext, EvaluationError};
use crate::node::{NodeBehavior, NodeCategory, NodeRegistry, NodeType};
use crate::port::{PortSpec, PortType, PortValue};

/// Identity matrix
pub const IDENTITY: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Multiply a column-major matrix with a column vector
pub fn transform_point(m: &[[f32; 4]; 4], p: [f32; 4]) -> [f32; 4] {
    let mut out = [0.0; 4];
    for (row, value) in out.iter_mut().enumerate() {
        *value = (0..4).map(|col| m[col][row] * p[col]).sum();
    }
    out
}

/// Builds a translation matrix from an offset
#[derive(Debug, Default)]
pub struct Translation;

impl Translation {
    /// Port schema
    pub fn node_type() -> NodeType {
        NodeType {
            id: "translation".to_string(),
            name: "Translation".to_string(),
            category: NodeCategory::Geometry,
            description: "Translation matrix from an offset".to_string(),
            inputs: vec![PortSpec::input("offset", PortType::Vector3)
                .with_default(PortValue::Vector3([0.0; 3]))],
            outputs: vec![PortSpec::output("matrix", PortType::Mat4)],
        }
    }
}

impl NodeBehavior for Translation {
    fn calculate(&mut self, ctx: &mut CalcContext<'_>) -> Result<(), EvaluationError> {
        let [x, y, z] = match ctx.input("offset")? {
            PortValue::Vector3(offset) => *offset,
            _ => {
                return Err(EvaluationError::TypeMismatch {
                    port: "offset".to_string(),
                    expected: PortType::Vector3,
                })
            }
        };
        let mut matrix = IDENTITY;
        matrix[3] = [x, y, z, 1.0];
        ctx.set_output("matrix", PortValue::Mat4(matrix))
    }
}

/// Applies a matrix to every point of a list
#[derive(Debug, Default)]
pub struct Transform;

impl Transform {
    /// Port schema
    pub fn node_type() -> NodeType {
        NodeType {
            id: "transform".to_string(),
            name: "Transform".to_string(),
            category: NodeCategory::Geometry,
            description: "Transform homogeneous points by a matrix".to_string(),
            inputs: vec![
                PortSpec::input("matrix", PortType::Mat4).with_default(PortValue::Mat4(IDENTITY)),
                PortSpec::input("points", PortType::Vector4List)
                    .with_default(PortValue::Vector4List(Vec::new())),
            ],
            outputs: vec![PortSpec::output("points", PortType::Vector4List)],
        }
    }
}

impl NodeBehavior for Transform {
    fn calculate(&mut self, ctx: &mut CalcContext<'_>) -> Result<(), EvaluationError> {
        let matrix = ctx.mat4("matrix")?;
        let points = ctx
            .vector4_list("points")?
            .iter()
            .map(|&p| transform_point(&matrix, p))
            .collect();
        ctx.set_output("points", PortValue::Vector4List(points))
    }
}

/// Linear blend between two colors
#[derive(Debug, Default)]
pub struct ColorMix;

impl ColorMix {
    /// Port schema
    pub fn node_type() -> NodeType {
        NodeType {
            id: "color_mix".to_string(),
            name: "Color Mix".to_string(),
            category: NodeCategory::Geometry,
            description: "Blend two colors by a factor".to_string(),
            inputs: vec![
                PortSpec::input("a", PortType::Color).with_default(PortValue::Color([0.0, 0.0, 0.0, 1.0])),
                PortSpec::input("b", PortType::Color).with_default(PortValue::Color([1.0; 4])),
                PortSpec::input("factor", PortType::Float).with_default(PortValue::Float(0.5)),
            ],
            outputs: vec![PortSpec::output("color", PortType::Color)],
        }
    }
}

impl NodeBehavior for ColorMix {
    fn calculate(&mut self, ctx: &mut CalcContext<'_>) -> Result<(), EvaluationError> {
        let a = ctx.vector4("a")?;
        let b = ctx.vector4("b")?;
        let t = ctx.float("factor")?.clamp(0.0, 1.0);
        let mixed = std::array::from_fn(|i| a[i] + (b[i] - a[i]) * t);
        ctx.set_output("color", PortValue::Color(mixed))
    }
}

/// Flattens points into a float list laid out for a vertex slab
#[derive(Debug, Default)]
pub struct Flatten;

impl Flatten {
    /// Port schema
    pub fn node_type() -> NodeType {
        NodeType {
            id: "flatten".to_string(),
            name: "Flatten".to_string(),
            category: NodeCategory::Utility,
            description: "Flatten a point list into floats".to_string(),
            inputs: vec![PortSpec::input("points", PortType::Vector4List)
                .with_default(PortValue::Vector4List(Vec::new()))],
            outputs: vec![PortSpec::output("floats", PortType::FloatList)],
        }
    }
}

impl NodeBehavior for Flatten {
    fn calculate(&mut self, ctx: &mut CalcContext<'_>) -> Result<(), EvaluationError> {
        let floats = ctx.vector4_list("points")?.iter().flatten().copied().collect();
        ctx.set_output("floats", PortValue::FloatList(floats))
    }
}

/// Create the geometry node registry
pub fn create_geometry_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    registry.register_default::<Translation>(Translation::node_type());
    registry.register_default::<Transform>(Transform::node_type());
    registry.register_default::<ColorMix>(ColorMix::node_type());
    registry.register_default::<Flatten>(Flatten::node_type());
    registry
}
