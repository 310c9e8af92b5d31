// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

/// Handle to one port of one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortId {
    /// Owning node
    pub node: NodeId,
    /// Input or output side
    pub direction: PortDirection,
    /// Position in the node's input or output list
    pub index: usize,
}

impl PortId {
    /// Handle to input `index` of `node`
    pub fn input(node: NodeId, index: usize) -> Self {
        Self {
            node,
            direction: PortDirection::Input,
            index,
        }
    }

    /// Handle to output `index` of `node`
    pub fn output(node: NodeId, index: usize) -> Self {
        Self {
            node,
            direction: PortDirection::Output,
            index,
        }
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = match self.direction {
            PortDirection::Input => "in",
            PortDirection::Output => "out",
        };
        write!(f, "{}.{}{}", self.node, side, self.index)
    }
}

/// Data type that can flow through ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortType {
    /// Boolean value
    Bool,
    /// Integer value
    Int,
    /// Floating point value
    Float,
    /// 2D vector
    Vector2,
    /// 3D vector
    Vector3,
    /// 4D vector / homogeneous position
    Vector4,
    /// Color (RGBA)
    Color,
    /// Matrix 4x4
    Mat4,
    /// Flat list of floats, ready to be written into a vertex slab
    FloatList,
    /// List of 4D vectors
    Vector4List,
    /// String value
    String,
    /// Any type (for generic nodes)
    Any,
}

impl PortType {
    /// Check if this type can connect to another type
    pub fn can_connect_to(&self, other: &PortType) -> bool {
        // Any type can connect to anything
        if matches!(self, Self::Any) || matches!(other, Self::Any) {
            return true;
        }

        // Same types can always connect
        if self == other {
            return true;
        }

        // Implicit conversions
        matches!(
            (self, other),
            (Self::Int, Self::Float)
                | (Self::Float, Self::Int)
                | (Self::Color, Self::Vector4)
                | (Self::Vector4, Self::Color)
        )
    }
}

/// Value that can be stored in a port
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum PortValue {
    /// No data: an upstream node failed or had no data itself
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f32),
    /// 2D vector
    Vector2([f32; 2]),
    /// 3D vector
    Vector3([f32; 3]),
    /// 4D vector
    Vector4([f32; 4]),
    /// Color
    Color([f32; 4]),
    /// Column-major 4x4 matrix
    Mat4([[f32; 4]; 4]),
    /// Flat float list
    FloatList(Vec<f32>),
    /// List of 4D vectors
    Vector4List(Vec<[f32; 4]>),
    /// String
    String(String),
}

impl PortValue {
    /// Get the port type for this value, `None` for [`PortValue::Null`]
    pub fn port_type(&self) -> Option<PortType> {
        Some(match self {
            Self::Null => return None,
            Self::Bool(_) => PortType::Bool,
            Self::Int(_) => PortType::Int,
            Self::Float(_) => PortType::Float,
            Self::Vector2(_) => PortType::Vector2,
            Self::Vector3(_) => PortType::Vector3,
            Self::Vector4(_) => PortType::Vector4,
            Self::Color(_) => PortType::Color,
            Self::Mat4(_) => PortType::Mat4,
            Self::FloatList(_) => PortType::FloatList,
            Self::Vector4List(_) => PortType::Vector4List,
            Self::String(_) => PortType::String,
        })
    }

    /// Whether this is the no-data marker
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether the value may be stored in a port of type `port_type`
    pub fn fits(&self, port_type: PortType) -> bool {
        self.port_type()
            .map_or(true, |ty| ty.can_connect_to(&port_type))
    }

    /// Numeric view; integers widen to float
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f32),
            _ => None,
        }
    }

    /// Four-component view of vectors and colors
    pub fn as_vector4(&self) -> Option<[f32; 4]> {
        match self {
            Self::Vector4(v) | Self::Color(v) => Some(*v),
            _ => None,
        }
    }
}

/// Static declaration of a port on a node type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSpec {
    /// Port name
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Data type
    pub port_type: PortType,
    /// Default value (for inputs); `Null` when absent
    pub default_value: PortValue,
}

impl PortSpec {
    /// Create a new input port
    pub fn input(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Input,
            port_type,
            default_value: PortValue::Null,
        }
    }

    /// Create a new output port
    pub fn output(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Output,
            port_type,
            default_value: PortValue::Null,
        }
    }

    /// Set the default value
    pub fn with_default(mut self, value: PortValue) -> Self {
        self.default_value = value;
        self
    }
}

/// Live state of an input port
#[derive(Debug, Clone)]
pub(crate) struct InputSlot {
    pub(crate) spec: PortSpec,
    pub(crate) value: PortValue,
    /// Output this input is subscribed to
    pub(crate) source: Option<PortId>,
}

impl InputSlot {
    pub(crate) fn new(spec: PortSpec) -> Self {
        Self {
            value: spec.default_value.clone(),
            spec,
            source: None,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.value = self.spec.default_value.clone();
        self.source = None;
    }
}

/// Live state of an output port
#[derive(Debug, Clone)]
pub(crate) struct OutputSlot {
    pub(crate) spec: PortSpec,
    pub(crate) value: PortValue,
    /// Inputs subscribed to this output, in connection order
    pub(crate) targets: Vec<PortId>,
}

impl OutputSlot {
    pub(crate) fn new(spec: PortSpec) -> Self {
        Self {
            value: PortValue::Null,
            spec,
            targets: Vec::new(),
        }
    }
}
