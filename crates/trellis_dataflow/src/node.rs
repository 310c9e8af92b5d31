// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the dataflow graph.

use crate::evaluation::{CalcContext, EvaluationError};
use crate::port::{InputSlot, OutputSlot, PortSpec, PortValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Arena handle of a node; ids are never reused within a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Node type category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Input nodes (constants, parameters)
    Input,
    /// Math operations
    Math,
    /// Positions, matrices and colors
    Geometry,
    /// Utility nodes
    Utility,
    /// Custom/user-defined
    Custom,
}

/// Node type definition: the static port schema of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeType {
    /// Unique type identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: String,
    /// Input ports
    pub inputs: Vec<PortSpec>,
    /// Output ports
    pub outputs: Vec<PortSpec>,
}

/// Computation attached to a node.
///
/// `calculate` reads the node's current input values and writes its
/// outputs through the [`CalcContext`]. Outputs left unset read as
/// [`PortValue::Null`]. An `Err` is contained by the graph: the node's
/// outputs become `Null` and the message is kept in its [`NodeStatus`].
pub trait NodeBehavior: fmt::Debug {
    /// Compute outputs from inputs
    fn calculate(&mut self, ctx: &mut CalcContext<'_>) -> Result<(), EvaluationError>;

    /// Whether `calculate` runs when an input holds `Null`.
    ///
    /// Nodes that do not accept `Null` are short-circuited instead: all
    /// outputs become `Null` without calling `calculate`.
    fn accepts_null(&self) -> bool {
        false
    }
}

/// Outcome of the last recomputation of a node
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NodeStatus {
    /// Calculated successfully, or never calculated
    #[default]
    Ok,
    /// Skipped because the named input held `Null`
    NullInput(String),
    /// `calculate` failed; outputs were replaced by `Null`
    Faulted(String),
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::NullInput(port) => write!(f, "null input '{port}'"),
            Self::Faulted(message) => write!(f, "faulted: {message}"),
        }
    }
}

/// A node instance in the graph
#[derive(Debug)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) node_type: NodeType,
    pub(crate) inputs: Vec<InputSlot>,
    pub(crate) outputs: Vec<OutputSlot>,
    pub(crate) behavior: Box<dyn NodeBehavior>,
    pub(crate) fresh: bool,
    pub(crate) distance: u32,
    pub(crate) sequence: u64,
    pub(crate) component: u32,
    pub(crate) status: NodeStatus,
    pub(crate) calculations: u64,
}

impl Node {
    pub(crate) fn new(
        id: NodeId,
        node_type: NodeType,
        behavior: Box<dyn NodeBehavior>,
        sequence: u64,
    ) -> Self {
        let inputs = node_type.inputs.iter().cloned().map(InputSlot::new).collect();
        let outputs = node_type.outputs.iter().cloned().map(OutputSlot::new).collect();
        Self {
            id,
            node_type,
            inputs,
            outputs,
            behavior,
            fresh: false,
            distance: 0,
            sequence,
            component: id.0,
            status: NodeStatus::Ok,
            calculations: 0,
        }
    }

    /// Node ID
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Type definition the node was created from
    pub fn node_type(&self) -> &NodeType {
        &self.node_type
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.node_type.name
    }

    /// Index of the input named `name`
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|slot| slot.spec.name == name)
    }

    /// Index of the output named `name`
    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|slot| slot.spec.name == name)
    }

    /// Cached value of input `index`
    pub fn input_value(&self, index: usize) -> Option<&PortValue> {
        self.inputs.get(index).map(|slot| &slot.value)
    }

    /// Cached value of output `index`, possibly stale
    pub fn output_value(&self, index: usize) -> Option<&PortValue> {
        self.outputs.get(index).map(|slot| &slot.value)
    }

    /// Whether the cached outputs reflect the current inputs
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Topological distance; always greater than that of every upstream node
    pub fn distance(&self) -> u32 {
        self.distance
    }

    /// Status of the last recomputation
    pub fn status(&self) -> &NodeStatus {
        &self.status
    }

    /// Number of times `calculate` has run
    pub fn calculations(&self) -> u64 {
        self.calculations
    }

    /// Nodes feeding this node's inputs, in input order, with duplicates
    pub(crate) fn upstream(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.inputs.iter().filter_map(|slot| slot.source.map(|port| port.node))
    }

    /// Nodes fed by this node's outputs, with duplicates
    pub(crate) fn downstream(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.outputs
            .iter()
            .flat_map(|slot| slot.targets.iter().map(|port| port.node))
    }
}

/// Constructor for the behavior of a registered node type
pub type NodeFactory = Box<dyn Fn() -> Box<dyn NodeBehavior>>;

struct RegisteredType {
    node_type: NodeType,
    factory: NodeFactory,
}

/// Registry of available node types
pub struct NodeRegistry {
    /// Registered node types by ID
    types: IndexMap<String, RegisteredType>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            types: IndexMap::new(),
        }
    }

    /// Register a node type with the factory that builds its behavior
    pub fn register(
        &mut self,
        node_type: NodeType,
        factory: impl Fn() -> Box<dyn NodeBehavior> + 'static,
    ) {
        self.types.insert(
            node_type.id.clone(),
            RegisteredType {
                node_type,
                factory: Box::new(factory),
            },
        );
    }

    /// Register a node type whose behavior is built with `Default`
    pub fn register_default<B: NodeBehavior + Default + 'static>(&mut self, node_type: NodeType) {
        self.register(node_type, || Box::new(B::default()));
    }

    /// Merge all types of `other` into this registry
    pub fn extend(&mut self, other: NodeRegistry) {
        self.types.extend(other.types);
    }

    /// Get a node type by ID
    pub fn get(&self, id: &str) -> Option<&NodeType> {
        self.types.get(id).map(|entry| &entry.node_type)
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.types.values().map(|entry| &entry.node_type)
    }

    /// Get types by category
    pub fn types_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeType> {
        self.types().filter(move |t| t.category == category)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no types are registered
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Build the schema and a fresh behavior for a type ID
    pub fn create(&self, type_id: &str) -> Option<(NodeType, Box<dyn NodeBehavior>)> {
        self.types
            .get(type_id)
            .map(|entry| (entry.node_type.clone(), (entry.factory)()))
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.types.keys()).finish()
    }
}
