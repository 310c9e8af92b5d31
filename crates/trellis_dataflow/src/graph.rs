// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph engine: connection bookkeeping and lazy recomputation.
//!
//! Every node carries a fresh/stale flag and a topological distance that is
//! strictly greater than the distance of every node feeding it. Edits mark
//! the edited node and everything downstream stale. Reads pull: the stale
//! ancestors of the read node are recalculated in ascending
//! `(distance, sequence)` order, and each result is pushed straight into
//! the connected inputs.

use crate::connection::{ConnectOutcome, Connection};
use crate::evaluation::{CalcContext, EvaluationError, RecomputeReport};
use crate::node::{Node, NodeBehavior, NodeId, NodeRegistry, NodeStatus, NodeType};
use crate::port::{InputSlot, OutputSlot, PortDirection, PortId, PortType, PortValue};
use indexmap::IndexMap;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet, VecDeque};
use std::fmt::Write as _;
use tracing::{debug, warn};

/// A dataflow graph
#[derive(Debug)]
pub struct Graph {
    /// Graph name
    pub name: String,
    /// Nodes in insertion order
    nodes: IndexMap<NodeId, Node>,
    /// Component label -> member nodes. Components merge on connect and are
    /// never split, so two nodes in one component are not necessarily linked.
    components: IndexMap<u32, Vec<NodeId>>,
    next_id: u32,
    next_sequence: u64,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            components: IndexMap::new(),
            next_id: 0,
            next_sequence: 0,
        }
    }

    /// Add a node to the graph; it starts stale
    pub fn add_node(&mut self, node_type: NodeType, behavior: Box<dyn NodeBehavior>) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        let node = Node::new(id, node_type, behavior, self.next_sequence);
        self.next_sequence += 1;

        debug!(node = %id, node_type = %node.node_type.id, "Added node");
        self.components.insert(node.component, vec![id]);
        self.nodes.insert(id, node);
        id
    }

    /// Add a node built from a registered type
    pub fn add_from_registry(&mut self, registry: &NodeRegistry, type_id: &str) -> Option<NodeId> {
        let (node_type, behavior) = registry.create(type_id)?;
        Some(self.add_node(node_type, behavior))
    }

    /// Remove a node after disconnecting all of its ports
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let node = self.nodes.get(&node_id)?;
        let (inputs, outputs) = (node.inputs.len(), node.outputs.len());
        for index in 0..inputs {
            self.unbind(PortId::input(node_id, index));
        }
        for index in 0..outputs {
            self.reset_targets(PortId::output(node_id, index));
        }

        let node = self.nodes.shift_remove(&node_id)?;
        if let Some(members) = self.components.get_mut(&node.component) {
            members.retain(|&id| id != node_id);
            if members.is_empty() {
                self.components.swap_remove(&node.component);
            }
        }
        debug!(node = %node_id, "Removed node");
        Some(node)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Handle of the input named `name` on `node_id`
    pub fn input(&self, node_id: NodeId, name: &str) -> Option<PortId> {
        let index = self.nodes.get(&node_id)?.input_index(name)?;
        Some(PortId::input(node_id, index))
    }

    /// Handle of the output named `name` on `node_id`
    pub fn output(&self, node_id: NodeId, name: &str) -> Option<PortId> {
        let index = self.nodes.get(&node_id)?.output_index(name)?;
        Some(PortId::output(node_id, index))
    }

    /// All connections, grouped by target node in insertion order
    pub fn connections(&self) -> impl Iterator<Item = Connection> + '_ {
        self.nodes.values().flat_map(|node| {
            node.inputs.iter().enumerate().filter_map(move |(index, slot)| {
                slot.source
                    .map(|from| Connection::new(from, PortId::input(node.id, index)))
            })
        })
    }

    /// Connection feeding an input, if any
    pub fn connection_to(&self, input: PortId) -> Option<Connection> {
        let source = self.input_slot(input).ok()?.source?;
        Some(Connection::new(source, input))
    }

    /// Connections leaving an output, in connection order
    pub fn connections_from(&self, output: PortId) -> Vec<Connection> {
        self.output_slot(output).map_or_else(
            |_| Vec::new(),
            |slot| {
                slot.targets
                    .iter()
                    .map(|&to| Connection::new(output, to))
                    .collect()
            },
        )
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections().count()
    }

    /// Connect an output to an input.
    ///
    /// A connection that would close a cycle is not an error: it is refused
    /// with a warning, [`ConnectOutcome::CycleRejected`] is returned and the
    /// graph is left unchanged. An input already fed by another output is
    /// rebound to the new one.
    pub fn connect(&mut self, from: PortId, to: PortId) -> Result<ConnectOutcome, ConnectionError> {
        if from.direction != PortDirection::Output || to.direction != PortDirection::Input {
            return Err(ConnectionError::Direction { from, to });
        }

        let from_type = self.output_slot(from)?.spec.port_type;
        let to_slot = self.input_slot(to)?;
        let to_type = to_slot.spec.port_type;
        if !from_type.can_connect_to(&to_type) {
            return Err(ConnectionError::IncompatiblePorts {
                from: from_type,
                to: to_type,
            });
        }
        if to_slot.source == Some(from) {
            return Ok(ConnectOutcome::Connected);
        }

        if self.component_of(from.node) == self.component_of(to.node) && self.reaches(to.node, from.node) {
            warn!(%from, %to, graph = %self.name, "Connection refused: it would create a cycle");
            return Ok(ConnectOutcome::CycleRejected);
        }

        self.unbind(to);
        self.union(from.node, to.node);

        let output = self.output_slot_mut(from)?;
        output.targets.push(to);
        let value = output.value.clone();
        let input = self.input_slot_mut(to)?;
        input.source = Some(from);
        input.value = value;

        self.raise_distance(from.node, to.node);
        self.mark_stale(to.node);
        debug!(%from, %to, "Connected");
        Ok(ConnectOutcome::Connected)
    }

    /// Store a value directly in an input, dropping its connection if any.
    ///
    /// `Null` is accepted by every input.
    pub fn set_raw(&mut self, input: PortId, value: PortValue) -> Result<(), ConnectionError> {
        if input.direction != PortDirection::Input {
            return Err(ConnectionError::NotAnInput(input));
        }
        let expected = self.input_slot(input)?.spec.port_type;
        if !value.fits(expected) {
            return Err(ConnectionError::TypeMismatch {
                port: input,
                expected,
                actual: value.port_type(),
            });
        }

        self.unbind(input);
        self.input_slot_mut(input)?.value = value;
        self.mark_stale(input.node);
        Ok(())
    }

    /// Remove the connections of a port and return how many were removed.
    ///
    /// For an input, the incoming connection is removed and the input
    /// returns to its default value. For an output, every outgoing
    /// connection is removed and each downstream input returns to its
    /// default value. An unconnected input keeps its value.
    pub fn disconnect(&mut self, port: PortId) -> Result<usize, ConnectionError> {
        match port.direction {
            PortDirection::Input => {
                if self.input_slot(port)?.source.is_none() {
                    return Ok(0);
                }
                self.unbind(port);
                self.input_slot_mut(port)?.reset();
                self.mark_stale(port.node);
                debug!(%port, "Disconnected input");
                Ok(1)
            }
            PortDirection::Output => {
                self.output_slot(port)?;
                let removed = self.reset_targets(port);
                debug!(%port, removed, "Disconnected output");
                Ok(removed)
            }
        }
    }

    /// Read a port after bringing its node up to date
    pub fn get(&mut self, port: PortId) -> Result<PortValue, EvaluationError> {
        self.recompute_upstream_of(port.node)?;
        self.peek(port).cloned().ok_or(EvaluationError::PortNotFound(port))
    }

    /// Cached value of a port without recomputation
    pub fn peek(&self, port: PortId) -> Option<&PortValue> {
        let node = self.nodes.get(&port.node)?;
        match port.direction {
            PortDirection::Input => node.input_value(port.index),
            PortDirection::Output => node.output_value(port.index),
        }
    }

    /// Recalculate every stale ancestor of `node_id`, the node included.
    ///
    /// Faults are contained per node: a failing node gets `Null` outputs and
    /// a [`NodeStatus::Faulted`] status, and the pass continues.
    pub fn recompute_upstream_of(&mut self, node_id: NodeId) -> Result<RecomputeReport, EvaluationError> {
        if !self.nodes.contains_key(&node_id) {
            return Err(EvaluationError::NodeNotFound(node_id));
        }

        // A fresh node has only fresh ancestors, so the walk stops there
        let mut queue = BinaryHeap::new();
        let mut seen = HashSet::new();
        let mut stack = vec![node_id];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if node.fresh {
                continue;
            }
            queue.push(Reverse((node.distance, node.sequence, id)));
            stack.extend(node.upstream());
        }

        let mut report = RecomputeReport::default();
        while let Some(Reverse((_, _, id))) = queue.pop() {
            self.recompute_node(id, &mut report);
        }

        if !report.is_empty() {
            debug!(
                node = %node_id,
                calculated = report.calculated.len(),
                faulted = report.faulted.len(),
                short_circuited = report.short_circuited.len(),
                "Recomputed upstream"
            );
        }
        Ok(report)
    }

    /// Whether a node's cached outputs are current
    pub fn is_fresh(&self, node_id: NodeId) -> bool {
        self.nodes.get(&node_id).is_some_and(Node::is_fresh)
    }

    /// Status of the last recomputation of a node
    pub fn status(&self, node_id: NodeId) -> Option<&NodeStatus> {
        self.nodes.get(&node_id).map(Node::status)
    }

    /// Topological distance of a node
    pub fn distance(&self, node_id: NodeId) -> Option<u32> {
        self.nodes.get(&node_id).map(Node::distance)
    }

    /// Component label of a node
    pub fn component_of(&self, node_id: NodeId) -> Option<u32> {
        self.nodes.get(&node_id).map(|node| node.component)
    }

    /// Number of tracked components
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// One line per node: id, name, freshness, distance, calculations, status
    pub fn status_report(&self) -> String {
        let mut report = String::new();
        for node in self.nodes.values() {
            let state = if node.fresh { "fresh" } else { "stale" };
            let _ = writeln!(
                report,
                "{} {} [{state}] distance={} calculations={}: {}",
                node.id,
                node.name(),
                node.distance,
                node.calculations,
                node.status,
            );
        }
        report
    }

    fn recompute_node(&mut self, id: NodeId, report: &mut RecomputeReport) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        if node.fresh {
            return;
        }

        let null_input = if node.behavior.accepts_null() {
            None
        } else {
            node.inputs
                .iter()
                .find(|slot| slot.value.is_null())
                .map(|slot| slot.spec.name.clone())
        };

        if let Some(port) = null_input {
            for output in &mut node.outputs {
                output.value = PortValue::Null;
            }
            node.status = NodeStatus::NullInput(port);
            report.short_circuited.push(id);
        } else {
            let mut ctx = CalcContext::new(id, &node.inputs, &mut node.outputs);
            let result = node.behavior.calculate(&mut ctx);
            node.calculations += 1;
            match result {
                Ok(()) => node.status = NodeStatus::Ok,
                Err(err) => {
                    warn!(node = %id, node_type = %node.node_type.id, error = %err, "Node calculation failed");
                    for output in &mut node.outputs {
                        output.value = PortValue::Null;
                    }
                    node.status = NodeStatus::Faulted(err.to_string());
                    report.faulted.push(id);
                }
            }
            report.calculated.push(id);
        }

        node.fresh = true;
        self.push_outputs(id);
    }

    fn push_outputs(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let deliveries: Vec<(PortId, PortValue)> = node
            .outputs
            .iter()
            .flat_map(|slot| slot.targets.iter().map(move |&to| (to, slot.value.clone())))
            .collect();

        for (to, value) in deliveries {
            if let Ok(slot) = self.input_slot_mut(to) {
                slot.value = value;
            }
        }
    }

    /// Detach an input from its source output, keeping its value
    fn unbind(&mut self, input: PortId) {
        let Some(from) = self.input_slot_mut(input).ok().and_then(|slot| slot.source.take()) else {
            return;
        };
        if let Ok(output) = self.output_slot_mut(from) {
            output.targets.retain(|&to| to != input);
        }
    }

    /// Drop every connection leaving an output, resetting the targets
    fn reset_targets(&mut self, output: PortId) -> usize {
        let targets = match self.output_slot_mut(output) {
            Ok(slot) => std::mem::take(&mut slot.targets),
            Err(_) => return 0,
        };
        for &to in &targets {
            if let Ok(slot) = self.input_slot_mut(to) {
                slot.reset();
            }
            self.mark_stale(to.node);
        }
        targets.len()
    }

    /// Whether `goal` is reachable from `start` along connections
    fn reaches(&self, start: NodeId, goal: NodeId) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if id == goal {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.downstream());
            }
        }
        false
    }

    /// Relabel the smaller component into the larger one
    fn union(&mut self, a: NodeId, b: NodeId) {
        let (Some(ca), Some(cb)) = (self.component_of(a), self.component_of(b)) else {
            return;
        };
        if ca == cb {
            return;
        }

        let size = |label: u32| self.components.get(&label).map_or(0, Vec::len);
        let (keep, absorb) = if size(ca) >= size(cb) { (ca, cb) } else { (cb, ca) };
        let moved = self.components.swap_remove(&absorb).unwrap_or_default();
        for id in &moved {
            if let Some(node) = self.nodes.get_mut(id) {
                node.component = keep;
            }
        }
        self.components.entry(keep).or_default().extend(moved);
    }

    /// Ensure `to` sits below `from`, pushing the increase downstream
    fn raise_distance(&mut self, from: NodeId, to: NodeId) {
        let Some(base) = self.nodes.get(&from).map(|node| node.distance) else {
            return;
        };
        let mut queue = VecDeque::from([(to, base + 1)]);
        while let Some((id, needed)) = queue.pop_front() {
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            if node.distance >= needed {
                continue;
            }
            node.distance = needed;
            queue.extend(node.downstream().map(|child| (child, needed + 1)));
        }
    }

    /// Mark a node and everything downstream of it stale
    fn mark_stale(&mut self, start: NodeId) {
        let mut seen = HashSet::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get_mut(&id) {
                node.fresh = false;
                stack.extend(node.downstream());
            }
        }
    }

    fn input_slot(&self, port: PortId) -> Result<&InputSlot, ConnectionError> {
        self.nodes
            .get(&port.node)
            .ok_or(ConnectionError::NodeNotFound(port.node))?
            .inputs
            .get(port.index)
            .ok_or(ConnectionError::PortNotFound(port))
    }

    fn input_slot_mut(&mut self, port: PortId) -> Result<&mut InputSlot, ConnectionError> {
        self.nodes
            .get_mut(&port.node)
            .ok_or(ConnectionError::NodeNotFound(port.node))?
            .inputs
            .get_mut(port.index)
            .ok_or(ConnectionError::PortNotFound(port))
    }

    fn output_slot(&self, port: PortId) -> Result<&OutputSlot, ConnectionError> {
        self.nodes
            .get(&port.node)
            .ok_or(ConnectionError::NodeNotFound(port.node))?
            .outputs
            .get(port.index)
            .ok_or(ConnectionError::PortNotFound(port))
    }

    fn output_slot_mut(&mut self, port: PortId) -> Result<&mut OutputSlot, ConnectionError> {
        self.nodes
            .get_mut(&port.node)
            .ok_or(ConnectionError::NodeNotFound(port.node))?
            .outputs
            .get_mut(port.index)
            .ok_or(ConnectionError::PortNotFound(port))
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Error when editing connections or raw input values
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectionError {
    /// Connections must run from an output to an input
    #[error("Connections run from an output to an input, got {from} -> {to}")]
    Direction {
        /// Requested source port
        from: PortId,
        /// Requested target port
        to: PortId,
    },

    /// Raw values can only be stored in inputs
    #[error("Port is not an input: {0}")]
    NotAnInput(PortId),

    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(PortId),

    /// Incompatible port types
    #[error("Incompatible port types: {from:?} -> {to:?}")]
    IncompatiblePorts {
        /// Output type
        from: PortType,
        /// Input type
        to: PortType,
    },

    /// Raw value does not fit the input type
    #[error("Value of type {actual:?} does not fit {port} of type {expected:?}")]
    TypeMismatch {
        /// Target input
        port: PortId,
        /// Declared input type
        expected: PortType,
        /// Type of the rejected value
        actual: Option<PortType>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphs::math::{Add, Divide, Negate};

    fn add(graph: &mut Graph) -> NodeId {
        graph.add_node(Add::node_type(), Box::new(Add))
    }

    fn port(graph: &Graph, node: NodeId, name: &str) -> PortId {
        graph
            .input(node, name)
            .or_else(|| graph.output(node, name))
            .unwrap()
    }

    #[test]
    fn test_direction_error() {
        let mut graph = Graph::default();
        let n1 = add(&mut graph);
        let n2 = add(&mut graph);
        let a1 = port(&graph, n1, "a");
        let a2 = port(&graph, n2, "a");
        let sum2 = port(&graph, n2, "sum");

        assert_eq!(
            graph.connect(a1, a2),
            Err(ConnectionError::Direction { from: a1, to: a2 })
        );
        assert!(matches!(
            graph.connect(a1, sum2),
            Err(ConnectionError::Direction { .. })
        ));
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn test_self_loop_rejected() {
        let mut graph = Graph::default();
        let n = add(&mut graph);
        let outcome = graph.connect(port(&graph, n, "sum"), port(&graph, n, "a")).unwrap();
        assert_eq!(outcome, ConnectOutcome::CycleRejected);
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn test_incompatible_ports() {
        let mut graph = Graph::default();
        let n = add(&mut graph);
        let text = graph.add_node(
            NodeType {
                id: "label".into(),
                name: "Label".into(),
                category: crate::node::NodeCategory::Utility,
                description: String::new(),
                inputs: vec![],
                outputs: vec![crate::port::PortSpec::output("text", PortType::String)],
            },
            Box::new(Negate),
        );
        let result = graph.connect(port(&graph, text, "text"), port(&graph, n, "a"));
        assert_eq!(
            result,
            Err(ConnectionError::IncompatiblePorts {
                from: PortType::String,
                to: PortType::Float,
            })
        );
    }

    #[test]
    fn test_set_raw_type_checked() {
        let mut graph = Graph::default();
        let n = add(&mut graph);
        let a = port(&graph, n, "a");

        assert!(graph.set_raw(a, PortValue::Int(2)).is_ok());
        assert!(graph.set_raw(a, PortValue::Null).is_ok());
        assert!(matches!(
            graph.set_raw(a, PortValue::Vector3([0.0; 3])),
            Err(ConnectionError::TypeMismatch { actual: Some(PortType::Vector3), .. })
        ));
        assert_eq!(
            graph.set_raw(port(&graph, n, "sum"), PortValue::Float(1.0)),
            Err(ConnectionError::NotAnInput(PortId::output(n, 0)))
        );
    }

    #[test]
    fn test_components_merge_smaller_into_larger() {
        let mut graph = Graph::default();
        let nodes: Vec<_> = (0..4).map(|_| add(&mut graph)).collect();
        assert_eq!(graph.component_count(), 4);

        graph.connect(port(&graph, nodes[0], "sum"), port(&graph, nodes[1], "a")).unwrap();
        graph.connect(port(&graph, nodes[1], "sum"), port(&graph, nodes[2], "a")).unwrap();
        assert_eq!(graph.component_count(), 2);

        let big = graph.component_of(nodes[0]).unwrap();
        graph.connect(port(&graph, nodes[3], "sum"), port(&graph, nodes[2], "b")).unwrap();
        assert_eq!(graph.component_count(), 1);
        assert!(nodes.iter().all(|&n| graph.component_of(n) == Some(big)));

        // Components are not split on disconnect
        graph.disconnect(port(&graph, nodes[3], "sum")).unwrap();
        assert_eq!(graph.component_count(), 1);
    }

    #[test]
    fn test_component_labels_survive_reordering() {
        let mut graph = Graph::default();
        let nodes: Vec<_> = (0..6).map(|_| add(&mut graph)).collect();

        // Absorb components from the front, middle and back of the map
        graph.connect(port(&graph, nodes[5], "sum"), port(&graph, nodes[0], "a")).unwrap();
        graph.connect(port(&graph, nodes[2], "sum"), port(&graph, nodes[3], "a")).unwrap();
        graph.remove_node(nodes[1]);
        assert_eq!(graph.component_count(), 3);

        graph.connect(port(&graph, nodes[0], "sum"), port(&graph, nodes[2], "b")).unwrap();
        assert_eq!(graph.component_count(), 2);
        let label = graph.component_of(nodes[5]).unwrap();
        for &n in &[nodes[0], nodes[2], nodes[3]] {
            assert_eq!(graph.component_of(n), Some(label));
        }
        assert_ne!(graph.component_of(nodes[4]), Some(label));

        // The merged component still sees its edges when checking for cycles
        let outcome = graph.connect(port(&graph, nodes[3], "sum"), port(&graph, nodes[5], "a")).unwrap();
        assert_eq!(outcome, ConnectOutcome::CycleRejected);
        graph.connect(port(&graph, nodes[4], "sum"), port(&graph, nodes[5], "a")).unwrap();
        assert_eq!(graph.component_count(), 1);
    }

    #[test]
    fn test_distance_propagates_forward() {
        let mut graph = Graph::default();
        let a = add(&mut graph);
        let b = add(&mut graph);
        let c = add(&mut graph);
        let head = add(&mut graph);

        graph.connect(port(&graph, a, "sum"), port(&graph, b, "a")).unwrap();
        graph.connect(port(&graph, b, "sum"), port(&graph, c, "a")).unwrap();
        assert_eq!(graph.distance(c), Some(2));

        graph.connect(port(&graph, head, "sum"), port(&graph, a, "a")).unwrap();
        assert_eq!(graph.distance(a), Some(1));
        assert_eq!(graph.distance(b), Some(2));
        assert_eq!(graph.distance(c), Some(3));
        for connection in graph.connections() {
            assert!(graph.distance(connection.from.node) < graph.distance(connection.to.node));
        }
    }

    #[test]
    fn test_disconnect_output_resets_targets() {
        let mut graph = Graph::default();
        let src = add(&mut graph);
        let x = add(&mut graph);
        let y = add(&mut graph);
        let sum = port(&graph, src, "sum");
        graph.set_raw(port(&graph, src, "a"), PortValue::Float(5.0)).unwrap();
        graph.connect(sum, port(&graph, x, "a")).unwrap();
        graph.connect(sum, port(&graph, y, "b")).unwrap();

        assert_eq!(graph.get(port(&graph, x, "sum")), Ok(PortValue::Float(5.0)));
        assert_eq!(graph.disconnect(sum), Ok(2));
        assert_eq!(graph.connection_count(), 0);
        assert!(!graph.is_fresh(x));
        assert_eq!(graph.peek(port(&graph, x, "a")), Some(&PortValue::Float(0.0)));
        assert_eq!(graph.get(port(&graph, y, "sum")), Ok(PortValue::Float(0.0)));
    }

    #[test]
    fn test_disconnect_input() {
        let mut graph = Graph::default();
        let src = add(&mut graph);
        let dst = add(&mut graph);
        let a = port(&graph, dst, "a");
        graph.set_raw(port(&graph, src, "b"), PortValue::Float(3.0)).unwrap();
        graph.connect(port(&graph, src, "sum"), a).unwrap();
        assert_eq!(graph.get(a), Ok(PortValue::Float(3.0)));

        assert_eq!(graph.disconnect(a), Ok(1));
        assert_eq!(graph.disconnect(a), Ok(0));
        assert!(graph.connection_to(a).is_none());
        assert_eq!(graph.get(port(&graph, dst, "sum")), Ok(PortValue::Float(0.0)));
    }

    #[test]
    fn test_rebinding_input_replaces_connection() {
        let mut graph = Graph::default();
        let first = add(&mut graph);
        let second = add(&mut graph);
        let dst = add(&mut graph);
        let a = port(&graph, dst, "a");

        graph.connect(port(&graph, first, "sum"), a).unwrap();
        graph.connect(port(&graph, second, "sum"), a).unwrap();
        assert_eq!(graph.connection_count(), 1);
        assert!(graph.connections_from(port(&graph, first, "sum")).is_empty());
        assert_eq!(graph.connection_to(a).map(|c| c.from.node), Some(second));
    }

    #[test]
    fn test_fault_contained_with_null_outputs() {
        let mut graph = Graph::default();
        let div = graph.add_node(Divide::node_type(), Box::new(Divide));
        let after = add(&mut graph);
        let sibling = add(&mut graph);
        graph.set_raw(port(&graph, div, "b"), PortValue::Float(0.0)).unwrap();
        graph.connect(port(&graph, div, "quotient"), port(&graph, after, "a")).unwrap();

        let report = graph.recompute_upstream_of(after).unwrap();
        assert_eq!(report.faulted, vec![div]);
        assert_eq!(report.short_circuited, vec![after]);
        assert!(matches!(graph.status(div), Some(NodeStatus::Faulted(_))));
        assert_eq!(graph.status(after), Some(&NodeStatus::NullInput("a".to_string())));
        assert_eq!(graph.peek(port(&graph, after, "sum")), Some(&PortValue::Null));
        assert_eq!(graph.node(after).unwrap().calculations(), 0);

        // Unrelated nodes still evaluate
        assert_eq!(graph.get(port(&graph, sibling, "sum")), Ok(PortValue::Float(0.0)));

        graph.set_raw(port(&graph, div, "b"), PortValue::Float(2.0)).unwrap();
        assert_eq!(graph.get(port(&graph, after, "sum")), Ok(PortValue::Float(0.0)));
        assert_eq!(graph.status(div), Some(&NodeStatus::Ok));
        assert!(graph.status_report().contains("calculations=2"));
    }

    #[test]
    fn test_remove_node_disconnects() {
        let mut graph = Graph::default();
        let src = add(&mut graph);
        let dst = add(&mut graph);
        graph.set_raw(port(&graph, src, "a"), PortValue::Float(4.0)).unwrap();
        graph.connect(port(&graph, src, "sum"), port(&graph, dst, "a")).unwrap();
        assert_eq!(graph.get(port(&graph, dst, "sum")), Ok(PortValue::Float(4.0)));

        assert!(graph.remove_node(src).is_some());
        assert!(graph.remove_node(src).is_none());
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.connection_count(), 0);
        assert_eq!(graph.get(port(&graph, dst, "sum")), Ok(PortValue::Float(0.0)));
        assert_eq!(
            graph.recompute_upstream_of(src),
            Err(EvaluationError::NodeNotFound(src))
        );
    }

    #[test]
    fn test_status_report_lists_nodes() {
        let mut graph = Graph::new("report");
        let n = add(&mut graph);
        graph.get(port(&graph, n, "sum")).unwrap();
        let report = graph.status_report();
        assert_eq!(report.lines().count(), 1);
        assert!(report.starts_with("n0 Add [fresh] distance=0 calculations=1: ok"));
    }
}
