// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for the graph.

use crate::node::NodeId;
use crate::port::PortId;
use std::fmt;

/// A connection from an output port to an input port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Connection {
    /// Source output port
    pub from: PortId,
    /// Target input port
    pub to: PortId,
}

impl Connection {
    /// Create a new connection
    pub fn new(from: PortId, to: PortId) -> Self {
        Self { from, to }
    }

    /// Check if this connection involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.from.node == node_id || self.to.node == node_id
    }

    /// Check if this connection involves a specific port
    pub fn involves_port(&self, port_id: PortId) -> bool {
        self.from == port_id || self.to == port_id
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Result of a connect call that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The edge was recorded
    Connected,
    /// The edge would close a cycle; the graph is unchanged
    CycleRejected,
}

impl ConnectOutcome {
    /// Whether the edge was recorded
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}
