// SPDX-License-Identifier: MIT OR Apache-2.0
//! Lazy dataflow graph for Trellis.
//!
//! Nodes declare typed input and output ports and a [`NodeBehavior`] that
//! computes outputs from inputs. Edits (connect, raw values, disconnect) only
//! mark work; reading a port pulls the stale part of its upstream graph
//! up to date, each node at most once per pass.
//!
//! ## Architecture
//!
//! ```text
//! Graph
//!   ├─→ nodes       NodeId → Node { inputs, outputs, behavior, fresh, distance }
//!   ├─→ components  label → members, merged on connect
//!   └─→ get(port) → recompute_upstream_of(node)
//!                     min-heap by (distance, sequence) → calculate → push outputs
//! ```
//!
//! A failing node does not abort the pass: its outputs become
//! [`PortValue::Null`] and downstream nodes see "no data".

pub mod connection;
pub mod evaluation;
pub mod graph;
pub mod graphs;
pub mod node;
pub mod port;

pub use connection::{ConnectOutcome, Connection};
pub use evaluation::{CalcContext, EvaluationError, RecomputeReport};
pub use graph::{ConnectionError, Graph};
pub use node::{Node, NodeBehavior, NodeCategory, NodeId, NodeRegistry, NodeStatus, NodeType};
pub use port::{PortDirection, PortId, PortSpec, PortType, PortValue};
