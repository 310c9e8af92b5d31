// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph evaluation and execution.

use crate::node::NodeId;
use crate::port::{InputSlot, OutputSlot, PortId, PortType, PortValue};

/// Context handed to [`NodeBehavior::calculate`](crate::node::NodeBehavior::calculate)
///
/// Reads see the node's current input values. Writes go to the node's
/// outputs, which start out as `Null` for every calculation.
pub struct CalcContext<'a> {
    node: NodeId,
    inputs: &'a [InputSlot],
    outputs: &'a mut [OutputSlot],
}

impl<'a> CalcContext<'a> {
    pub(crate) fn new(node: NodeId, inputs: &'a [InputSlot], outputs: &'a mut [OutputSlot]) -> Self {
        for output in outputs.iter_mut() {
            output.value = PortValue::Null;
        }
        Self {
            node,
            inputs,
            outputs,
        }
    }

    /// Node being calculated
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Current value of the input named `name`
    pub fn input(&self, name: &str) -> Result<&PortValue, EvaluationError> {
        self.inputs
            .iter()
            .find(|slot| slot.spec.name == name)
            .map(|slot| &slot.value)
            .ok_or_else(|| EvaluationError::MissingInput(name.to_string()))
    }

    /// Input as a float; integers widen
    pub fn float(&self, name: &str) -> Result<f32, EvaluationError> {
        let value = self.non_null(name)?;
        value.as_float().ok_or_else(|| mismatch(name, PortType::Float))
    }

    /// Input as a four-component vector; colors are accepted
    pub fn vector4(&self, name: &str) -> Result<[f32; 4], EvaluationError> {
        let value = self.non_null(name)?;
        value.as_vector4().ok_or_else(|| mismatch(name, PortType::Vector4))
    }

    /// Input as a column-major matrix
    pub fn mat4(&self, name: &str) -> Result<[[f32; 4]; 4], EvaluationError> {
        match self.non_null(name)? {
            PortValue::Mat4(m) => Ok(*m),
            _ => Err(mismatch(name, PortType::Mat4)),
        }
    }

    /// Input as a list of four-component vectors
    pub fn vector4_list(&self, name: &str) -> Result<&[[f32; 4]], EvaluationError> {
        match self.non_null(name)? {
            PortValue::Vector4List(points) => Ok(points),
            _ => Err(mismatch(name, PortType::Vector4List)),
        }
    }

    /// Input as a flat float list
    pub fn float_list(&self, name: &str) -> Result<&[f32], EvaluationError> {
        match self.non_null(name)? {
            PortValue::FloatList(values) => Ok(values),
            _ => Err(mismatch(name, PortType::FloatList)),
        }
    }

    /// Write the output named `name`
    pub fn set_output(&mut self, name: &str, value: PortValue) -> Result<(), EvaluationError> {
        let slot = self
            .outputs
            .iter_mut()
            .find(|slot| slot.spec.name == name)
            .ok_or_else(|| EvaluationError::UnknownOutput(name.to_string()))?;
        if !value.fits(slot.spec.port_type) {
            return Err(mismatch(name, slot.spec.port_type));
        }
        slot.value = value;
        Ok(())
    }

    fn non_null(&self, name: &str) -> Result<&PortValue, EvaluationError> {
        match self.input(name)? {
            PortValue::Null => Err(EvaluationError::NullInput(name.to_string())),
            value => Ok(value),
        }
    }
}

fn mismatch(port: &str, expected: PortType) -> EvaluationError {
    EvaluationError::TypeMismatch {
        port: port.to_string(),
        expected,
    }
}

/// Nodes touched by one recomputation pass, in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecomputeReport {
    /// Nodes whose `calculate` ran, including faulted ones
    pub calculated: Vec<NodeId>,
    /// Nodes whose `calculate` returned an error
    pub faulted: Vec<NodeId>,
    /// Nodes skipped because an input held `Null`
    pub short_circuited: Vec<NodeId>,
}

impl RecomputeReport {
    /// Whether the pass found nothing stale
    pub fn is_empty(&self) -> bool {
        self.calculated.is_empty() && self.short_circuited.is_empty()
    }
}

/// Error during evaluation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(PortId),

    /// No input with this name
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// No output with this name
    #[error("Unknown output: {0}")]
    UnknownOutput(String),

    /// Value does not match the port type
    #[error("Type mismatch on '{port}': expected {expected:?}")]
    TypeMismatch {
        /// Port name
        port: String,
        /// Declared port type
        expected: PortType,
    },

    /// Input holds no data
    #[error("Input '{0}' is null")]
    NullInput(String),

    /// Custom error
    #[error("{0}")]
    Custom(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::PortSpec;

    fn slots() -> (Vec<InputSlot>, Vec<OutputSlot>) {
        let inputs = vec![
            InputSlot::new(PortSpec::input("x", PortType::Float).with_default(PortValue::Int(4))),
            InputSlot::new(PortSpec::input("p", PortType::Vector4)),
        ];
        let mut output = OutputSlot::new(PortSpec::output("y", PortType::Float));
        output.value = PortValue::Float(9.0);
        (inputs, vec![output])
    }

    #[test]
    fn test_outputs_start_null() {
        let (inputs, mut outputs) = slots();
        let ctx = CalcContext::new(NodeId(0), &inputs, &mut outputs);
        assert_eq!(ctx.node(), NodeId(0));
        drop(ctx);
        assert_eq!(outputs[0].value, PortValue::Null);
    }

    #[test]
    fn test_typed_reads() {
        let (inputs, mut outputs) = slots();
        let ctx = CalcContext::new(NodeId(0), &inputs, &mut outputs);
        assert_eq!(ctx.float("x"), Ok(4.0));
        assert_eq!(ctx.vector4("p"), Err(EvaluationError::NullInput("p".to_string())));
        assert_eq!(ctx.input("q"), Err(EvaluationError::MissingInput("q".to_string())));
        assert!(matches!(ctx.mat4("x"), Err(EvaluationError::TypeMismatch { .. })));
    }

    #[test]
    fn test_set_output_checks_type() {
        let (inputs, mut outputs) = slots();
        let mut ctx = CalcContext::new(NodeId(0), &inputs, &mut outputs);
        assert!(ctx.set_output("y", PortValue::Float(1.5)).is_ok());
        assert!(matches!(
            ctx.set_output("y", PortValue::String("no".into())),
            Err(EvaluationError::TypeMismatch { .. })
        ));
        assert_eq!(
            ctx.set_output("z", PortValue::Float(0.0)),
            Err(EvaluationError::UnknownOutput("z".to_string()))
        );
        drop(ctx);
        assert_eq!(outputs[0].value, PortValue::Float(1.5));
    }
}
